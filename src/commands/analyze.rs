use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::{AnalyzeArgs, ExtractArgs};
use crate::commands::{WorkerEvent, answer_question, log_progress, run_extraction};
use crate::extract::ExtractError;
use crate::model::{
    AnalyzeCounts, AnalyzeRunManifest, AnalyzeSettings, CardRecord, SourceFileEntry,
};
use crate::store::{self, DB_SCHEMA_VERSION};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));
    let manifest_path = args
        .manifest
        .clone()
        .unwrap_or_else(|| default_manifest_path(&args.db));

    info!(
        cards = %args.extract.cards.display(),
        db = %args.db.display(),
        run_id = %run_id,
        "starting analysis"
    );

    let mut connection = store::open_database(&args.db, args.reset_db)?;
    if !args.append {
        let cleared = store::clear_cards(&connection)?;
        if cleared > 0 {
            info!(cards = cleared, "cleared previously stored cards");
        }
    }
    let mut tally = RunTally::default();

    let outcome = run_extraction(&args.extract, |event, cancel| {
        log_progress(&event);
        match event {
            WorkerEvent::FileCompleted(file, cards) => {
                tally.store_file(&mut connection, &args.extract.cards, &file, &cards)
            }
            WorkerEvent::Ask(question, reply) => answer_question(&question, reply, cancel),
            WorkerEvent::FileFailed(message) => {
                tally.files_failed += 1;
                tally.warnings.push(message);
                Ok(())
            }
            WorkerEvent::Progress(..) | WorkerEvent::PageProgress(_) => Ok(()),
        }
    });

    let status = match &outcome {
        Ok(Ok(_)) => "completed",
        Ok(Err(ExtractError::Cancelled)) => "cancelled",
        Ok(Err(ExtractError::NoCards)) => "no_cards",
        Ok(Err(_)) | Err(_) => "failed",
    };
    if let Ok(Err(err)) = &outcome {
        tally.warnings.push(err.to_string());
    }
    if let Err(err) = &outcome {
        tally.warnings.push(format!("{err:#}"));
    }

    let updated_at = now_utc_string();
    store::set_metadata(&connection, "last_analysis_at", &updated_at)?;
    let (cards_stored, images_stored) = store::count_cards(&connection)?;

    let manifest = AnalyzeRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at,
        command: render_analyze_command(&args),
        settings: settings_for(&args),
        counts: AnalyzeCounts {
            files_completed: tally.sources.len(),
            files_failed: tally.files_failed,
            cards_stored,
            images_stored,
        },
        source_hashes: tally.sources,
        warnings: tally.warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote analysis run manifest");
    info!(
        status,
        cards = cards_stored,
        images = images_stored,
        "analysis finished"
    );

    match outcome {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(err) => Err(err),
    }
}

#[derive(Default)]
struct RunTally {
    sources: Vec<SourceFileEntry>,
    files_failed: usize,
    warnings: Vec<String>,
}

impl RunTally {
    fn store_file(
        &mut self,
        connection: &mut Connection,
        target: &Path,
        file: &str,
        cards: &[CardRecord],
    ) -> Result<()> {
        store::add_cards(connection, cards)?;

        let images = cards.iter().filter(|card| card.image.is_some()).count();
        info!(file = %file, cards = cards.len(), images, "stored cards");

        let source_path = source_path(target, file);
        let sha256 = match sha256_file(&source_path) {
            Ok(sha256) => sha256,
            Err(err) => {
                warn!(file = %file, error = %err, "failed to hash source file");
                self.warnings.push(format!("{err:#}"));
                String::new()
            }
        };

        self.sources.push(SourceFileEntry {
            filename: file.to_string(),
            sha256,
            cards: cards.len(),
            images,
        });
        Ok(())
    }
}

/// Files are reported by name; a directory target holds them directly.
fn source_path(target: &Path, file: &str) -> PathBuf {
    if target.is_dir() {
        target.join(file)
    } else {
        target.to_path_buf()
    }
}

fn default_manifest_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".run.json");
    PathBuf::from(name)
}

fn settings_for(args: &AnalyzeArgs) -> AnalyzeSettings {
    let config = super::extract_config(&args.extract);
    AnalyzeSettings {
        cards_path: args.extract.cards.display().to_string(),
        db_path: args.db.display().to_string(),
        index_dir: config
            .index_dir
            .map(|path| path.display().to_string())
            .unwrap_or_default(),
        work_dir: config.work_dir.display().to_string(),
        image_resolution: args.extract.image_resolution(),
        max_pages: args.extract.max_pages,
        layout_fallback: args.extract.layout_fallback.as_str().to_string(),
        stop_on_error: !args.extract.keep_going,
    }
}

fn render_analyze_command(args: &AnalyzeArgs) -> String {
    let mut command = vec!["asl-cards".to_string(), "analyze".to_string()];
    push_extract_args(&mut command, &args.extract);

    command.push("--db".to_string());
    command.push(args.db.display().to_string());
    if args.append {
        command.push("--append".to_string());
    }
    if args.reset_db {
        command.push("--reset-db".to_string());
    }
    if let Some(path) = &args.manifest {
        command.push("--manifest".to_string());
        command.push(path.display().to_string());
    }

    command.join(" ")
}

fn push_extract_args(command: &mut Vec<String>, args: &ExtractArgs) {
    command.push("--cards".to_string());
    command.push(args.cards.display().to_string());

    if let Some(path) = &args.index_dir {
        command.push("--index-dir".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.work_dir {
        command.push("--work-dir".to_string());
        command.push(path.display().to_string());
    }
    match args.image_resolution() {
        Some(dpi) => {
            command.push("--resolution".to_string());
            command.push(dpi.to_string());
        }
        None => command.push("--no-images".to_string()),
    }
    if let Some(max_pages) = args.max_pages {
        command.push("--max-pages".to_string());
        command.push(max_pages.to_string());
    }
    command.push("--layout-fallback".to_string());
    command.push(args.layout_fallback.as_str().to_string());
    if args.keep_going {
        command.push("--keep-going".to_string());
    }
}
