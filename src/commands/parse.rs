use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ParseArgs;
use crate::commands::{WorkerEvent, answer_question, log_progress, run_extraction};
use crate::model::CardSummary;

pub fn run(args: ParseArgs) -> Result<()> {
    info!(cards = %args.extract.cards.display(), "parsing cards");

    let mut summaries = Vec::new();
    let outcome = run_extraction(&args.extract, |event, cancel| {
        log_progress(&event);
        match event {
            WorkerEvent::FileCompleted(file, cards) => {
                summaries.extend(cards.iter().map(|card| CardSummary::from_record(&file, card)));
                Ok(())
            }
            WorkerEvent::Ask(question, reply) => answer_question(&question, reply, cancel),
            _ => Ok(()),
        }
    })?;

    if args.json {
        write_json(&summaries)?;
    } else {
        write_text(&summaries)?;
    }

    outcome?;
    info!(cards = summaries.len(), "parse completed");
    Ok(())
}

fn write_json(summaries: &[CardSummary]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, summaries)
        .context("failed to serialize card json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text(summaries: &[CardSummary]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let mut current_file = None;
    for summary in summaries {
        if current_file != Some(summary.file.as_str()) {
            writeln!(output, "{}:", summary.file)?;
            current_file = Some(summary.file.as_str());
        }
        write!(
            output,
            "  p{}.{} {} | {} | {}",
            summary.page_id, summary.page_pos, summary.tag, summary.nationality, summary.name
        )?;
        match summary.image_bytes {
            Some(bytes) => writeln!(output, " ({bytes} image bytes)")?,
            None => writeln!(output)?,
        }
    }
    output.flush()?;
    Ok(())
}
