use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::model::CardRecord;

use super::{CancelFlag, ExtractConfig, ExtractError, LayoutDecoder, Rasterizer};

pub const DOCUMENT_EXTENSION: &str = "pdf";

type ProgressFn<'a> = Box<dyn FnMut(Option<f64>, &str) + 'a>;
type PageProgressFn<'a> = Box<dyn FnMut(f64) + 'a>;
type FileCompletedFn<'a> = Box<dyn FnMut(&str, &mut Vec<CardRecord>) + 'a>;
type AskFn<'a> = Box<dyn FnMut(&str) -> bool + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(&str) + 'a>;

/// Optional hooks into a running analysis. All are called on the worker.
#[derive(Default)]
pub struct Callbacks<'a> {
    /// Coarse progress: fraction of files done (`None` for plain messages).
    pub on_progress: Option<ProgressFn<'a>>,
    /// Fine progress: fraction of pages done in the current file.
    pub on_page_progress: Option<PageProgressFn<'a>>,
    /// Called with each file's finished cards. Cards drained from the vector
    /// are not carried into the batch result.
    pub on_file_completed: Option<FileCompletedFn<'a>>,
    /// Yes/no question; blocks the worker until answered.
    pub on_ask: Option<AskFn<'a>>,
    /// Per-file failures. When unset, the first failure aborts the batch.
    pub on_error: Option<ErrorFn<'a>>,
}

pub struct CardParser<'a> {
    pub(super) config: ExtractConfig,
    pub(super) decoder: Box<dyn LayoutDecoder + 'a>,
    pub(super) rasterizer: Box<dyn Rasterizer + 'a>,
    pub(super) cancel: CancelFlag,
    pub(super) callbacks: Callbacks<'a>,
}

impl<'a> CardParser<'a> {
    pub fn new(
        config: ExtractConfig,
        decoder: Box<dyn LayoutDecoder + 'a>,
        rasterizer: Box<dyn Rasterizer + 'a>,
    ) -> Self {
        Self {
            config,
            decoder,
            rasterizer,
            cancel: CancelFlag::new(),
            callbacks: Callbacks::default(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks<'a>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Extract the cards from one PDF or from every PDF in a directory.
    ///
    /// `image_resolution` is the raster resolution in dpi; `None` skips image
    /// extraction altogether.
    pub fn parse(
        &mut self,
        target: &Path,
        max_pages: Option<usize>,
        image_resolution: Option<u32>,
    ) -> Result<Vec<CardRecord>, ExtractError> {
        let files = collect_documents(target)?;
        info!(
            target = %target.display(),
            files = files.len(),
            "starting card analysis"
        );

        let mut cards = Vec::new();
        let mut cards_found = 0usize;
        for (index, pdf_path) in files.iter().enumerate() {
            self.cancel.check()?;

            let file_name = display_name(pdf_path);
            self.progress(
                Some(index as f64 / files.len() as f64),
                &format!("Analyzing: {file_name}"),
            );

            // a cancel raised while the file ran must not pass it off as completed
            let outcome = self
                .parse_file(pdf_path, &file_name, max_pages, image_resolution)
                .and_then(|records| self.cancel.check().map(|()| records));
            match outcome {
                Ok(mut records) => {
                    info!(file = %file_name, cards = records.len(), "file completed");
                    cards_found += records.len();
                    if let Some(on_file_completed) = self.callbacks.on_file_completed.as_mut() {
                        on_file_completed(&file_name, &mut records);
                    }
                    cards.extend(records);
                }
                Err(ExtractError::Cancelled) => {
                    info!(file = %file_name, "analysis cancelled");
                    return Err(ExtractError::Cancelled);
                }
                Err(err) => match self.callbacks.on_error.as_mut() {
                    Some(on_error) => {
                        warn!(file = %file_name, error = %err, "file failed, continuing");
                        on_error(&err.to_string());
                    }
                    None => return Err(err),
                },
            }
        }

        self.cancel.check()?;
        self.progress(Some(1.0), "Done.");

        if cards_found == 0 {
            return Err(ExtractError::NoCards);
        }
        Ok(cards)
    }

    pub(super) fn progress(&mut self, fraction: Option<f64>, message: &str) {
        if let Some(on_progress) = self.callbacks.on_progress.as_mut() {
            on_progress(fraction, message);
        }
    }

    pub(super) fn page_progress(&mut self, fraction: f64) {
        if let Some(on_page_progress) = self.callbacks.on_page_progress.as_mut() {
            on_page_progress(fraction);
        }
    }

    pub(super) fn ask(&mut self, question: &str) -> Option<bool> {
        self.callbacks
            .on_ask
            .as_mut()
            .map(|on_ask| on_ask(question))
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A single file is taken as-is; a directory yields its PDFs in name order.
pub fn collect_documents(target: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    if !target.is_dir() {
        return Ok(vec![target.to_path_buf()]);
    }

    let target_name = target.display().to_string();
    let read_error = |source| ExtractError::io(&target_name, "failed to read directory", source);

    let mut documents = Vec::new();
    for entry in fs::read_dir(target).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if !path.is_file() {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
            .unwrap_or(false);

        if is_pdf {
            documents.push(path);
        }
    }
    documents.sort();

    Ok(documents)
}
