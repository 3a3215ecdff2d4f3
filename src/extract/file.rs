use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::model::{CardImage, CardRecord};

use super::batch::CardParser;
use super::metadata::build_page_records;
use super::override_index::{index_path_for, read_override_index};
use super::raster::{discover_rendered_pages, page_prefix, purge_rendered_pages};
use super::reconcile::reconcile;
use super::segment::segment_page_file;
use super::ExtractError;

/// Where a file's card metadata comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum MetadataSource {
    OverrideIndex(PathBuf),
    LayoutParse,
    /// No index and no go-ahead for layout parsing.
    Skipped,
}

impl CardParser<'_> {
    pub(super) fn parse_file(
        &mut self,
        pdf_path: &Path,
        file_name: &str,
        max_pages: Option<usize>,
        image_resolution: Option<u32>,
    ) -> Result<Vec<CardRecord>, ExtractError> {
        let records = match self.resolve_source(pdf_path, file_name) {
            MetadataSource::OverrideIndex(index_path) => {
                info!(file = %file_name, index = %index_path.display(), "using index file");
                self.progress(None, &format!("Using index file: {}", index_path.display()));
                let mut records = read_override_index(&index_path, file_name)?;
                if let Some(max_pages) = max_pages {
                    records.truncate(max_pages.saturating_mul(2));
                }
                records
            }
            MetadataSource::LayoutParse => self.parse_layout(pdf_path, file_name, max_pages)?,
            MetadataSource::Skipped => {
                info!(file = %file_name, "no index file, skipping");
                return Ok(Vec::new());
            }
        };

        let records = match image_resolution {
            Some(resolution) => {
                let images = self.render_images(pdf_path, file_name, resolution, max_pages)?;
                reconcile(file_name, records, images)?
            }
            None => records,
        };

        let placeholder = self.config.placeholder.as_str();
        Ok(records
            .into_iter()
            .filter(|record| !record.is_placeholder(placeholder))
            .collect())
    }

    fn resolve_source(&mut self, pdf_path: &Path, file_name: &str) -> MetadataSource {
        let index_path = self
            .config
            .index_dir
            .as_deref()
            .and_then(|index_dir| index_path_for(index_dir, pdf_path));
        if let Some(index_path) = index_path.filter(|path| path.is_file()) {
            return MetadataSource::OverrideIndex(index_path);
        }

        let question = format!(
            "No index file was found for {file_name}.\n\n\
             Do you want to try to parse the file? This is slow and the results may be unreliable."
        );
        match self.ask(&question) {
            Some(true) => MetadataSource::LayoutParse,
            _ => MetadataSource::Skipped,
        }
    }

    fn parse_layout(
        &mut self,
        pdf_path: &Path,
        file_name: &str,
        max_pages: Option<usize>,
    ) -> Result<Vec<CardRecord>, ExtractError> {
        self.progress(None, &format!("Parsing text layout: {file_name}"));
        let pages = self
            .decoder
            .decode(pdf_path, max_pages)
            .map_err(|reason| ExtractError::Decoder {
                file: file_name.to_string(),
                reason,
            })?;

        let mut records = Vec::new();
        for (index, page) in pages.iter().enumerate() {
            self.page_progress(index as f64 / pages.len() as f64);
            self.cancel.check()?;
            let page_records = build_page_records(page, &self.config, &self.cancel)?;
            for record in &page_records {
                debug!(file = %file_name, card = %record, "found card");
                self.progress(None, &format!("Found card: {record}"));
            }
            records.extend(page_records);
        }
        self.page_progress(1.0);

        Ok(records)
    }

    fn render_images(
        &mut self,
        pdf_path: &Path,
        file_name: &str,
        resolution: u32,
        max_pages: Option<usize>,
    ) -> Result<Vec<CardImage>, ExtractError> {
        let work_dir = self.config.work_dir.clone();
        fs::create_dir_all(&work_dir).map_err(|source| {
            ExtractError::io(
                file_name,
                format!("failed to create work directory {}", work_dir.display()),
                source,
            )
        })?;
        let purged = purge_rendered_pages(&work_dir).map_err(|source| {
            ExtractError::io(file_name, "failed to purge stale page rasters", source)
        })?;
        if purged > 0 {
            debug!(work_dir = %work_dir.display(), purged, "removed stale page rasters");
        }

        self.progress(
            None,
            &format!("Generating card images for {file_name} ({resolution} dpi)..."),
        );
        self.rasterizer
            .render(pdf_path, resolution, max_pages, &page_prefix(&work_dir))
            .map_err(|reason| ExtractError::Rasterizer {
                file: file_name.to_string(),
                reason,
            })?;

        let pages = discover_rendered_pages(&work_dir).map_err(|source| {
            ExtractError::io(file_name, "failed to list rendered pages", source)
        })?;
        debug!(file = %file_name, pages = pages.len(), "rendered pages");

        let mut images = Vec::new();
        for (index, page_path) in pages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                // best effort, the next run purges whatever is left
                let _ = purge_rendered_pages(&work_dir);
                return Err(ExtractError::Cancelled);
            }
            self.page_progress(index as f64 / pages.len() as f64);

            let is_last_page = index + 1 == pages.len();
            match segment_page_file(page_path, is_last_page, &self.config.segment, file_name) {
                Ok(page_images) => images.extend(page_images),
                Err(err) => {
                    let _ = purge_rendered_pages(&work_dir);
                    return Err(err);
                }
            }
        }
        self.page_progress(1.0);

        Ok(images)
    }
}
