use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// File name stem of every rendered page raster inside the work directory.
pub const PAGE_STEM: &str = "page";
pub const PAGE_EXTENSION: &str = "png";

/// Renders each page of a document to an image file.
pub trait Rasterizer {
    /// Write one raster per page to `<output_prefix>-<page>.png`, in page order.
    fn render(
        &self,
        pdf_path: &Path,
        resolution: u32,
        max_pages: Option<usize>,
        output_prefix: &Path,
    ) -> Result<()>;
}

/// Runs poppler's `pdftoppm`, one process per document.
#[derive(Debug, Default)]
pub struct PdftoppmRasterizer;

impl Rasterizer for PdftoppmRasterizer {
    fn render(
        &self,
        pdf_path: &Path,
        resolution: u32,
        max_pages: Option<usize>,
        output_prefix: &Path,
    ) -> Result<()> {
        let mut command = Command::new("pdftoppm");
        command
            .arg("-png")
            .arg("-r")
            .arg(resolution.to_string())
            .arg("-f")
            .arg("1");
        if let Some(max_pages) = max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command
            .arg(pdf_path)
            .arg(output_prefix)
            .stdin(Stdio::null());

        let output = command
            .output()
            .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftoppm returned non-zero exit status for {}: {}",
                pdf_path.display(),
                stderr.trim()
            );
        }

        Ok(())
    }
}

pub fn page_prefix(work_dir: &Path) -> PathBuf {
    work_dir.join(PAGE_STEM)
}

/// Page number of a rendered raster, if the file name matches the page pattern.
///
/// pdftoppm zero-pads the page number to the width of the page count, so
/// both `page-3.png` and `page-03.png` are accepted.
fn rendered_page_number(path: &Path) -> Option<usize> {
    let extension = path.extension()?.to_str()?;
    if !extension.eq_ignore_ascii_case(PAGE_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let number = stem.strip_prefix(PAGE_STEM)?.strip_prefix('-')?;
    if number.is_empty() || !number.chars().all(|character| character.is_ascii_digit()) {
        return None;
    }
    number.parse::<usize>().ok()
}

/// Rendered page rasters in the work directory, in page order.
pub fn discover_rendered_pages(work_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(work_dir)? {
        let path = entry?.path();
        if let Some(number) = rendered_page_number(&path) {
            pages.push((number, path));
        }
    }
    pages.sort();
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// Remove rasters left behind by an earlier failed or cancelled run.
pub fn purge_rendered_pages(work_dir: &Path) -> io::Result<usize> {
    if !work_dir.exists() {
        return Ok(0);
    }
    let pages = discover_rendered_pages(work_dir)?;
    for page in &pages {
        fs::remove_file(page)?;
    }
    Ok(pages.len())
}
