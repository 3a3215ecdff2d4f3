use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::model::{BBox, LayoutPage, TextFragment};

/// Source of positioned text fragments for each page of a document.
pub trait LayoutDecoder {
    /// Decode at most `max_pages` pages (all pages when `None`), in page order.
    fn decode(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<LayoutPage>>;
}

/// Runs poppler's `pdftotext -bbox-layout` and reads its XHTML output.
///
/// Every `<block>` becomes one fragment; its `<line>`s are joined with
/// newlines and the words of a line with single spaces.
pub struct PdftotextDecoder {
    parser: BboxLayoutParser,
}

impl PdftotextDecoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: BboxLayoutParser::new()?,
        })
    }
}

impl LayoutDecoder for PdftotextDecoder {
    fn decode(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<LayoutPage>> {
        let mut command = Command::new("pdftotext");
        command
            .arg("-bbox-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg("-f")
            .arg("1");
        if let Some(max_pages) = max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(pdf_path).arg("-").stdin(Stdio::null());

        let output = command
            .output()
            .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {}: {}",
                pdf_path.display(),
                stderr.trim()
            );
        }

        let xhtml = String::from_utf8_lossy(&output.stdout);
        self.parser.parse(&xhtml)
    }
}

pub(crate) struct BboxLayoutParser {
    page_regex: Regex,
    block_regex: Regex,
    line_regex: Regex,
    word_regex: Regex,
}

impl BboxLayoutParser {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            page_regex: Regex::new(
                r#"(?s)<page\s+width="([0-9.]+)"\s+height="([0-9.]+)"\s*>(.*?)</page>"#,
            )
            .context("failed to compile bbox page regex")?,
            block_regex: Regex::new(
                r#"(?s)<block\s+xMin="(-?[0-9.]+)"\s+yMin="(-?[0-9.]+)"\s+xMax="(-?[0-9.]+)"\s+yMax="(-?[0-9.]+)"\s*>(.*?)</block>"#,
            )
            .context("failed to compile bbox block regex")?,
            line_regex: Regex::new(r"(?s)<line\b[^>]*>(.*?)</line>")
                .context("failed to compile bbox line regex")?,
            word_regex: Regex::new(r"(?s)<word\b[^>]*>(.*?)</word>")
                .context("failed to compile bbox word regex")?,
        })
    }

    /// Poppler reports top-left origin coordinates; fragments are flipped to
    /// a bottom-left origin so "higher on the page" means a larger y.
    pub(crate) fn parse(&self, xhtml: &str) -> Result<Vec<LayoutPage>> {
        let mut pages = Vec::new();

        for (index, page_captures) in self.page_regex.captures_iter(xhtml).enumerate() {
            let width = parse_coordinate(&page_captures[1], "page width")?;
            let height = parse_coordinate(&page_captures[2], "page height")?;
            let body = page_captures.get(3).map(|value| value.as_str()).unwrap_or("");

            let mut fragments = Vec::new();
            for block in self.block_regex.captures_iter(body) {
                let x_min = parse_coordinate(&block[1], "block xMin")?;
                let y_min = parse_coordinate(&block[2], "block yMin")?;
                let x_max = parse_coordinate(&block[3], "block xMax")?;
                let y_max = parse_coordinate(&block[4], "block yMax")?;
                let block_body = block.get(5).map(|value| value.as_str()).unwrap_or("");

                let lines = self
                    .line_regex
                    .captures_iter(block_body)
                    .map(|line| {
                        let line_body = line.get(1).map(|value| value.as_str()).unwrap_or("");
                        self.word_regex
                            .captures_iter(line_body)
                            .filter_map(|word| word.get(1))
                            .map(|word| decode_entities(word.as_str()))
                            .collect::<Vec<String>>()
                            .join(" ")
                    })
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<String>>();

                if lines.is_empty() {
                    continue;
                }

                fragments.push(TextFragment::new(
                    BBox::new(x_min, height - y_max, x_max, height - y_min),
                    lines.join("\n"),
                ));
            }

            pages.push(LayoutPage {
                page_id: (index + 1) as u32,
                width,
                height,
                fragments,
            });
        }

        Ok(pages)
    }
}

fn parse_coordinate(raw: &str, label: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("invalid {label} in pdftotext output: {raw}"))
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
