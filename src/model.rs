use std::fmt;

use serde::Serialize;

/// Marker prefixes that open a card's info box on a page.
pub const VEHICLE_PREFIX: &str = "Vehicle";
pub const ORDNANCE_PREFIX: &str = "Ordnance";

/// Axis-aligned box in layout units, bottom-left origin (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// A horizontal run of text on one rendered page, as reported by the layout decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub bbox: BBox,
    pub text: String,
}

impl TextFragment {
    pub fn new(bbox: BBox, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPage {
    /// 1-based page number.
    pub page_id: u32,
    pub width: f64,
    pub height: f64,
    pub fragments: Vec<TextFragment>,
}

/// Encoded (PNG) bytes of one cropped card.
#[derive(Clone, PartialEq, Eq)]
pub struct CardImage {
    pub data: Vec<u8>,
}

impl fmt::Debug for CardImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardImage[#bytes={}]", self.data.len())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TagType {
    Vehicle,
    Ordnance,
}

impl TagType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Ordnance => "ordnance",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_lowercase();
        if tag.starts_with("vehicle") {
            Some(Self::Vehicle)
        } else if tag.starts_with("ordnance") {
            Some(Self::Ordnance)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub tag: String,
    pub nationality: String,
    pub name: String,
    pub page_id: u32,
    /// 0 = top card, 1 = bottom card.
    pub page_pos: u8,
    pub image: Option<CardImage>,
}

impl CardRecord {
    pub fn new(
        page_id: u32,
        page_pos: u8,
        tag: impl Into<String>,
        nationality: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            nationality: nationality.into(),
            name: name.into(),
            page_id,
            page_pos,
            image: None,
        }
    }

    /// Placeholder rows mark an unused slot in a card sheet.
    pub fn is_placeholder(&self, sentinel: &str) -> bool {
        self.nationality == sentinel || self.name == sentinel
    }

    pub fn tag_type(&self) -> Option<TagType> {
        TagType::from_tag(&self.tag)
    }
}

impl fmt::Display for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AslCard[tag={}|nationality={}|name={}|page_id={}|page_pos={}",
            self.tag, self.nationality, self.name, self.page_id, self.page_pos
        )?;
        if let Some(image) = &self.image {
            write!(f, "|#image_bytes={}", image.data.len())?;
        }
        write!(f, "]")
    }
}

/// Per-card view written by `parse --json`.
#[derive(Debug, Clone, Serialize)]
pub struct CardSummary {
    pub file: String,
    pub tag: String,
    pub nationality: String,
    pub name: String,
    pub page_id: u32,
    pub page_pos: u8,
    pub image_bytes: Option<usize>,
}

impl CardSummary {
    pub fn from_record(file: &str, card: &CardRecord) -> Self {
        Self {
            file: file.to_string(),
            tag: card.tag.clone(),
            nationality: card.nationality.clone(),
            name: card.name.clone(),
            page_id: card.page_id,
            page_pos: card.page_pos,
            image_bytes: card.image.as_ref().map(|image| image.data.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFileEntry {
    pub filename: String,
    pub sha256: String,
    pub cards: usize,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeSettings {
    pub cards_path: String,
    pub db_path: String,
    pub index_dir: String,
    pub work_dir: String,
    pub image_resolution: Option<u32>,
    pub max_pages: Option<usize>,
    pub layout_fallback: String,
    pub stop_on_error: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeCounts {
    pub files_completed: usize,
    pub files_failed: usize,
    pub cards_stored: i64,
    pub images_stored: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub settings: AnalyzeSettings,
    pub counts: AnalyzeCounts,
    pub source_hashes: Vec<SourceFileEntry>,
    pub warnings: Vec<String>,
}
