//! Card extraction engine.
//!
//! Metadata comes either from a hand-maintained override index or from the
//! page text layout; images come from rasterized pages split into per-card
//! crops. Both lists are reconciled 1:1 per file.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{ORDNANCE_PREFIX, VEHICLE_PREFIX};

mod batch;
mod cluster;
mod error;
mod file;
mod layout;
mod metadata;
mod override_index;
mod raster;
mod reconcile;
mod segment;
mod tidy;


pub use batch::{Callbacks, CardParser};
pub use error::ExtractError;
pub use layout::{LayoutDecoder, PdftotextDecoder};
pub use raster::{PdftoppmRasterizer, Rasterizer};

/// Cards whose nationality or name equals this value mark an empty slot.
pub const PLACEHOLDER_SENTINEL: &str = "unused";

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub anchor_prefixes: Vec<String>,
    /// Max distance between a fragment's left/right edges and its anchor's.
    pub horizontal_tolerance: f64,
    /// Max distance between an anchor's bottom edge and a fragment's top edge.
    pub vertical_gap: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            anchor_prefixes: vec![VEHICLE_PREFIX.to_string(), ORDNANCE_PREFIX.to_string()],
            horizontal_tolerance: 50.0,
            vertical_gap: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Fraction of the page height where the top and bottom cards meet.
    pub split_ratio: f64,
    /// On the last page, crops shorter than this fraction of the page height
    /// mean a single centered card.
    pub single_card_ratio: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            split_ratio: 0.48,
            single_card_ratio: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub cluster: ClusterConfig,
    pub segment: SegmentConfig,
    /// Shorter lines inside an info box are layout noise.
    pub min_line_chars: usize,
    pub placeholder: String,
    pub index_dir: Option<PathBuf>,
    /// Scratch directory for rendered page rasters.
    pub work_dir: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            segment: SegmentConfig::default(),
            min_line_chars: 5,
            placeholder: PLACEHOLDER_SENTINEL.to_string(),
            index_dir: None,
            work_dir: std::env::temp_dir().join("asl_cards_pages"),
        }
    }
}

/// Cooperative cancellation shared between the caller and the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ExtractError> {
        if self.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        Ok(())
    }
}
