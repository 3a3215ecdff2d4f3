use tracing::debug;

use crate::model::{CardRecord, LayoutPage};

use super::cluster::{InfoBox, cluster_info_boxes};
use super::tidy::{tidy, tidy_tag};
use super::{CancelFlag, ExtractConfig, ExtractError};

/// Turn one info box into a card record.
///
/// Missing lines give empty fields; placeholder filtering and reconciliation
/// deal with those later.
pub fn build_card_record(
    page_id: u32,
    page_height: f64,
    info_box: &InfoBox<'_>,
    min_line_chars: usize,
) -> CardRecord {
    let mut fragments = info_box.fragments.clone();
    fragments.sort_by(|left, right| right.bbox.y0.total_cmp(&left.bbox.y0));

    let lines = fragments
        .iter()
        .flat_map(|fragment| fragment.text.lines())
        .map(str::trim)
        .filter(|line| line.chars().count() >= min_line_chars)
        .collect::<Vec<&str>>();

    let topmost_y0 = fragments
        .first()
        .map(|fragment| fragment.bbox.y0)
        .unwrap_or(info_box.anchor.bbox.y0);
    let page_pos = if topmost_y0 > page_height / 2.0 { 0 } else { 1 };

    CardRecord::new(
        page_id,
        page_pos,
        lines.first().map(|line| tidy_tag(line)).unwrap_or_default(),
        lines.get(1).map(|line| tidy(line)).unwrap_or_default(),
        lines.get(2).map(|line| tidy(line)).unwrap_or_default(),
    )
}

/// Card records for one page, top card first.
pub fn build_page_records(
    page: &LayoutPage,
    config: &ExtractConfig,
    cancel: &CancelFlag,
) -> Result<Vec<CardRecord>, ExtractError> {
    let boxes = cluster_info_boxes(page, &config.cluster, cancel)?;
    let mut records = boxes
        .iter()
        .map(|info_box| {
            build_card_record(page.page_id, page.height, info_box, config.min_line_chars)
        })
        .collect::<Vec<CardRecord>>();
    records.sort_by_key(|record| record.page_pos);

    debug!(
        page_id = page.page_id,
        width = page.width,
        height = page.height,
        fragments = page.fragments.len(),
        cards = records.len(),
        "parsed page layout"
    );

    Ok(records)
}
