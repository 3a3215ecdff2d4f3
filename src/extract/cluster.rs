use crate::model::{LayoutPage, TextFragment};

use super::{CancelFlag, ClusterConfig, ExtractError};

/// Text fragments believed to describe one card, seeded by an anchor fragment.
#[derive(Debug, Clone)]
pub struct InfoBox<'a> {
    pub anchor: &'a TextFragment,
    /// Anchor first, then claimed fragments in discovery order.
    pub fragments: Vec<&'a TextFragment>,
}

impl<'a> InfoBox<'a> {
    fn new(anchor: &'a TextFragment) -> Self {
        Self {
            anchor,
            fragments: vec![anchor],
        }
    }

    /// The fragment must hug the anchor horizontally and sit just below it.
    fn accepts(&self, fragment: &TextFragment, config: &ClusterConfig) -> bool {
        let anchor = &self.anchor.bbox;
        let candidate = &fragment.bbox;

        (candidate.x0 - anchor.x0).abs() <= config.horizontal_tolerance
            && (candidate.x1 - anchor.x1).abs() <= config.horizontal_tolerance
            && candidate.y0 < anchor.y0
            && anchor.y0 - candidate.y1 <= config.vertical_gap
    }
}

pub fn is_anchor(fragment: &TextFragment, config: &ClusterConfig) -> bool {
    let text = fragment.text.trim();
    config
        .anchor_prefixes
        .iter()
        .any(|prefix| text.starts_with(prefix.as_str()))
}

/// Group a page's fragments into info boxes, one per anchor.
///
/// A fragment that fits several boxes goes to the first registered anchor.
pub fn cluster_info_boxes<'a>(
    page: &'a LayoutPage,
    config: &ClusterConfig,
    cancel: &CancelFlag,
) -> Result<Vec<InfoBox<'a>>, ExtractError> {
    let mut boxes = page
        .fragments
        .iter()
        .filter(|fragment| is_anchor(fragment, config))
        .map(InfoBox::new)
        .collect::<Vec<InfoBox<'a>>>();

    cancel.check()?;
    if boxes.is_empty() {
        return Ok(boxes);
    }

    for fragment in &page.fragments {
        cancel.check()?;
        if is_anchor(fragment, config) {
            continue;
        }
        if let Some(info_box) = boxes
            .iter_mut()
            .find(|info_box| info_box.accepts(fragment, config))
        {
            info_box.fragments.push(fragment);
        }
    }

    Ok(boxes)
}
