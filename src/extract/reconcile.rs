use crate::model::{CardImage, CardRecord};

use super::ExtractError;

/// Attach image `i` to record `i`; both lists must be the same length.
pub fn reconcile(
    file: &str,
    mut records: Vec<CardRecord>,
    images: Vec<CardImage>,
) -> Result<Vec<CardRecord>, ExtractError> {
    if records.len() != images.len() {
        return Err(ExtractError::CountMismatch {
            file: file.to_string(),
            records: records.len(),
            images: images.len(),
        });
    }

    for (record, image) in records.iter_mut().zip(images) {
        record.image = Some(image);
    }
    Ok(records)
}
