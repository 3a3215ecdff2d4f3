use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage, imageops};
use tracing::debug;

use crate::model::CardImage;

use super::{ExtractError, SegmentConfig};

/// Crop `region` to the pixels that differ from its origin pixel.
///
/// Returns `None` for a blank region.
pub fn trim_to_content(region: &RgbaImage) -> Option<RgbaImage> {
    if region.width() == 0 || region.height() == 0 {
        return None;
    }
    let background = *region.get_pixel(0, 0);

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in region.enumerate_pixels() {
        if *pixel == background {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let (x0, y0, x1, y1) = bounds?;
    Some(imageops::crop_imm(region, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image())
}

/// Split a page raster into its card crops, top card first.
///
/// Pages normally hold a top and a bottom card split a little above the
/// middle. On the last page a lone card sits centered across the split, so
/// when both halves trim to slivers the whole page is trimmed instead.
pub fn segment_page(page: &DynamicImage, is_last_page: bool, config: &SegmentConfig) -> Vec<RgbaImage> {
    let page = page.to_rgba8();
    let (width, height) = page.dimensions();
    let split_y = ((height as f64 * config.split_ratio).round() as u32).min(height);

    let top = trim_to_content(&imageops::crop_imm(&page, 0, 0, width, split_y).to_image());
    let bottom = trim_to_content(
        &imageops::crop_imm(&page, 0, split_y, width, height - split_y).to_image(),
    );

    if is_last_page {
        let min_height = height as f64 * config.single_card_ratio;
        let cropped_height = |crop: &Option<RgbaImage>| crop.as_ref().map_or(0, |image| image.height());
        if (cropped_height(&top) as f64) < min_height
            && (cropped_height(&bottom) as f64) < min_height
        {
            return trim_to_content(&page).into_iter().collect();
        }
    }

    [top, bottom].into_iter().flatten().collect()
}

pub fn encode_png(image: &RgbaImage) -> Result<CardImage, image::ImageError> {
    let mut data = Vec::new();
    DynamicImage::ImageRgba8(image.clone()).write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
    Ok(CardImage { data })
}

/// Segment one rendered page file, deleting it once it has been decoded.
pub fn segment_page_file(
    page_path: &Path,
    is_last_page: bool,
    config: &SegmentConfig,
    file: &str,
) -> Result<Vec<CardImage>, ExtractError> {
    let image_error = |source| ExtractError::Image {
        file: file.to_string(),
        page: page_path.display().to_string(),
        source,
    };

    let decoded = image::open(page_path);
    fs::remove_file(page_path).map_err(|source| {
        ExtractError::io(
            file,
            format!("failed to remove page raster {}", page_path.display()),
            source,
        )
    })?;
    let page = decoded.map_err(image_error)?;

    let crops = segment_page(&page, is_last_page, config);
    debug!(
        page = %page_path.display(),
        width = page.width(),
        height = page.height(),
        crops = crops.len(),
        "segmented page"
    );

    crops
        .iter()
        .map(|crop| encode_png(crop).map_err(image_error))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn page_with_cards(width: u32, height: u32, cards: &[(u32, u32, u32, u32)]) -> DynamicImage {
        let mut page = RgbaImage::from_pixel(width, height, WHITE);
        for &(x0, y0, x1, y1) in cards {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    page.put_pixel(x, y, BLACK);
                }
            }
        }
        DynamicImage::ImageRgba8(page)
    }

    #[test]
    fn trim_to_content_crops_to_non_background_pixels() {
        let page = page_with_cards(50, 40, &[(10, 5, 19, 24)]).to_rgba8();
        let cropped = trim_to_content(&page).expect("content");
        assert_eq!(cropped.dimensions(), (10, 20));
    }

    #[test]
    fn trim_to_content_of_blank_region_is_none() {
        let blank = RgbaImage::from_pixel(30, 30, WHITE);
        assert!(trim_to_content(&blank).is_none());
    }

    #[test]
    fn two_card_page_yields_top_then_bottom() {
        let page = page_with_cards(400, 1000, &[(50, 100, 349, 300), (60, 600, 339, 900)]);
        let crops = segment_page(&page, false, &SegmentConfig::default());

        assert_eq!(crops.len(), 2);
        assert_eq!(crops[0].dimensions(), (300, 201));
        assert_eq!(crops[1].dimensions(), (280, 301));
    }

    #[test]
    fn blank_bottom_half_is_skipped() {
        let page = page_with_cards(400, 1000, &[(50, 100, 349, 400)]);
        let crops = segment_page(&page, false, &SegmentConfig::default());

        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].dimensions(), (300, 301));
    }

    #[test]
    fn blank_page_yields_nothing() {
        let page = page_with_cards(400, 1000, &[]);
        assert!(segment_page(&page, false, &SegmentConfig::default()).is_empty());
        assert!(segment_page(&page, true, &SegmentConfig::default()).is_empty());
    }

    #[test]
    fn single_centered_card_on_last_page_spans_the_split() {
        let page = page_with_cards(400, 1000, &[(50, 430, 349, 530)]);

        let crops = segment_page(&page, true, &SegmentConfig::default());
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].dimensions(), (300, 101));

        let crops = segment_page(&page, false, &SegmentConfig::default());
        assert_eq!(crops.len(), 2);
    }

    #[test]
    fn large_cards_on_last_page_are_kept_separate() {
        let page = page_with_cards(400, 1000, &[(50, 100, 349, 400), (50, 550, 349, 900)]);
        let crops = segment_page(&page, true, &SegmentConfig::default());
        assert_eq!(crops.len(), 2);
    }

    #[test]
    fn segment_page_file_removes_the_raster() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page-1.png");
        page_with_cards(200, 500, &[(20, 40, 179, 200), (20, 300, 179, 460)])
            .save(&path)
            .expect("save");

        let images =
            segment_page_file(&path, false, &SegmentConfig::default(), "cards.pdf").expect("segment");

        assert_eq!(images.len(), 2);
        assert!(!path.exists());
        let decoded = image::load_from_memory(&images[0].data).expect("png");
        assert_eq!((decoded.width(), decoded.height()), (160, 161));
    }

    #[test]
    fn unreadable_raster_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page-1.png");
        fs::write(&path, b"not a png").expect("write");

        let err = segment_page_file(&path, false, &SegmentConfig::default(), "cards.pdf")
            .expect_err("decode failure");
        assert!(err.to_string().starts_with("cards.pdf:"));
        assert!(!path.exists());
    }
}
