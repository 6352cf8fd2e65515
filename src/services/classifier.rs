//! Pixel classification against reference templates and color bands.
//!
//! Similarity is `1 - MSE/255^2` over grayscale pixels, so identical images
//! score 1.0 and maximally different images score 0.0. Reference images are
//! resized to the probe's dimensions before comparison; name comparison goes
//! the other way because the stored template defines the canonical size.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};

use crate::config::{
    ColorBand, CLASSIC_BAND, CONTROL_BAND_MIN_PIXELS, CONTROL_SAMPLE_WINDOW, HEALTH_BAND_FRACTION,
    HEALTH_BLUE_BAND, HEALTH_RED_BAND, HEALTH_SAMPLE_WINDOW, HEALTH_YELLOW_BAND, MODERN_BAND,
    NAME_BINARY_CUT, TEMPLATE_BINARY_CUT,
};
use crate::models::labels::{ControlScheme, HealthColor};

const MAX_MSE: f64 = 255.0 * 255.0;

/// Convert a captured color patch to grayscale.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Threshold a grayscale image to pure black and white.
pub fn binarize(image: &GrayImage, cut: u8) -> GrayImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > cut {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// True when any pixel exceeds the value cut. Run on binarized images this
/// answers "is anything lit in this patch".
pub fn has_lit_pixels(image: &GrayImage, cut: u8) -> bool {
    image.pixels().any(|p| p[0] > cut)
}

fn resized_to(image: &GrayImage, (width, height): (u32, u32)) -> Cow<'_, GrayImage> {
    if image.dimensions() == (width, height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(imageops::resize(image, width, height, FilterType::Triangle))
    }
}

fn mean_squared_error(a: &GrayImage, b: &GrayImage) -> f64 {
    let total = a.width() as f64 * a.height() as f64;
    if total == 0.0 {
        return MAX_MSE;
    }
    let sum: f64 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            let d = pa[0] as f64 - pb[0] as f64;
            d * d
        })
        .sum();
    sum / total
}

/// Plain grayscale similarity, reference resized to the probe's dimensions.
pub fn grayscale_similarity(probe: &GrayImage, reference: &GrayImage) -> f64 {
    let reference = resized_to(reference, probe.dimensions());
    1.0 - mean_squared_error(probe, &reference) / MAX_MSE
}

/// Similarity after binarizing both sides, for badge art where lighting
/// varies but shape does not.
pub fn binarized_similarity(probe: &GrayImage, reference: &GrayImage, cut: u8) -> f64 {
    let reference = resized_to(reference, probe.dimensions());
    let probe = binarize(probe, cut);
    let reference = binarize(&reference, cut);
    1.0 - mean_squared_error(&probe, &reference) / MAX_MSE
}

/// Compare a captured name patch against the stored player name template.
///
/// The capture is resized to the template's dimensions and binarized; the
/// template is stored pre-binarized and used as-is.
pub fn name_similarity(template: &GrayImage, captured: &GrayImage) -> f64 {
    let captured = resized_to(captured, template.dimensions());
    let captured = binarize(&captured, NAME_BINARY_CUT);
    1.0 - mean_squared_error(template, &captured) / MAX_MSE
}

fn center_window(image: &RgbImage, window: u32) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
    let half = window / 2;
    let cy = image.height() / 2;
    let cx = image.width() / 2;
    let ys = cy.saturating_sub(half)..(cy + half + 1).min(image.height());
    let xs = cx.saturating_sub(half)..(cx + half + 1).min(image.width());
    (ys, xs)
}

fn count_band(image: &RgbImage, window: u32, bands: &[ColorBand]) -> (Vec<u32>, u32) {
    let (ys, xs) = center_window(image, window);
    let mut counts = vec![0u32; bands.len()];
    let mut total = 0u32;
    for y in ys {
        for x in xs.clone() {
            total += 1;
            let p = image.get_pixel(x, y);
            for (count, band) in counts.iter_mut().zip(bands) {
                if band.contains(p[0], p[1], p[2]) {
                    *count += 1;
                }
            }
        }
    }
    (counts, total)
}

/// Classify the innermost window of a health bar patch.
///
/// A color wins when at least 80% of the window sits inside its band,
/// checked red, then yellow, then blue.
pub fn health_color(image: &RgbImage) -> Option<HealthColor> {
    let (counts, total) = count_band(
        image,
        HEALTH_SAMPLE_WINDOW,
        &[HEALTH_RED_BAND, HEALTH_YELLOW_BAND, HEALTH_BLUE_BAND],
    );
    if total == 0 {
        return None;
    }
    let need = total as f64 * HEALTH_BAND_FRACTION;
    if counts[0] as f64 >= need {
        Some(HealthColor::Red)
    } else if counts[1] as f64 >= need {
        Some(HealthColor::Yellow)
    } else if counts[2] as f64 >= need {
        Some(HealthColor::Blue)
    } else {
        None
    }
}

/// Classify the control scheme from the badge color patch, Modern first.
pub fn control_color(image: &RgbImage) -> Option<ControlScheme> {
    let (counts, total) = count_band(image, CONTROL_SAMPLE_WINDOW, &[MODERN_BAND, CLASSIC_BAND]);
    if total == 0 {
        return None;
    }
    if counts[0] >= CONTROL_BAND_MIN_PIXELS {
        Some(ControlScheme::Modern)
    } else if counts[1] >= CONTROL_BAND_MIN_PIXELS {
        Some(ControlScheme::Classic)
    } else {
        None
    }
}

/// How a template set scores its references against a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Plain grayscale MSE.
    Plain,
    /// Binarize both sides at [`TEMPLATE_BINARY_CUT`] first.
    Binarized,
}

/// An ordered set of labeled reference images.
///
/// Iteration order is load order; on tied scores the earlier entry wins.
#[derive(Debug)]
pub struct TemplateSet<T> {
    entries: Vec<(T, GrayImage)>,
}

impl<T> TemplateSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, label: T, image: GrayImage) {
        self.entries.push((label, image));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-scoring label and its similarity, or `None` for an empty set.
    ///
    /// Callers apply their own floors; this only ranks.
    pub fn best_match(&self, probe: &GrayImage, mode: CompareMode) -> Option<(&T, f64)> {
        let mut best: Option<(&T, f64)> = None;
        for (label, reference) in &self.entries {
            let score = match mode {
                CompareMode::Plain => grayscale_similarity(probe, reference),
                CompareMode::Binarized => {
                    binarized_similarity(probe, reference, TEMPLATE_BINARY_CUT)
                }
            };
            let improved = match &best {
                Some((_, top)) => score > *top,
                None => true,
            };
            if improved {
                best = Some((label, score));
            }
        }
        best
    }
}

impl<T> Default for TemplateSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat_gray(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    fn flat_rgb(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    /// Paint the first `n` pixels of the center window, same scan order as
    /// the classifier.
    fn paint_center(image: &mut RgbImage, window: u32, n: u32, rgb: [u8; 3]) {
        let (ys, xs) = center_window(image, window);
        let mut painted = 0;
        for y in ys {
            for x in xs.clone() {
                if painted >= n {
                    return;
                }
                image.put_pixel(x, y, Rgb(rgb));
                painted += 1;
            }
        }
    }

    #[test]
    fn test_identical_images_score_one() {
        let a = flat_gray(10, 10, 128);
        assert_eq!(grayscale_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_opposite_images_score_zero() {
        let black = flat_gray(8, 8, 0);
        let white = flat_gray(8, 8, 255);
        assert_eq!(grayscale_similarity(&black, &white), 0.0);
    }

    #[test]
    fn test_reference_resized_to_probe() {
        let probe = flat_gray(10, 10, 128);
        let reference = flat_gray(5, 5, 128);
        assert_eq!(grayscale_similarity(&probe, &reference), 1.0);
    }

    #[test]
    fn test_binarized_similarity_splits_at_cut() {
        let probe = flat_gray(6, 6, 200);
        let reference = flat_gray(6, 6, 100);
        // 200 binarizes white, 100 binarizes black.
        assert_eq!(binarized_similarity(&probe, &reference, 150), 0.0);
        let reference = flat_gray(6, 6, 180);
        assert_eq!(binarized_similarity(&probe, &reference, 150), 1.0);
    }

    #[test]
    fn test_name_similarity_binarizes_capture() {
        let template = flat_gray(4, 2, 255);
        let bright = flat_gray(4, 2, 200);
        let dark = flat_gray(4, 2, 100);
        assert_eq!(name_similarity(&template, &bright), 1.0);
        assert_eq!(name_similarity(&template, &dark), 0.0);
    }

    #[test]
    fn test_name_similarity_resizes_capture_to_template() {
        let template = flat_gray(4, 2, 255);
        let wide_capture = flat_gray(8, 4, 220);
        assert_eq!(name_similarity(&template, &wide_capture), 1.0);
    }

    #[test]
    fn test_binarize_threshold_is_strict() {
        let image = flat_gray(2, 2, 150);
        assert!(!has_lit_pixels(&binarize(&image, 150), 0));
        let image = flat_gray(2, 2, 151);
        assert!(has_lit_pixels(&binarize(&image, 150), 0));
    }

    #[test]
    fn test_has_lit_pixels() {
        let mut image = flat_gray(5, 5, 0);
        assert!(!has_lit_pixels(&image, 200));
        image.put_pixel(3, 1, Luma([255]));
        assert!(has_lit_pixels(&image, 200));
    }

    #[test]
    fn test_health_color_requires_band_fraction() {
        // 7x7 window is 49 pixels; 80% rounds up to 40.
        let mut image = flat_rgb(24, 15, [0, 0, 0]);
        paint_center(&mut image, HEALTH_SAMPLE_WINDOW, 40, [217, 28, 95]);
        assert_eq!(health_color(&image), Some(HealthColor::Red));

        let mut short = flat_rgb(24, 15, [0, 0, 0]);
        paint_center(&mut short, HEALTH_SAMPLE_WINDOW, 39, [217, 28, 95]);
        assert_eq!(health_color(&short), None);
    }

    #[test]
    fn test_health_color_yellow_and_blue() {
        let yellow = flat_rgb(24, 15, [251, 248, 107]);
        assert_eq!(health_color(&yellow), Some(HealthColor::Yellow));
        let blue = flat_rgb(24, 15, [13, 107, 186]);
        assert_eq!(health_color(&blue), Some(HealthColor::Blue));
        let off = flat_rgb(24, 15, [128, 128, 128]);
        assert_eq!(health_color(&off), None);
    }

    #[test]
    fn test_control_color_needs_three_pixels() {
        let mut image = flat_rgb(3, 3, [0, 200, 0]);
        paint_center(&mut image, CONTROL_SAMPLE_WINDOW, 3, [120, 40, 20]);
        assert_eq!(control_color(&image), Some(ControlScheme::Modern));

        let mut sparse = flat_rgb(3, 3, [0, 200, 0]);
        paint_center(&mut sparse, CONTROL_SAMPLE_WINDOW, 2, [120, 40, 20]);
        assert_eq!(control_color(&sparse), None);
    }

    #[test]
    fn test_control_color_classic() {
        let image = flat_rgb(3, 3, [70, 6, 120]);
        assert_eq!(control_color(&image), Some(ControlScheme::Classic));
    }

    #[test]
    fn test_best_match_prefers_higher_score() {
        let mut set = TemplateSet::new();
        set.push("dark", flat_gray(6, 6, 0));
        set.push("bright", flat_gray(6, 6, 250));
        let probe = flat_gray(6, 6, 250);
        let (label, score) = set.best_match(&probe, CompareMode::Plain).unwrap();
        assert_eq!(*label, "bright");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_best_match_tie_keeps_first() {
        let mut set = TemplateSet::new();
        set.push("first", flat_gray(6, 6, 100));
        set.push("second", flat_gray(6, 6, 100));
        let probe = flat_gray(6, 6, 100);
        let (label, _) = set.best_match(&probe, CompareMode::Plain).unwrap();
        assert_eq!(*label, "first");
    }

    #[test]
    fn test_best_match_empty_set() {
        let set: TemplateSet<&str> = TemplateSet::new();
        let probe = flat_gray(4, 4, 0);
        assert!(set.best_match(&probe, CompareMode::Plain).is_none());
    }
}
