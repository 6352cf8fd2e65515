//! Reads the current value of a locked training menu item.
//!
//! Two strategies, chosen per item by the layout file: measure the pixel
//! width of the highlighted yellow value text, or compare the value region
//! against per-option reference images.

use std::collections::HashMap;

use image::RgbImage;
use tracing::debug;

use crate::config::OPTION_YELLOW_BAND;
use crate::error::CaptureError;
use crate::models::menu_layout::{
    DetectionMethod, ItemDetection, ItemOptionSpec, MenuLayout, OptionDef,
};
use crate::models::region::Region;
use crate::services::classifier;
use crate::services::screen_capture::FrameSource;

/// Similarity floor for image comparison when the item does not set one.
pub const DEFAULT_COMPARISON_THRESHOLD: f64 = 0.85;

/// Width in pixels of the yellow value text, measured as the distance
/// between the first and last column containing a yellow pixel.
pub fn yellow_span(image: &RgbImage) -> Option<u32> {
    let lit: Vec<u32> = (0..image.width())
        .filter(|&x| {
            (0..image.height()).any(|y| {
                let p = image.get_pixel(x, y);
                OPTION_YELLOW_BAND.contains(p[0], p[1], p[2])
            })
        })
        .collect();
    match (lit.first(), lit.last()) {
        (Some(&first), Some(&last)) => Some(last - first),
        _ => None,
    }
}

/// Pick the option whose expected width lies closest to the measured span,
/// within the tolerance. No span or no hit reports the default option.
fn match_by_yellow_width(
    spec: &ItemOptionSpec,
    definitions: &HashMap<String, OptionDef>,
    measured: Option<u32>,
    tolerance: u32,
) -> String {
    let fallback = spec.default_option().to_string();
    let Some(measured) = measured else {
        return fallback;
    };
    let mut best: Option<(&str, u32)> = None;
    for key in &spec.options {
        if key == spec.default_option() {
            continue;
        }
        let Some(width) = definitions.get(key).and_then(|def| def.width) else {
            continue;
        };
        let diff = width.abs_diff(measured);
        if diff < tolerance && best.map_or(true, |(_, best_diff)| diff < best_diff) {
            best = Some((key, diff));
        }
    }
    match best {
        Some((key, diff)) => {
            debug!(option = key, measured, diff, "yellow width matched");
            key.to_string()
        }
        None => fallback,
    }
}

/// Pick the option whose reference image looks most like the captured
/// value region. A best match below the threshold reports the first option.
fn match_by_image(
    spec: &ItemOptionSpec,
    option_images: &HashMap<String, RgbImage>,
    captured: &RgbImage,
    threshold: f64,
) -> String {
    let probe = classifier::to_gray(captured);
    let mut best: Option<(&str, f64)> = None;
    for key in &spec.options {
        let Some(reference) = option_images.get(key) else {
            continue;
        };
        let reference = classifier::to_gray(reference);
        let score = match spec.binary_threshold {
            Some(cut) => classifier::binarized_similarity(&probe, &reference, cut),
            None => classifier::grayscale_similarity(&probe, &reference),
        };
        let better = match best {
            Some((_, top)) => score > top,
            None => true,
        };
        if better {
            best = Some((key, score));
        }
    }
    match best {
        Some((key, score)) if score >= threshold => {
            debug!(option = key, score, "option image matched");
            key.to_string()
        }
        Some((key, score)) => {
            debug!(best = key, score, threshold, "option images all below threshold");
            spec.options[0].clone()
        }
        None => spec.options[0].clone(),
    }
}

/// Value region for the given item row: the item's fixed override if it has
/// one, otherwise the shared row-relative geometry.
fn value_region_for(detection: &ItemDetection, spec: &ItemOptionSpec, item_row: u32) -> Region {
    if let Some(region) = spec.value_region {
        return region;
    }
    let layout = &detection.value_region;
    let top = (item_row as i32 + layout.top_offset).max(0) as u32;
    Region::new(top, layout.left, layout.width, layout.height)
}

/// Read the current value of the locked item sitting at `item_row` and
/// return the matched option key.
pub fn detect_option(
    frames: &dyn FrameSource,
    layout: &MenuLayout,
    option_images: &HashMap<String, RgbImage>,
    spec: &ItemOptionSpec,
    item_row: u32,
) -> Result<String, CaptureError> {
    let region = value_region_for(&layout.item_detection, spec, item_row);
    let image = frames.capture(&region)?;
    let key = match spec.detection_method {
        DetectionMethod::YellowWidth => {
            let span = yellow_span(&image);
            match_by_yellow_width(
                spec,
                &layout.option_definitions,
                span,
                layout.detection_settings.yellow_width_tolerance,
            )
        }
        DetectionMethod::ImageComparison => {
            let threshold = spec
                .comparison_threshold
                .unwrap_or(DEFAULT_COMPARISON_THRESHOLD);
            match_by_image(spec, option_images, &image, threshold)
        }
    };
    Ok(key)
}
