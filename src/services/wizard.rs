//! First-run capture of the player's own name plate.
//!
//! Opponent identification needs a reference image of the player's name as
//! it appears on the versus screen. The wizard talks the player through
//! queueing into a match, waits for the versus screen, then grabs the left
//! name plate, binarizes it, and saves it next to the executable.

use std::path::Path;
use std::time::Duration;

use image::GrayImage;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{CONTROL_REGIONS, CONTROL_SIMILARITY_THRESHOLD, NAME_BINARY_CUT, NAME_REGIONS};
use crate::error::{CaptureError, WizardError};
use crate::models::labels::ControlScheme;
use crate::models::region::Side;
use crate::services::audio::CueSink;
use crate::services::classifier::{self, CompareMode, TemplateSet};
use crate::services::screen_capture::FrameSource;

pub const WIZARD_START_CUE: &str = "wizard_start.ogg";
pub const WIZARD_INSTRUCTIONS_CUE: &str = "wizard_instructions.ogg";
pub const WIZARD_COMPLETE_CUE: &str = "wizard_complete.ogg";
pub const WIZARD_ERROR_CUE: &str = "wizard_error.ogg";

const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// The versus screen blinks while loading; wait this long before trusting it.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Wait for a versus screen, then capture and save the player's name plate.
/// Returns the binarized template that the resolver should use from now on.
pub async fn capture_player_name(
    frames: &dyn FrameSource,
    controls: &TemplateSet<ControlScheme>,
    speaker: &dyn CueSink,
    save_path: &Path,
) -> Result<GrayImage, WizardError> {
    info!("name capture wizard started");
    speaker.play(WIZARD_START_CUE, false);
    speaker.play(WIZARD_INSTRUCTIONS_CUE, false);

    loop {
        match gate_score(frames, controls) {
            Ok(score) if score >= CONTROL_SIMILARITY_THRESHOLD => {}
            Ok(_) => {
                sleep(POLL_INTERVAL).await;
                continue;
            }
            Err(e) => return fail(speaker, e.into()),
        }
        sleep(SETTLE_DELAY).await;
        match gate_score(frames, controls) {
            Ok(score) if score >= CONTROL_SIMILARITY_THRESHOLD => break,
            Ok(_) => continue,
            Err(e) => return fail(speaker, e.into()),
        }
    }
    info!("versus screen up, capturing name plate");

    let capture = match frames.capture(&NAME_REGIONS[Side::Left.index()]) {
        Ok(image) => image,
        Err(e) => return fail(speaker, e.into()),
    };
    let template = classifier::binarize(&classifier::to_gray(&capture), NAME_BINARY_CUT);
    if let Err(e) = template.save(save_path) {
        return fail(
            speaker,
            WizardError::Save {
                path: save_path.to_path_buf(),
                reason: e.to_string(),
            },
        );
    }
    info!(path = %save_path.display(), "player name template saved");
    speaker.play(WIZARD_COMPLETE_CUE, false);
    Ok(template)
}

fn fail(speaker: &dyn CueSink, error: WizardError) -> Result<GrayImage, WizardError> {
    warn!(error = %error, "name capture wizard failed");
    speaker.play(WIZARD_ERROR_CUE, false);
    Err(error)
}

fn gate_score(
    frames: &dyn FrameSource,
    controls: &TemplateSet<ControlScheme>,
) -> Result<f64, CaptureError> {
    let image = frames.capture(&CONTROL_REGIONS[Side::Left.index()])?;
    let probe = classifier::to_gray(&image);
    Ok(controls
        .best_match(&probe, CompareMode::Plain)
        .map(|(_, score)| score)
        .unwrap_or(0.0))
}
