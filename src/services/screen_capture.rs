use image::{DynamicImage, RgbImage};
use tracing::{info, warn};
use xcap::Monitor;

use crate::error::CaptureError;
use crate::models::region::Region;

/// Width and height the detection regions were measured against.
pub const REFERENCE_LAYOUT: (u32, u32) = (1920, 1080);

/// Source of screen pixels for a fixed region.
///
/// The one production implementation grabs the real screen; tests swap in
/// scripted frames.
pub trait FrameSource {
    fn capture(&self, region: &Region) -> Result<RgbImage, CaptureError>;
}

/// Captures regions from one monitor by grabbing the full frame and
/// cropping. Region coordinates are physical pixels.
pub struct ScreenGrabber {
    monitor: Monitor,
}

impl ScreenGrabber {
    /// Attach to the primary monitor.
    pub fn new() -> Result<Self, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or(CaptureError::NoPrimaryMonitor)?;
        Ok(Self::attach(monitor))
    }

    /// Attach to a specific monitor by enumeration index.
    pub fn with_monitor(index: usize) -> Result<Self, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;
        let count = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(index)
            .ok_or(CaptureError::MonitorIndex(index))?;
        info!(index, available = count, "using selected monitor");
        Ok(Self::attach(monitor))
    }

    fn attach(monitor: Monitor) -> Self {
        let width = monitor.width().unwrap_or(0);
        let height = monitor.height().unwrap_or(0);
        info!(width, height, "attached to monitor");
        if (width, height) != REFERENCE_LAYOUT {
            warn!(
                expected_width = REFERENCE_LAYOUT.0,
                expected_height = REFERENCE_LAYOUT.1,
                "monitor resolution differs from the reference layout, detection regions may miss"
            );
        }
        Self { monitor }
    }
}

impl FrameSource for ScreenGrabber {
    fn capture(&self, region: &Region) -> Result<RgbImage, CaptureError> {
        let frame = self
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::Grab(e.to_string()))?;
        let frame = DynamicImage::ImageRgba8(frame);

        let out_of_bounds = CaptureError::OutOfBounds {
            top: region.top,
            left: region.left,
            width: region.width,
            height: region.height,
        };
        if region.left >= frame.width() || region.top >= frame.height() {
            return Err(out_of_bounds);
        }
        let width = region.width.min(frame.width() - region.left);
        let height = region.height.min(frame.height() - region.top);
        if width == 0 || height == 0 {
            return Err(out_of_bounds);
        }

        let cropped = frame.crop_imm(region.left, region.top, width, height);
        Ok(cropped.to_rgb8())
    }
}

/// Test stand-in that serves queued frames per region. The last frame of a
/// queue repeats, so a static screen only needs one entry.
#[cfg(test)]
pub(crate) struct ScriptedFrames {
    #[allow(clippy::type_complexity)]
    frames: std::cell::RefCell<
        std::collections::HashMap<Region, std::collections::VecDeque<Result<RgbImage, String>>>,
    >,
}

#[cfg(test)]
impl ScriptedFrames {
    pub(crate) fn new() -> Self {
        Self {
            frames: std::cell::RefCell::new(std::collections::HashMap::new()),
        }
    }

    pub(crate) fn push(&self, region: Region, frame: RgbImage) {
        self.frames
            .borrow_mut()
            .entry(region)
            .or_default()
            .push_back(Ok(frame));
    }

    pub(crate) fn push_failure(&self, region: Region) {
        self.frames
            .borrow_mut()
            .entry(region)
            .or_default()
            .push_back(Err("scripted capture failure".to_string()));
    }
}

#[cfg(test)]
impl FrameSource for ScriptedFrames {
    fn capture(&self, region: &Region) -> Result<RgbImage, CaptureError> {
        let mut frames = self.frames.borrow_mut();
        let queue = frames
            .get_mut(region)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| panic!("no scripted frame for region {region:?}"));
        let entry = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().unwrap().clone()
        };
        entry.map_err(CaptureError::Grab)
    }
}
