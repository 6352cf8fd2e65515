use std::path::PathBuf;

/// Errors raised while grabbing screen pixels.
///
/// Capture failures are never fatal after startup: callers log them and
/// abandon the current check, leaving tracker state unchanged.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),
    #[error("no primary monitor found")]
    NoPrimaryMonitor,
    #[error("monitor index {0} not found")]
    MonitorIndex(usize),
    #[error("screen grab failed: {0}")]
    Grab(String),
    #[error("region at ({left},{top}) {width}x{height} lies outside the captured frame")]
    OutOfBounds {
        top: u32,
        left: u32,
        width: u32,
        height: u32,
    },
}

/// Errors raised while loading reference images and layout files at startup.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("missing required image: {0}")]
    MissingImage(PathBuf),
    #[error("failed to decode image {path}: {reason}")]
    ImageDecode { path: PathBuf, reason: String },
    #[error("invalid menu layout: {0}")]
    LayoutInvalid(String),
    #[error("failed to resolve resource directory: {0}")]
    ResourceDir(String),
}

/// Errors raised while opening the audio output at startup.
///
/// Missing cue files at play time are not errors; they are logged and skipped.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("no audio output device available: {0}")]
    Device(String),
}

/// Errors raised by the first-run name capture wizard.
#[derive(thiserror::Error, Debug)]
pub enum WizardError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("failed to save name template {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}
