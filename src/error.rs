use thiserror::Error;

/// Errors surfaced to the caller of [`Recorder::start`](crate::Recorder::start).
///
/// These all require user action (grant permission, plug in a device), so they
/// are reported directly rather than retried. Empty recordings and finalize
/// timeouts are not errors: they resolve to a missing or partial result.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("no audio input device available")]
    NoInputDevice,

    #[error("no supported recording format among {0:?}")]
    UnsupportedFormat(Vec<String>),

    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("encoder error: {0}")]
    Encoder(String),
}
