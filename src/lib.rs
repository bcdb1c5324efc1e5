pub mod config;
pub mod error;
pub mod meter;
pub mod platform;
pub mod preview;
pub mod runtime;
pub mod session;

pub use config::RecorderConfig;
pub use error::RecorderError;
pub use platform::{PlatformClass, PlatformProfile, StreamConstraints};
pub use preview::{PlaybackHandle, Preview};
pub use runtime::{
    CaptureRuntime, Encoder, EncoderEvent, EncoderEventRx, InputStream, LevelProbe, SynthRuntime,
};
pub use session::{Recorder, RecorderSnapshot, SessionState};
