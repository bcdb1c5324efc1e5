pub mod backend;
pub mod synth;

pub use backend::{CaptureRuntime, Encoder, EncoderEvent, EncoderEventRx, InputStream, LevelProbe};
pub use synth::SynthRuntime;
