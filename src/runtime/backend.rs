use crate::error::RecorderError;
use crate::platform::StreamConstraints;
use std::time::Duration;
use tokio::sync::mpsc;

/// Events delivered by an [`Encoder`], in capture order.
#[derive(Debug)]
pub enum EncoderEvent {
    /// An encoded data chunk. Chunks concatenated in arrival order form the
    /// finished artifact.
    Data(Vec<u8>),
    /// The encoder has stopped; no well-behaved runtime sends `Data` after
    /// this, but trailing chunks are tolerated (see the finalizer).
    Stopped,
}

/// Receiver half of an encoder's event stream.
///
/// Unbounded so that runtime callbacks never block on the controller.
pub type EncoderEventRx = mpsc::UnboundedReceiver<EncoderEvent>;

/// A claim on the microphone hardware.
///
/// Exclusively owned by the active session; `stop_tracks` must be idempotent
/// and must release the claim so another consumer (or the next session) can
/// reacquire the device without a "device busy" failure.
pub trait InputStream: Send {
    fn stop_tracks(&mut self);

    fn is_live(&self) -> bool;
}

/// An encoder bound to a live input stream.
///
/// Control methods are infallible by design: they run on teardown paths and a
/// failure there must never trap the session outside Idle. Implementations
/// log problems instead of propagating them.
pub trait Encoder: Send {
    /// The container/codec actually in use (may differ from the requested one
    /// when the runtime picked a fallback).
    fn mime_type(&self) -> &str;

    /// Nudge the encoder to deliver any buffered data. Must be called before
    /// `stop` on runtimes that buffer chunks.
    fn request_flush(&mut self);

    /// Signal the encoder to stop. The stop confirmation arrives as
    /// [`EncoderEvent::Stopped`] on the event channel.
    fn stop(&mut self);
}

/// Frequency-domain analysis over a live stream, for UI level metering.
///
/// Bin magnitudes are bytes in 0..=255; the meter normalizes against that
/// range. Dropping the probe disconnects the analysis graph.
pub trait LevelProbe: Send {
    fn bin_count(&self) -> usize;

    /// Fill `bins` with the current spectrum magnitudes.
    fn read_spectrum(&mut self, bins: &mut [u8]);
}

/// The runtime capability the controller consumes: device enumeration, stream
/// acquisition, encoding, and level analysis.
///
/// Implementations:
/// - [`SynthRuntime`](crate::runtime::SynthRuntime): synthetic tone source
///   for demos and round-trip tests
/// - scripted mocks in the integration tests
#[async_trait::async_trait]
pub trait CaptureRuntime: Send + Sync {
    /// Whether any microphone-capable input exists. Checked before anything
    /// is acquired.
    fn has_input_device(&self) -> bool;

    /// Whether the runtime can encode into the given container/codec.
    fn supports_format(&self, mime: &str) -> bool;

    /// Request an input stream under the given constraints.
    ///
    /// May suspend indefinitely while the user decides on a permission
    /// prompt; that wait is deliberately not subject to a timeout.
    async fn request_input_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn InputStream>, RecorderError>;

    /// Construct an encoder bound to the stream, producing data chunks
    /// roughly every `timeslice`.
    fn build_encoder(
        &self,
        stream: &mut dyn InputStream,
        mime_type: &str,
        timeslice: Duration,
    ) -> Result<(Box<dyn Encoder>, EncoderEventRx), RecorderError>;

    /// Attach a frequency-domain probe to the stream. `None` means the
    /// runtime has no analysis primitive; metering is then skipped without
    /// affecting the recording.
    fn attach_level_probe(&self, stream: &mut dyn InputStream) -> Option<Box<dyn LevelProbe>>;
}
