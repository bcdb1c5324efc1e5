// Scripted capture runtime for integration tests.
//
// Lets each test control exactly which chunks are delivered and when, whether
// the stop confirmation ever fires, and whether acquisition succeeds — while
// counting live handles so resource-hygiene properties can be asserted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use voiceclip::{
    CaptureRuntime, Encoder, EncoderEvent, EncoderEventRx, InputStream, LevelProbe, RecorderError,
    StreamConstraints,
};

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub has_device: bool,
    /// Deny acquisition with this message (PermissionDenied)
    pub deny_with: Option<String>,
    /// Simulated time spent acquiring the stream (permission prompt)
    pub acquire_delay: Duration,
    /// Report every format as supported
    pub support_all: bool,
    pub supported: Vec<String>,
    /// Chunks delivered as soon as the encoder is built
    pub chunks_while_recording: Vec<Vec<u8>>,
    /// Chunks delivered on a flush nudge
    pub chunks_on_flush: Vec<Vec<u8>>,
    /// Chunks delivered when stop is requested
    pub chunks_on_stop: Vec<Vec<u8>>,
    /// Whether the stop confirmation event is ever sent
    pub confirm_stop: bool,
    /// Container the encoder actually uses (None = the requested one)
    pub encoder_mime: Option<String>,
    /// Spectrum magnitude for the level probe (None = no probe)
    pub probe_magnitude: Option<u8>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            has_device: true,
            deny_with: None,
            acquire_delay: Duration::ZERO,
            support_all: true,
            supported: Vec::new(),
            chunks_while_recording: Vec::new(),
            chunks_on_flush: Vec::new(),
            chunks_on_stop: Vec::new(),
            confirm_stop: true,
            encoder_mime: None,
            probe_magnitude: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockCounters {
    /// Streams currently holding the (simulated) microphone
    pub streams_live: AtomicUsize,
    pub streams_created: AtomicUsize,
    pub encoders_live: AtomicUsize,
    pub flush_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl MockCounters {
    pub fn live_handles(&self) -> usize {
        self.streams_live.load(Ordering::SeqCst) + self.encoders_live.load(Ordering::SeqCst)
    }
}

pub struct MockRuntime {
    pub behavior: MockBehavior,
    pub counters: Arc<MockCounters>,
}

impl MockRuntime {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            counters: Arc::new(MockCounters::default()),
        })
    }
}

struct MockStream {
    live: bool,
    counters: Arc<MockCounters>,
}

impl InputStream for MockStream {
    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.counters.streams_live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

struct MockEncoder {
    mime_type: String,
    events: mpsc::UnboundedSender<EncoderEvent>,
    chunks_on_flush: Vec<Vec<u8>>,
    chunks_on_stop: Vec<Vec<u8>>,
    confirm_stop: bool,
    stopped: bool,
    counters: Arc<MockCounters>,
}

impl Encoder for MockEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn request_flush(&mut self) {
        self.counters.flush_calls.fetch_add(1, Ordering::SeqCst);
        for chunk in self.chunks_on_flush.drain(..) {
            let _ = self.events.send(EncoderEvent::Data(chunk));
        }
    }

    fn stop(&mut self) {
        self.counters.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.counters.encoders_live.fetch_sub(1, Ordering::SeqCst);

        for chunk in self.chunks_on_stop.drain(..) {
            let _ = self.events.send(EncoderEvent::Data(chunk));
        }
        if self.confirm_stop {
            let _ = self.events.send(EncoderEvent::Stopped);
        }
    }
}

struct MockProbe {
    magnitude: u8,
}

impl LevelProbe for MockProbe {
    fn bin_count(&self) -> usize {
        128
    }

    fn read_spectrum(&mut self, bins: &mut [u8]) {
        bins.fill(self.magnitude);
    }
}

#[async_trait::async_trait]
impl CaptureRuntime for MockRuntime {
    fn has_input_device(&self) -> bool {
        self.behavior.has_device
    }

    fn supports_format(&self, mime: &str) -> bool {
        self.behavior.support_all || self.behavior.supported.iter().any(|m| m == mime)
    }

    async fn request_input_stream(
        &self,
        _constraints: &StreamConstraints,
    ) -> Result<Box<dyn InputStream>, RecorderError> {
        if !self.behavior.acquire_delay.is_zero() {
            tokio::time::sleep(self.behavior.acquire_delay).await;
        }
        if let Some(msg) = &self.behavior.deny_with {
            return Err(RecorderError::PermissionDenied(msg.clone()));
        }

        self.counters.streams_created.fetch_add(1, Ordering::SeqCst);
        self.counters.streams_live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            live: true,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn build_encoder(
        &self,
        _stream: &mut dyn InputStream,
        mime_type: &str,
        _timeslice: Duration,
    ) -> Result<(Box<dyn Encoder>, EncoderEventRx), RecorderError> {
        let (tx, rx) = mpsc::unbounded_channel();

        for chunk in &self.behavior.chunks_while_recording {
            let _ = tx.send(EncoderEvent::Data(chunk.clone()));
        }

        self.counters.encoders_live.fetch_add(1, Ordering::SeqCst);
        let encoder = MockEncoder {
            mime_type: self
                .behavior
                .encoder_mime
                .clone()
                .unwrap_or_else(|| mime_type.to_string()),
            events: tx,
            chunks_on_flush: self.behavior.chunks_on_flush.clone(),
            chunks_on_stop: self.behavior.chunks_on_stop.clone(),
            confirm_stop: self.behavior.confirm_stop,
            stopped: false,
            counters: Arc::clone(&self.counters),
        };

        Ok((Box::new(encoder), rx))
    }

    fn attach_level_probe(&self, _stream: &mut dyn InputStream) -> Option<Box<dyn LevelProbe>> {
        self.behavior
            .probe_magnitude
            .map(|magnitude| Box::new(MockProbe { magnitude }) as Box<dyn LevelProbe>)
    }
}
