//! Synthetic capture runtime.
//!
//! Generates a sine tone instead of touching real hardware, encodes it as WAV,
//! and delivers the artifact through the same chunked event channel a real
//! runtime would use. Stands in for a device backend in the demo binary and in
//! round-trip tests. Like some hardware runtimes, it buffers everything and
//! only delivers chunks once stop is requested.

use super::backend::{CaptureRuntime, Encoder, EncoderEvent, EncoderEventRx, InputStream, LevelProbe};
use crate::error::RecorderError;
use crate::platform::StreamConstraints;
use std::f32::consts::TAU;
use std::io::Cursor;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

const WAV_MIME: &str = "audio/wav";

/// Capture runtime producing a fixed sine tone.
#[derive(Debug, Clone)]
pub struct SynthRuntime {
    pub sample_rate: u32,
    pub frequency_hz: f32,
    /// Tone amplitude in [0, 1].
    pub amplitude: f32,
    /// Maximum size of a single delivered chunk.
    pub chunk_bytes: usize,
}

impl Default for SynthRuntime {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frequency_hz: 440.0,
            amplitude: 0.5,
            chunk_bytes: 64 * 1024,
        }
    }
}

struct SynthStream {
    live: bool,
    sample_rate: u32,
    channels: u16,
}

impl InputStream for SynthStream {
    fn stop_tracks(&mut self) {
        if self.live {
            debug!("Synth stream released");
            self.live = false;
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

struct SynthEncoder {
    events: mpsc::UnboundedSender<EncoderEvent>,
    started_at: Instant,
    sample_rate: u32,
    channels: u16,
    frequency_hz: f32,
    amplitude: f32,
    chunk_bytes: usize,
    stopped: bool,
}

impl SynthEncoder {
    fn render_wav(&self) -> Vec<u8> {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        let frames = (elapsed * self.sample_rate as f64) as usize;

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            // Writing to an in-memory cursor cannot fail.
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .expect("in-memory WAV writer");

            let step = TAU * self.frequency_hz / self.sample_rate as f32;
            for n in 0..frames {
                let sample = (self.amplitude * (step * n as f32).sin() * i16::MAX as f32) as i16;
                for _ in 0..self.channels {
                    writer.write_sample(sample).expect("in-memory WAV write");
                }
            }

            writer.finalize().expect("in-memory WAV finalize");
        }

        cursor.into_inner()
    }
}

impl Encoder for SynthEncoder {
    fn mime_type(&self) -> &str {
        WAV_MIME
    }

    fn request_flush(&mut self) {
        // WAV sizes are patched at finalize, so nothing can be delivered
        // early; everything arrives on stop.
        debug!("Synth encoder flush requested (buffered until stop)");
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let wav = self.render_wav();
        info!("Synth encoder stopped: {} bytes rendered", wav.len());

        for piece in wav.chunks(self.chunk_bytes) {
            let _ = self.events.send(EncoderEvent::Data(piece.to_vec()));
        }
        let _ = self.events.send(EncoderEvent::Stopped);
    }
}

struct SynthProbe {
    magnitude: u8,
}

impl LevelProbe for SynthProbe {
    fn bin_count(&self) -> usize {
        128
    }

    fn read_spectrum(&mut self, bins: &mut [u8]) {
        bins.fill(self.magnitude);
    }
}

#[async_trait::async_trait]
impl CaptureRuntime for SynthRuntime {
    fn has_input_device(&self) -> bool {
        true
    }

    fn supports_format(&self, mime: &str) -> bool {
        mime == WAV_MIME
    }

    async fn request_input_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn InputStream>, RecorderError> {
        let stream = SynthStream {
            live: true,
            sample_rate: constraints.sample_rate.unwrap_or(self.sample_rate),
            channels: constraints.channels.unwrap_or(1),
        };
        info!(
            "Synth stream opened: {} Hz, {} channel(s)",
            stream.sample_rate, stream.channels
        );
        Ok(Box::new(stream))
    }

    fn build_encoder(
        &self,
        stream: &mut dyn InputStream,
        mime_type: &str,
        _timeslice: Duration,
    ) -> Result<(Box<dyn Encoder>, EncoderEventRx), RecorderError> {
        if mime_type != WAV_MIME {
            return Err(RecorderError::Encoder(format!(
                "synth runtime cannot encode {mime_type}"
            )));
        }
        if !stream.is_live() {
            return Err(RecorderError::Encoder("stream is not live".to_string()));
        }

        // The synth always renders mono at its configured rate, regardless of
        // what the stream negotiated.
        let (tx, rx) = mpsc::unbounded_channel();
        let encoder = SynthEncoder {
            events: tx,
            started_at: Instant::now(),
            sample_rate: self.sample_rate,
            channels: 1,
            frequency_hz: self.frequency_hz,
            amplitude: self.amplitude,
            chunk_bytes: self.chunk_bytes.max(1),
            stopped: false,
        };

        Ok((Box::new(encoder), rx))
    }

    fn attach_level_probe(&self, _stream: &mut dyn InputStream) -> Option<Box<dyn LevelProbe>> {
        Some(Box::new(SynthProbe {
            magnitude: (self.amplitude.clamp(0.0, 1.0) * 255.0) as u8,
        }))
    }
}
