//! The finalized recording artifact.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use uuid::Uuid;

/// Revocable handle to a playable artifact.
///
/// The controller owns revocation: clearing the result, or publishing a new
/// one, revokes the previous handle. Consumers holding a clone observe the
/// revocation instead of playing stale audio.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    url: String,
    revoked: Arc<AtomicBool>,
}

impl PlaybackHandle {
    fn new() -> Self {
        Self {
            url: format!("memory://recordings/{}", Uuid::new_v4()),
            revoked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Idempotent.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

/// A finished, playable recording.
///
/// Cheap to clone: the audio bytes are shared, and the duration is a shared
/// cell so the asynchronous decode-probe refinement is visible through every
/// clone.
#[derive(Debug, Clone)]
pub struct Preview {
    data: Arc<Vec<u8>>,
    mime_type: String,
    playback: PlaybackHandle,
    duration_secs: Arc<AtomicU64>,
}

impl Preview {
    pub fn new(data: Vec<u8>, mime_type: String, duration_secs: u64) -> Self {
        Self {
            data: Arc::new(data),
            mime_type,
            playback: PlaybackHandle::new(),
            duration_secs: Arc::new(AtomicU64::new(duration_secs)),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn playback(&self) -> &PlaybackHandle {
        &self.playback
    }

    /// Best-effort duration in whole seconds. Starts as the elapsed-timer
    /// estimate and may be raised once by [`Preview::refine_duration`].
    pub fn duration_seconds(&self) -> u64 {
        self.duration_secs.load(Ordering::SeqCst)
    }

    pub fn revoke(&self) {
        self.playback.revoke();
    }

    /// Decode the artifact's metadata and adopt the reported duration when it
    /// exceeds the timer estimate (the timer under-counts by the encoder's
    /// startup latency). Runs after the preview is already published, so it
    /// must never block materialization; callers spawn it.
    pub fn refine_duration(&self) {
        match probe_duration_secs(&self.data, &self.mime_type) {
            Some(probed) => {
                let current = self.duration_secs.load(Ordering::SeqCst);
                if probed > current {
                    debug!("Refined duration: {}s -> {}s", current, probed);
                    self.duration_secs.store(probed, Ordering::SeqCst);
                }
            }
            None => {
                warn!("Duration probe failed for {}", self.mime_type);
            }
        }
    }
}

/// Probe the encoded bytes with symphonia and report the decoded duration in
/// whole seconds, rounded.
fn probe_duration_secs(data: &[u8], mime_type: &str) -> Option<u64> {
    let source = ReadOnlySource::new(Cursor::new(data.to_vec()));
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.mime_type(mime_type);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;

    let params = &track.codec_params;
    let frames = params.n_frames?;
    let rate = params.sample_rate?;

    Some((frames as f64 / rate as f64).round() as u64)
}
