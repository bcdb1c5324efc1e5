//! Input level metering.
//!
//! Samples a frequency-domain probe on a fixed interval and publishes a
//! normalized loudness value for UI feedback. Fully independent of the chunk
//! pipeline: a meter failure or absence never affects the recorded artifact.

use crate::runtime::LevelProbe;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Average spectrum magnitude normalized into [0, 1].
///
/// Bin magnitudes are bytes; half-scale (128) already maps to full meter
/// deflection so quiet input remains visible.
pub(crate) fn normalized_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u64 = bins.iter().map(|&b| b as u64).sum();
    let avg = sum as f32 / bins.len() as f32;
    (avg / 128.0).min(1.0)
}

/// A running sampling loop over a level probe.
pub struct Meter {
    stop_tx: watch::Sender<bool>,
}

impl Meter {
    /// Spawn the sampling loop. The probe is owned by the loop and dropped
    /// (disconnecting the analysis graph) when the meter shuts down.
    pub fn spawn(
        mut probe: Box<dyn LevelProbe>,
        level_tx: watch::Sender<f32>,
        interval: Duration,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            let mut bins = vec![0u8; probe.bin_count()];
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    // Fires on the shutdown signal or when the Meter handle
                    // is dropped without one.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        probe.read_spectrum(&mut bins);
                        if level_tx.send(normalized_level(&bins)).is_err() {
                            return;
                        }
                    }
                }
            }

            // The task is the only sender of levels, so zeroing from inside
            // it guarantees no sample lands after the zero.
            let _ = level_tx.send(0.0);
        });

        Self { stop_tx }
    }

    /// Stop sampling and zero the published level. Must run on every session
    /// teardown path; a leaked sampling loop keeps consuming CPU after the
    /// recording ends.
    pub fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        debug!("Level meter stopped");
    }
}
