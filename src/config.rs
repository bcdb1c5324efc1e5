use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Timing knobs for the capture session controller.
///
/// Defaults match the behavior the controller was tuned for; a config file is
/// only needed to override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Requested interval between encoder data chunks, in milliseconds.
    pub timeslice_ms: u64,

    /// Grace delay after the encoder confirms stop, letting runtimes that
    /// deliver trailing chunks asynchronously land them before assembly.
    pub stop_grace_ms: u64,

    /// Bounded retries when stop confirmed but no chunks have arrived yet.
    pub finalize_retry_limit: u32,

    /// Delay between finalize retries, in milliseconds.
    pub finalize_retry_delay_ms: u64,

    /// Safety timeout for `stop_and_get_result`: if the stop confirmation
    /// never fires, resolve with whatever partial data exists.
    pub safety_timeout_ms: u64,

    /// Level meter sampling interval, in milliseconds.
    pub meter_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            stop_grace_ms: 100,
            finalize_retry_limit: 2,
            finalize_retry_delay_ms: 400,
            safety_timeout_ms: 3000,
            meter_interval_ms: 50,
        }
    }
}

impl RecorderConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn finalize_retry_delay(&self) -> Duration {
        Duration::from_millis(self.finalize_retry_delay_ms)
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }

    pub fn meter_interval(&self) -> Duration {
        Duration::from_millis(self.meter_interval_ms)
    }
}
