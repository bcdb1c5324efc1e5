//! Platform-class capture profiles.
//!
//! Mobile and desktop runtimes want different stream constraints, container
//! preferences, and stop sequencing. Keeping the variance in one table avoids
//! scattering platform conditionals through the session lifecycle.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Constraints passed to the runtime when requesting an input stream.
///
/// A default-constructed value asks for a plain audio stream with no
/// processing hints, which is what mobile platforms want to keep the
/// permission prompt friction-free.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Requested channel count (None = runtime default)
    pub channels: Option<u16>,
    /// Requested sample rate in Hz (None = runtime default)
    pub sample_rate: Option<u32>,
}

/// Coarse platform class selecting a capture profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformClass {
    Mobile,
    Desktop,
}

/// Everything that varies per platform class: stream constraints, the ordered
/// container preference list, and whether the encoder needs an explicit flush
/// nudge before stop (some runtimes buffer chunks and truncate audio if the
/// flush and stop requests arrive out of order).
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub class: PlatformClass,
    pub constraints: StreamConstraints,
    pub format_preferences: Vec<String>,
    pub flush_before_stop: bool,
}

impl PlatformProfile {
    pub fn for_class(class: PlatformClass) -> Self {
        match class {
            // Mobile prefers a widely-decodable container and minimal
            // constraints to avoid permission friction.
            PlatformClass::Mobile => Self {
                class,
                constraints: StreamConstraints::default(),
                format_preferences: vec![
                    "audio/mp4".to_string(),
                    "audio/webm".to_string(),
                    "audio/ogg".to_string(),
                    "audio/wav".to_string(),
                ],
                flush_before_stop: false,
            },
            PlatformClass::Desktop => Self {
                class,
                constraints: StreamConstraints {
                    echo_cancellation: true,
                    noise_suppression: true,
                    auto_gain_control: true,
                    channels: Some(1),
                    sample_rate: Some(44_100),
                },
                format_preferences: vec![
                    "audio/webm;codecs=opus".to_string(),
                    "audio/webm".to_string(),
                    "audio/mp4".to_string(),
                    "audio/ogg".to_string(),
                    "audio/wav".to_string(),
                ],
                flush_before_stop: true,
            },
        }
    }

    /// First preference the runtime reports as supported, in list order.
    pub fn select_format(&self, supports: impl Fn(&str) -> bool) -> Option<&str> {
        self.format_preferences
            .iter()
            .map(String::as_str)
            .find(|mime| supports(mime))
    }
}
