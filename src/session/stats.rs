use super::state::SessionState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of the controller, for UI polling or diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderSnapshot {
    /// Current lifecycle state
    pub state: SessionState,

    /// Whether a recording session is active
    pub is_recording: bool,

    /// When the most recent session started (None before the first start)
    pub started_at: Option<DateTime<Utc>>,

    /// Milliseconds recorded (live while recording, final value afterwards)
    pub elapsed_ms: u64,

    /// Normalized input loudness in [0, 1]
    pub input_level: f32,

    /// Chunks accumulated for the current session
    pub chunks_collected: usize,

    /// Whether a finalized result is available
    pub has_result: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = RecorderSnapshot {
            state: SessionState::Recording,
            is_recording: true,
            started_at: Some(Utc::now()),
            elapsed_ms: 1500,
            input_level: 0.4,
            chunks_collected: 2,
            has_result: false,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "recording");
        assert_eq!(json["is_recording"], true);
        assert_eq!(json["chunks_collected"], 2);
    }
}
