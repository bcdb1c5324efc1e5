use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of a capture session.
///
/// `Idle -> Acquiring -> Recording -> Stopping -> Finalizing -> Idle`.
/// The success path publishes a result as a side effect of the Idle re-entry;
/// failure paths re-enter Idle with no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Finalizing,
}

impl SessionState {
    /// Device handles must be held exactly in these states.
    pub fn holds_device_handles(self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Acquiring,
            2 => SessionState::Recording,
            3 => SessionState::Stopping,
            4 => SessionState::Finalizing,
            _ => SessionState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Acquiring => 1,
            SessionState::Recording => 2,
            SessionState::Stopping => 3,
            SessionState::Finalizing => 4,
        }
    }
}

/// Lock-free state cell readable from observables and tasks.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for state in [
            SessionState::Idle,
            SessionState::Acquiring,
            SessionState::Recording,
            SessionState::Stopping,
            SessionState::Finalizing,
        ] {
            let cell = StateCell::new(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_handle_invariant_mapping() {
        assert!(!SessionState::Idle.holds_device_handles());
        assert!(SessionState::Acquiring.holds_device_handles());
        assert!(SessionState::Finalizing.holds_device_handles());
    }
}
