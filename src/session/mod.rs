pub mod collector;
pub mod recorder;
pub mod state;
pub mod stats;

pub use collector::{assemble, ChunkCollector};
pub use recorder::Recorder;
pub use state::SessionState;
pub use stats::RecorderSnapshot;
