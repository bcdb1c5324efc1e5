//! Append-only chunk accumulation, guarded by a session generation.
//!
//! Encoder callbacks can outlive the session that spawned them (a forced
//! restart, a degraded timeout). Every append carries the generation it was
//! recorded under; chunks from a superseded session are detected and dropped
//! instead of corrupting the next one.

use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    chunks: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct ChunkCollector {
    inner: Mutex<Inner>,
}

impl ChunkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin collecting for a new session, discarding anything older.
    pub fn open(&self, generation: u64) {
        let mut inner = self.inner.lock().expect("collector lock");
        inner.generation = generation;
        inner.chunks.clear();
    }

    /// Append a chunk recorded under `generation`. Returns false (and drops
    /// the chunk) when the session has been superseded.
    pub fn append(&self, generation: u64, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        let mut inner = self.inner.lock().expect("collector lock");
        if inner.generation != generation {
            debug!(
                "Discarding stale chunk: generation {} != {}",
                generation, inner.generation
            );
            return false;
        }
        inner.chunks.push(chunk);
        true
    }

    pub fn is_empty(&self, generation: u64) -> bool {
        let inner = self.inner.lock().expect("collector lock");
        inner.generation != generation || inner.chunks.is_empty()
    }

    pub fn chunk_count(&self, generation: u64) -> usize {
        let inner = self.inner.lock().expect("collector lock");
        if inner.generation != generation {
            0
        } else {
            inner.chunks.len()
        }
    }

    /// Take all chunks collected for `generation`, leaving the collector
    /// empty. Returns an empty vec for a superseded generation.
    pub fn take(&self, generation: u64) -> Vec<Vec<u8>> {
        let mut inner = self.inner.lock().expect("collector lock");
        if inner.generation != generation {
            return Vec::new();
        }
        std::mem::take(&mut inner.chunks)
    }
}

/// Concatenate chunks in arrival order into the artifact's byte layout.
pub fn assemble(chunks: Vec<Vec<u8>>) -> Vec<u8> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut data = Vec::with_capacity(total);
    for chunk in chunks {
        data.extend_from_slice(&chunk);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_in_order() {
        let collector = ChunkCollector::new();
        collector.open(1);
        assert!(collector.append(1, vec![1, 2]));
        assert!(collector.append(1, vec![3]));
        assert!(collector.append(1, vec![4, 5]));

        let data = assemble(collector.take(1));
        assert_eq!(data, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stale_generation_discarded() {
        let collector = ChunkCollector::new();
        collector.open(1);
        assert!(collector.append(1, vec![1]));

        collector.open(2);
        assert!(!collector.append(1, vec![9]), "stale append must be dropped");
        assert!(collector.is_empty(2));
        assert!(collector.append(2, vec![2]));
        assert_eq!(assemble(collector.take(2)), vec![2]);
    }

    #[test]
    fn test_empty_chunks_ignored() {
        let collector = ChunkCollector::new();
        collector.open(1);
        assert!(!collector.append(1, Vec::new()));
        assert!(collector.is_empty(1));
    }

    #[test]
    fn test_take_wrong_generation_is_empty() {
        let collector = ChunkCollector::new();
        collector.open(3);
        collector.append(3, vec![7]);
        assert!(collector.take(2).is_empty());
        // Chunks for the live generation are untouched.
        assert_eq!(collector.chunk_count(3), 1);
    }
}
