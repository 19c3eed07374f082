//! Single-slot, last-writer-wins hand-off of the newest observation.

use crate::types::FaceObservation;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Latest published [`FaceObservation`], shared between a detector thread and
/// a render loop.
///
/// Readers get an `Arc` to a complete snapshot; a publish that races a read
/// is seen in full by the next read. Nothing is queued, so intermediate
/// observations are dropped when the reader is slower than the writer.
#[derive(Debug, Default)]
pub struct ObservationSlot {
    current: Mutex<Option<Arc<FaceObservation>>>,
    generation: AtomicU64,
}

impl ObservationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot. Returns the new generation.
    pub fn publish(&self, observation: FaceObservation) -> u64 {
        let next = Arc::new(observation);
        let (generation, previous) = {
            let mut current = self.lock();
            // Generation and pointer change together under the lock.
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            (generation, std::mem::replace(&mut *current, Some(next)))
        };
        drop(previous);
        tracing::trace!(generation, "observation published");
        generation
    }

    /// Generation and observation read together under one lock.
    pub fn snapshot(&self) -> (u64, Option<Arc<FaceObservation>>) {
        let current = self.lock();
        (self.generation.load(Ordering::Acquire), current.clone())
    }

    /// The most recently published snapshot, if any.
    pub fn latest(&self) -> Option<Arc<FaceObservation>> {
        self.lock().clone()
    }

    /// Number of publishes (and clears) so far. Changes whenever a redraw is due.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop the current snapshot, e.g. when the tracked face is lost.
    pub fn clear(&self) -> u64 {
        let (generation, previous) = {
            let mut current = self.lock();
            (self.generation.fetch_add(1, Ordering::AcqRel) + 1, current.take())
        };
        drop(previous);
        generation
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<FaceObservation>>> {
        // The guarded value is a single pointer; a panicking holder cannot
        // leave it half-written.
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
