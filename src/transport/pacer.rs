//! Call pacing.
//!
//! The pacer is the only gate between "call requested" and "call sent on
//! the wire": a bounded-concurrency limiter keyed by method name, so that
//! high call volume on one method queues in its own lane instead of
//! starving every other method.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::PACER_LIMIT;

/// Bounded-concurrency admission gate.
///
/// Each method name gets an independent lane with the same constant
/// concurrency cap; admission within a lane is FIFO.
#[derive(Debug)]
pub struct Pacer {
    limit: usize,
    lanes: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(PACER_LIMIT)
    }
}

impl Pacer {
    /// Create a pacer allowing `limit` concurrent calls per method.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// The per-lane concurrency cap.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn lane(&self, method: &str) -> Arc<Semaphore> {
        let mut lanes = match self.lanes.lock() {
            Ok(lanes) => lanes,
            // A panicked holder only ever inserted into the map; the map
            // is still usable.
            Err(poisoned) => poisoned.into_inner(),
        };
        lanes
            .entry(method.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
            .clone()
    }

    /// Wait for an in-flight slot on `method`'s lane.
    ///
    /// The returned permit must be held until the call resolves or
    /// rejects; dropping it frees the slot.
    pub async fn admit(&self, method: &str) -> OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition cannot fail.
        self.lane(method).acquire_owned().await.unwrap()
    }

    /// Try to take a slot without waiting.
    pub fn try_admit(&self, method: &str) -> Option<OwnedSemaphorePermit> {
        self.lane(method).try_acquire_owned().ok()
    }
}
