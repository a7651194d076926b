//! Per-simulation context: random source and cancellation

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State threaded through one simulation instead of module-level globals
#[derive(Debug, Clone)]
pub struct SimulationContext {
    rng: StdRng,
    cancel: Arc<AtomicBool>,
}

impl SimulationContext {
    /// Context with an RNG seeded from `seed` and a fresh cancellation flag
    pub fn new(seed: u64) -> Self {
        Self::with_cancel_flag(seed, Arc::new(AtomicBool::new(false)))
    }

    /// Context sharing an existing cancellation flag (batch runs)
    pub fn with_cancel_flag(seed: u64, cancel: Arc<AtomicBool>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            cancel,
        }
    }

    /// Random source for particle placement
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Handle that can cancel the run from another thread
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request cancellation; the run stops after the current step
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
