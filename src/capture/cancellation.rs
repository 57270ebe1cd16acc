use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// CancellationToken is a flag shared between whoever wants a load stopped
/// and the loop doing the work. The loop polls it once per delivered unit.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
