//! Per-cycle context handed to every component.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identity and cancellation flag of one cycle.
///
/// Cloning shares the flag. Components log with the context as a prefix
/// (`[cycle 7] ...`) and call [`CycleContext::is_cancelled`] between routes.
#[derive(Debug, Clone)]
pub struct CycleContext {
    id: u64,
    cancel: Arc<AtomicBool>,
}

impl CycleContext {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

impl fmt::Display for CycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle {}", self.id)
    }
}
