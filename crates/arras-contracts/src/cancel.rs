//! Cooperative cancellation for sealing operations.
//!
//! A caller may cancel an operation up to the moment a seal request is sent.
//! Once the authority has issued a seal the operation always runs to
//! completion, because the issued token cannot be returned.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cloneable cancellation flag shared between the caller and an operation.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
