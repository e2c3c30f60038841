use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EditorError, Result};

/// Cooperative cancellation flag for long-running segmentation calls.
///
/// Clones share the flag, so a caller can hand one to the editor and keep
/// another to cancel from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            tracing::debug!("Cancellation observed");
            Err(EditorError::Cancelled)
        } else {
            Ok(())
        }
    }
}
