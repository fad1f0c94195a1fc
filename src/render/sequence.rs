//! Render generations
//!
//! Every render starts by taking a token from a shared counter. When it
//! finishes, the token is compared with the counter again: a newer `begin`
//! in the meantime means the result is stale and is dropped. Renders are
//! never interrupted mid-flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation number handed to one render
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderToken(u64);

impl RenderToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Shared monotonic counter. Clones observe the same sequence.
#[derive(Debug, Clone, Default)]
pub struct RenderSequence {
    latest: Arc<AtomicU64>,
}

impl RenderSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede every earlier token and return a fresh one
    pub fn begin(&self) -> RenderToken {
        RenderToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True while no newer render has begun
    pub fn is_current(&self, token: RenderToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
