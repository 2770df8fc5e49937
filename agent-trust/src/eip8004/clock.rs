//! Block height source
//!
//! Registries never read wall-clock time. The host decides what a height is
//! (a chain's block number, a transaction ordinal) and injects it here.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait BlockClock: Send + Sync {
    /// Current height. Must never decrease.
    fn height(&self) -> u64;
}

/// Height advanced explicitly by the host
#[derive(Debug, Default)]
pub struct ManualClock {
    height: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            height: AtomicU64::new(start),
        }
    }

    /// Move forward by `blocks`, returning the new height
    pub fn advance(&self, blocks: u64) -> u64 {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Jump to `height`; ignored if it would move backwards
    pub fn set(&self, height: u64) {
        self.height.fetch_max(height, Ordering::SeqCst);
    }
}

impl BlockClock for ManualClock {
    fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}
