//! Monotonic request tagging.
//!
//! Every dispatched fetch is tagged with the next sequence number. When the
//! response arrives, it may only be committed if its tag is still the latest
//! one issued; anything older is stale and is dropped. This turns "last
//! writer wins by arrival order" into "last writer wins by issue order".

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing sequence numbers and answers "is this tag
/// still the latest one?".
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    /// Create a sequencer whose first issued tag is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next tag. Tags start at 1 and never repeat.
    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `seq` is the most recently issued tag.
    pub fn is_current(&self, seq: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == seq
    }

    /// Most recently issued tag, or 0 when nothing was issued yet.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
