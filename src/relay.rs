//! Latest-frame-wins relay
//!
//! Single-slot mailbox between the producer and the render consumer. Publishing
//! overwrites whatever the consumer has not picked up yet; nothing is queued.
//! The slot is an atomic pointer, so a reader always sees a whole frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::frame::Frame;

pub struct FrameRelay {
    slot: ArcSwapOption<Frame>,
    published: AtomicU64,
    overwritten: AtomicU64,
}

impl FrameRelay {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            published: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        }
    }

    /// Store `frame` as the latest one.
    ///
    /// Returns `true` when an undelivered frame was dropped to make room.
    pub fn publish(&self, frame: Arc<Frame>) -> bool {
        let sequence = frame.sequence();
        let previous = self.slot.swap(Some(frame));
        self.published.fetch_add(1, Ordering::Relaxed);

        match previous {
            Some(stale) => {
                self.overwritten.fetch_add(1, Ordering::Relaxed);
                debug!("Relay dropped frame #{} for #{}", stale.sequence(), sequence);
                true
            }
            None => false,
        }
    }

    /// Remove and return the latest frame, or `None` if nothing new arrived.
    pub fn take(&self) -> Option<Arc<Frame>> {
        self.slot.swap(None)
    }

    /// Latest frame without consuming it
    pub fn peek(&self) -> Option<Arc<Frame>> {
        self.slot.load_full()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames replaced before the consumer saw them
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}

impl Default for FrameRelay {
    fn default() -> Self {
        Self::new()
    }
}
