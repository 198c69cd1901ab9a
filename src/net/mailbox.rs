//! Handoff between the network receive side and the tick loop
//!
//! The receiver writes, the tick loop drains once at the start of each tick.
//! State snapshots are last-write-wins; discrete messages queue in order so
//! an edge-triggered shot is never overwritten by the next snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::protocol::{PeerMessage, StateSync};

/// Discrete messages kept between two drains
pub const MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Slots {
    latest_sync: Option<StateSync>,
    events: VecDeque<PeerMessage>,
    dropped: usize,
    closed: bool,
}

/// Everything received since the previous drain
#[derive(Debug, Default)]
pub struct Inbox {
    pub sync: Option<StateSync>,
    /// `ACTION` and `PLAYER_JOIN` messages in arrival order
    pub events: Vec<PeerMessage>,
    /// Discrete messages discarded because the queue was full
    pub dropped: usize,
    /// The link closed; no further messages will arrive
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    inner: Arc<Mutex<Slots>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, message: PeerMessage) {
        let mut slots = self.inner.lock();
        if slots.closed {
            return;
        }
        match message {
            PeerMessage::StateSync(sync) => slots.latest_sync = Some(sync),
            other => {
                if slots.events.len() >= MAILBOX_CAPACITY {
                    slots.events.pop_front();
                    slots.dropped += 1;
                }
                slots.events.push_back(other);
            }
        }
    }

    /// Mark the link as gone; terminal
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Take everything received so far in one atomic swap
    pub fn drain(&self) -> Inbox {
        let mut slots = self.inner.lock();
        Inbox {
            sync: slots.latest_sync.take(),
            events: slots.events.drain(..).collect(),
            dropped: std::mem::take(&mut slots.dropped),
            closed: slots.closed,
        }
    }
}
