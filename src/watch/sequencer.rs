//! Per-key notification sequencer
//!
//! Orders fan-out for one key without holding the store's map lock.
//!
//! A writer draws a ticket while it still holds the map write lock, so ticket
//! order is write order. After releasing the map lock it waits for its ticket's
//! turn, fans out, and passes the turn on by dropping the [`Turn`] guard.

use parking_lot::{Condvar, Mutex};

/// Ticket-based ordering point for the notifications of a single key
#[derive(Debug, Default)]
pub struct Sequencer {
    /// Ticket whose notification may run next
    serving: Mutex<u64>,

    /// Signalled every time `serving` advances
    advanced: Condvar,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `ticket` is being served
    ///
    /// Tickets must be issued densely from 0; every issued ticket must be
    /// waited on exactly once or later tickets never run.
    pub fn wait_turn(&self, ticket: u64) -> Turn<'_> {
        let mut serving = self.serving.lock();
        while *serving != ticket {
            self.advanced.wait(&mut serving);
        }
        Turn { sequencer: self }
    }

    /// The ticket currently being served
    pub fn serving(&self) -> u64 {
        *self.serving.lock()
    }
}

/// Held while a notification runs; dropping it lets the next ticket proceed
#[must_use = "the next ticket runs as soon as the turn is dropped"]
pub struct Turn<'a> {
    sequencer: &'a Sequencer,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut serving = self.sequencer.serving.lock();
        *serving += 1;
        self.sequencer.advanced.notify_all();
    }
}
