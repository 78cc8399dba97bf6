//! Cancellation signal
//!
//! A cloneable, cooperative cancellation token for blocking code.
//!
//! ## Design
//! - The token owns the only `Sender` of a zero-capacity channel and never
//!   sends on it. Cancelling drops that sender, which disconnects the channel,
//!   so every `recv` on [`CancelToken::signal`] returns immediately.
//! - That makes cancellation usable as an arm of `crossbeam::channel::select!` next to
//!   any other channel.
//! - Child tokens are cancelled together with their parent, but cancelling a
//!   child leaves the parent untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Cooperative cancellation signal shared between a caller and blocking work
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    /// Set once, before the trigger is dropped
    cancelled: AtomicBool,

    /// Dropped on cancel; never used to send
    trigger: Mutex<Option<Sender<()>>>,

    /// Disconnects when the trigger is dropped
    signal: Receiver<()>,

    /// Tokens created by `child()`
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (trigger, signal) = channel::bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
            children: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        drop(self.trigger.lock().take());

        let children: Vec<Weak<Inner>> = self.children.lock().drain(..).collect();
        for child in children {
            if let Some(child) = child.upgrade() {
                child.cancel();
            }
        }
    }
}

impl CancelToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Cancel this token and all of its children. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether `cancel` has been called on this token or an ancestor
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Create a token that is cancelled when this one is
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();

        let mut children = self.inner.children.lock();
        // Checked under the lock so a concurrent cancel cannot miss the child
        if self.is_cancelled() {
            drop(children);
            child.cancel();
            return child;
        }
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));

        child
    }

    /// Channel that becomes ready (disconnected) once cancelled
    ///
    /// Meant for `select!`; nothing is ever received on it.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Block until cancelled
    pub fn wait(&self) {
        let _ = self.inner.signal.recv();
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
