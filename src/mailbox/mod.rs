//! Single-slot handoff between the process notification producer and one
//! waiting consumer.
//!
//! The slot is either empty or holds exactly one suspended consumer, until it
//! is closed at teardown and refuses every later consumer. Events
//! published while the slot is empty are discarded, never buffered. The lock
//! only guards the slot swap; waiters are always resumed after it is released.

pub mod waiter;

pub use waiter::{OneshotWaiter, Waiter, WaitReceiver};

use crate::models::{ProcessEvent, WaitOutcome};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of `Mailbox::register_waiter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The waiter now occupies the slot; the caller stays suspended
    Accepted,
    /// Another waiter is outstanding; the caller must fail fast
    Busy,
    /// The mailbox was closed; the waiter has been resumed with `Cancelled`
    Closed,
}

/// Result of `Mailbox::publish`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Dropped,
}

/// Observable slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    Empty,
    WaitingConsumer,
    /// Torn down; no consumer can be parked any more
    Closed,
}

/// Handoff counters since the mailbox was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    pub delivered: u64,
    pub dropped: u64,
    pub busy_rejections: u64,
    pub cancelled: u64,
}

enum Slot {
    Empty,
    Waiting(Box<dyn Waiter>),
    Closed,
}

impl Slot {
    /// Take the parked waiter, leaving `Empty` (or `Closed` if already closed)
    fn take_waiter(&mut self) -> Option<Box<dyn Waiter>> {
        match std::mem::replace(self, Slot::Empty) {
            Slot::Waiting(waiter) => Some(waiter),
            Slot::Empty => None,
            Slot::Closed => {
                *self = Slot::Closed;
                None
            }
        }
    }
}

pub struct Mailbox {
    slot: Mutex<Slot>,
    delivered: AtomicU64,
    dropped: AtomicU64,
    busy_rejections: AtomicU64,
    cancelled: AtomicU64,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    /// Park a consumer in the slot.
    ///
    /// A waiter whose consumer has already gone away does not count as
    /// outstanding and is replaced. On a closed mailbox the waiter is resumed
    /// with `Cancelled` straight away.
    pub fn register_waiter(&self, waiter: Box<dyn Waiter>) -> RegisterOutcome {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Closed) {
            drop(slot);
            self.resume_cancelled(Some(waiter));
            return RegisterOutcome::Closed;
        }
        if let Slot::Waiting(current) = &*slot {
            if !current.is_abandoned() {
                self.busy_rejections.fetch_add(1, Ordering::Relaxed);
                return RegisterOutcome::Busy;
            }
        }

        let previous = std::mem::replace(&mut *slot, Slot::Waiting(waiter));
        drop(slot);
        if matches!(previous, Slot::Waiting(_)) {
            log::debug!("replaced abandoned waiter in mailbox slot");
        }
        RegisterOutcome::Accepted
    }

    /// Hand `event` to the waiting consumer, if any. Never blocks on the consumer.
    pub fn publish(&self, event: ProcessEvent) -> PublishOutcome {
        let waiter = self.slot.lock().take_waiter();
        let outcome = match waiter {
            Some(waiter) => match waiter.resume(WaitOutcome::Event(event)) {
                Ok(()) => PublishOutcome::Delivered,
                Err(_) => PublishOutcome::Dropped,
            },
            None => PublishOutcome::Dropped,
        };
        match outcome {
            PublishOutcome::Delivered => self.delivered.fetch_add(1, Ordering::Relaxed),
            PublishOutcome::Dropped => self.dropped.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    /// Resume any outstanding waiter with `Cancelled`. No-op on an empty slot.
    pub fn cancel(&self) {
        let waiter = self.slot.lock().take_waiter();
        self.resume_cancelled(waiter);
    }

    /// Cancel any outstanding waiter and refuse all later registrations.
    /// Idempotent.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Closed);
        if let Slot::Waiting(waiter) = previous {
            self.resume_cancelled(Some(waiter));
        }
    }

    fn resume_cancelled(&self, waiter: Option<Box<dyn Waiter>>) {
        if let Some(waiter) = waiter {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            // Consumer may already be gone; nothing left to tell it
            let _ = waiter.resume(WaitOutcome::Cancelled);
        }
    }

    pub fn state(&self) -> SlotState {
        match &*self.slot.lock() {
            Slot::Empty => SlotState::Empty,
            Slot::Waiting(_) => SlotState::WaitingConsumer,
            Slot::Closed => SlotState::Closed,
        }
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
