//! Process notification source
//!
//! `EventSource` is the producer side of the handoff: it is invoked once per
//! process create/exit notification, copies the bounded creation details into a
//! `ProcessEvent` and publishes it to the mailbox. It never blocks and does no I/O.
//!
//! The OS notification mechanism itself is a collaborator behind the
//! `NotificationProvider` trait:
//! - `ManualProvider`: notifications injected by an embedder or a test
//! - `PollingProvider`: notifications synthesized from process table snapshots

pub mod manual;
pub mod polling;
pub mod tracker;

pub use manual::ManualProvider;
pub use polling::PollingProvider;

use crate::error::RegistrationError;
use crate::mailbox::{Mailbox, PublishOutcome};
use crate::models::{ProcessEvent, ProcessNotification};
use std::sync::Arc;

/// Producer adapter between the notification callback and the mailbox
#[derive(Debug)]
pub struct EventSource {
    mailbox: Arc<Mailbox>,
}

impl EventSource {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { mailbox }
    }

    /// Callback body for a single notification.
    ///
    /// Returns `None` for exit notifications, which never touch the mailbox.
    pub fn on_process_notify(&self, notification: &ProcessNotification) -> Option<PublishOutcome> {
        let info = notification.create_info.as_ref()?;
        let event = ProcessEvent::new(
            notification.process_id,
            info.parent_process_id,
            info.image_path.as_deref(),
        );
        log::trace!(
            "process created: pid {} parent {} image {}",
            event.process_id,
            event.parent_process_id,
            event.image_path
        );

        let outcome = self.mailbox.publish(event);
        if outcome == PublishOutcome::Dropped {
            log::debug!("no consumer waiting, dropped event for pid {}", notification.process_id);
        }
        Some(outcome)
    }
}

/// OS process notification mechanism.
///
/// After `unregister` returns, no new call into the registered `EventSource`
/// may begin.
pub trait NotificationProvider: Send {
    fn register(&mut self, source: Arc<EventSource>) -> Result<(), RegistrationError>;

    fn unregister(&mut self);
}
