//! Attach/detach of the handoff core
//!
//! `Monitor` owns the mailbox and the registered notification provider.
//! Attach builds the mailbox and registers the event source; detach unregisters
//! the source first so no late event can race the teardown, then closes the
//! mailbox: the outstanding wait and any wait issued afterwards end `Cancelled`.

use crate::dispatcher::ControlDispatcher;
use crate::error::AttachError;
use crate::mailbox::{Mailbox, MailboxStats, SlotState};
use crate::source::{EventSource, NotificationProvider};
use std::sync::Arc;

pub struct Monitor {
    mailbox: Arc<Mailbox>,
    provider: Box<dyn NotificationProvider>,
    attached: bool,
}

impl Monitor {
    /// Build the mailbox and register the event source with `provider`.
    ///
    /// On failure nothing stays registered and all partial state is dropped.
    pub fn attach(mut provider: Box<dyn NotificationProvider>) -> Result<Self, AttachError> {
        let mailbox = Arc::new(Mailbox::new());
        let source = Arc::new(EventSource::new(mailbox.clone()));

        provider
            .register(source)
            .map_err(AttachError::Registration)?;

        log::info!("monitor attached");
        Ok(Self {
            mailbox,
            provider,
            attached: true,
        })
    }

    /// Dispatcher sharing this monitor's mailbox
    pub fn dispatcher(&self) -> ControlDispatcher {
        ControlDispatcher::new(self.mailbox.clone())
    }

    pub fn slot_state(&self) -> SlotState {
        self.mailbox.state()
    }

    pub fn stats(&self) -> MailboxStats {
        self.mailbox.stats()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Unregister the event source, then close the mailbox.
    /// Idempotent.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;

        self.provider.unregister();
        self.mailbox.close();

        let stats = self.mailbox.stats();
        log::info!(
            "monitor detached (delivered: {}, dropped: {}, busy: {}, cancelled: {})",
            stats.delivered,
            stats.dropped,
            stats.busy_rejections,
            stats.cancelled
        );
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.detach();
    }
}
