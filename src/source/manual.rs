//! Notification provider driven by explicit calls
//!
//! Used when the embedding program receives process notifications from its own
//! OS integration, and by tests to script exact producer interleavings.

use super::{EventSource, NotificationProvider};
use crate::error::RegistrationError;
use crate::mailbox::PublishOutcome;
use crate::models::ProcessNotification;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle; every clone feeds the same registration
#[derive(Clone, Default)]
pub struct ManualProvider {
    registered: Arc<RwLock<Option<Arc<EventSource>>>>,
    registration_failure: Option<RegistrationError>,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose `register` always fails with `error`
    pub fn failing(error: RegistrationError) -> Self {
        Self {
            registration_failure: Some(error),
            ..Self::default()
        }
    }

    /// Deliver one notification to the registered source.
    ///
    /// Returns `None` when nothing is registered or for exit notifications.
    pub fn notify(&self, notification: ProcessNotification) -> Option<PublishOutcome> {
        // Read lock spans the callback so `unregister` waits for in-flight calls
        let registered = self.registered.read();
        registered.as_ref()?.on_process_notify(&notification)
    }

    pub fn is_registered(&self) -> bool {
        self.registered.read().is_some()
    }
}

impl NotificationProvider for ManualProvider {
    fn register(&mut self, source: Arc<EventSource>) -> Result<(), RegistrationError> {
        if let Some(error) = &self.registration_failure {
            return Err(error.clone());
        }
        let mut registered = self.registered.write();
        if registered.is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        *registered = Some(source);
        Ok(())
    }

    fn unregister(&mut self) {
        self.registered.write().take();
    }
}
