//! procgate - process-creation handoff library
//!
//! This library exposes the single-slot event mailbox, the notification
//! sources that feed it, the control dispatcher a decision service talks to,
//! and the daemon and client built on top of them.

pub mod client;
pub mod constants;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod mailbox;
pub mod models;
pub mod source;
