//! Notification layer for job and batch lifecycle events.
//!
//! - [`NotificationSink`] — the contract the orchestrator fires into;
//!   failures here are logged by the caller, never escalated to job
//!   failure.
//! - [`PushNotifier`] — posts localized payloads to the push gateway
//!   with bounded exponential retry.
//! - [`NoopNotifier`] — logs and drops, for tests and offline runs.
//! - [`payload`] — pure localized payload builders.

pub mod payload;
pub mod push;
pub mod sink;

pub use push::PushNotifier;
pub use sink::{NoopNotifier, NotificationSink, NotifyError};
