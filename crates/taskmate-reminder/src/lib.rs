//! Reminder engine: polls the task store on an interval and emails owners
//! as due dates approach.
//!
//! The engine only sees two collaborators, a [`TaskStore`] to read tasks from
//! and a [`Notifier`] to deliver messages through. Both are injected, so the
//! server wires SQLite and the HTTP mail relay while tests wire fakes.

pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod store;
pub mod threshold;

pub use config::{DedupPolicy, ReminderConfig};
pub use engine::{CycleReport, DeliveryFailure, EngineState, ReminderEngine, ReminderHandle};
pub use error::{NotifyError, ReminderError};
pub use notifier::{HttpMailNotifier, LogNotifier, Notifier};
pub use store::{ReminderTask, TaskStore};
pub use threshold::{Notification, Threshold};
