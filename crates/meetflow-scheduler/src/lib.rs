//! meetflow-scheduler — meeting scheduling from inbound email.
//!
//! This crate binds the generic workflow engine to the scheduling domain:
//! the per-message data model, the availability-slot resolver, the
//! collaborator contracts (mailbox, calendar, reasoning, outbound mail),
//! the workflow nodes, and the graph that wires them together.
//!
//! Transports are collaborators behind traits; the crate itself never
//! speaks IMAP, SMTP, or a calendar API.

pub mod collab;
pub mod config;
pub mod error;
pub mod graph;
pub mod meeting;
pub mod message;
pub mod nodes;
pub mod slots;
pub mod source;

pub use collab::{
    ActionPlanner, CalendarAvailability, CalendarScheduler, DraftKind, DraftWriter,
    IntentClassifier, IntentVerdict, MailFetcher, Mailer, MeetingExtractor, OutgoingEmail,
    PlannedAction,
};
pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use graph::{Collaborators, build_graph};
pub use meeting::{
    EmailDraft, MailItem, MeetingDetails, MeetingRequest, RequestStatus, ScheduledEvent, TimeSlot,
};
pub use message::EmailMessage;
pub use slots::{WorkingHours, resolve_free_slots};
pub use source::MailboxSource;

/// The workspace type every scheduling walk reads and writes.
pub type MailWorkspace = meetflow_engine::Workspace<meeting::MailItem>;
