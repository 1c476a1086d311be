//! Collaborator contracts.
//!
//! Everything the workflow needs from the outside world sits behind one
//! of these traits: the mailbox, the calendar, outbound mail, and the
//! opaque reasoning steps (classification, extraction, action planning,
//! reply drafting).  Nodes receive collaborators as injected `Arc<dyn …>`
//! dependencies, so tests substitute deterministic fakes and transports
//! stay out of this crate entirely.
//!
//! Implementations own their timeouts: a call must not block its caller
//! indefinitely.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::meeting::{MailItem, MeetingDetails, ScheduledEvent, TimeSlot};
use crate::message::EmailMessage;

/// Classifier verdict on an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentVerdict {
    /// Whether the message is about scheduling a meeting.
    pub is_scheduling: bool,
    /// The classifier's stated rationale.
    #[serde(default)]
    pub reason: String,
}

/// Outcome of the action-planning reasoning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    /// Book the given slot.
    Schedule { slot: TimeSlot },
    /// No clear preference; ask the participants to pick a time.
    AskTime,
}

/// Which reply the draft writer should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    /// Confirm a scheduled meeting, including the event link.
    Confirmation,
    /// Propose the available slots and ask for a preference.
    Proposal,
    /// Explain that no suitable times were found.
    NoSlots,
}

impl std::fmt::Display for DraftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmation => write!(f, "confirmation"),
            Self::Proposal => write!(f, "proposal"),
            Self::NoSlots => write!(f, "no_slots"),
        }
    }
}

/// An outbound reply, fully addressed and threaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    /// Message id being replied to; the mailer sets `In-Reply-To` and
    /// prefixes the subject with the reply marker (idempotently) when
    /// this is present.
    pub in_reply_to: Option<String>,
    /// Thread reference chain, oldest first.
    pub references: Vec<String>,
}

/// Fetches unread messages from the monitored mailbox.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Fetch unread messages.  An empty list is the normal quiet-mailbox
    /// answer.
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>>;
}

/// Decides whether a message is a scheduling request.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &EmailMessage) -> Result<IntentVerdict>;
}

/// Extracts structured meeting details from a scheduling message.
///
/// Implementations must reject output whose window is degenerate or
/// starts before `now`; the extraction node re-validates regardless.
#[async_trait]
pub trait MeetingExtractor: Send + Sync {
    async fn extract(&self, message: &EmailMessage, now: DateTime<Utc>) -> Result<MeetingDetails>;
}

/// Lists the calendar's busy intervals inside a window.
#[async_trait]
pub trait CalendarAvailability: Send + Sync {
    async fn list_busy(&self, window: TimeSlot) -> Result<Vec<TimeSlot>>;
}

/// Chooses between booking a slot and asking for preferences.
///
/// Only consulted when at least one free slot exists; the decision node
/// short-circuits the empty case itself.
#[async_trait]
pub trait ActionPlanner: Send + Sync {
    async fn decide(
        &self,
        message: &EmailMessage,
        free_slots: &[TimeSlot],
        details: &MeetingDetails,
    ) -> Result<PlannedAction>;
}

/// Creates calendar events.
#[async_trait]
pub trait CalendarScheduler: Send + Sync {
    async fn create_event(
        &self,
        title: &str,
        slot: TimeSlot,
        description: &str,
        attendees: &[String],
        location: Option<&str>,
    ) -> Result<ScheduledEvent>;
}

/// Writes reply bodies for the three outcome paths.
///
/// Returns the body text only; the drafting node owns the subject so
/// replies stay in the original thread.
#[async_trait]
pub trait DraftWriter: Send + Sync {
    async fn draft(&self, kind: DraftKind, item: &MailItem) -> Result<String>;
}

/// Sends outbound mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}
