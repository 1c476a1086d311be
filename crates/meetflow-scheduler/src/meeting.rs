//! Meeting data model: time slots, extracted details, and the per-message
//! request state that lives in the workspace.

use chrono::{DateTime, Duration, Utc};
use meetflow_engine::EngineError;
use serde::{Deserialize, Serialize};

use crate::message::EmailMessage;

/// Half-open time interval `[start, end)` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a slot, rejecting degenerate ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> meetflow_engine::Result<Self> {
        if start >= end {
            return Err(EngineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Length of the slot.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `other` lies entirely within this slot.
    #[must_use]
    pub fn contains(&self, other: &TimeSlot) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether this slot overlaps `other` at all.
    #[must_use]
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%H:%M UTC")
        )
    }
}

/// Whether `slots` is sorted ascending by start with no pairwise overlap.
/// Gaps are allowed.
#[must_use]
pub fn slots_well_formed(slots: &[TimeSlot]) -> bool {
    slots.windows(2).all(|w| w[0].end <= w[1].start)
}

/// Lifecycle of a meeting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created, not yet resolved either way.
    Pending,
    /// A calendar event was created.
    Scheduled,
    /// The request was given up on.
    Abandoned,
}

/// Meeting details produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    /// Requested meeting length in minutes; always positive.
    pub duration_minutes: u32,
    /// The timeframe to search for a slot in.
    pub window: TimeSlot,
    /// Deduplicated, normalized attendee addresses.
    pub attendees: Vec<String>,
    /// Meeting room, address, or conference link, when given.
    #[serde(default)]
    pub location: Option<String>,
    /// Meeting purpose / agenda.
    pub description: String,
    /// The extractor's stated rationale for the timeframe, kept for
    /// diagnostics.
    #[serde(default)]
    pub reason: String,
}

impl MeetingDetails {
    /// Requested duration as a [`Duration`].
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Add an attendee, keeping the set deduplicated.  Callers pass
    /// already-normalized addresses.
    pub fn add_attendee(&mut self, address: String) {
        if !self.attendees.contains(&address) {
            self.attendees.push(address);
        }
    }
}

/// A calendar event created for a scheduled meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Link to the created event.
    pub link: String,
    /// The booked interval.
    pub slot: TimeSlot,
}

/// A drafted outbound reply, before threading headers are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// One meeting request, created once a message is classified as
/// scheduling intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub status: RequestStatus,
    pub details: MeetingDetails,
    /// Free slots found in the requested window; well-formed, each at
    /// least the requested duration long.
    pub available_slots: Vec<TimeSlot>,
    /// Set only when the action decision selects a slot; always contained
    /// in one of `available_slots`.
    pub chosen_slot: Option<TimeSlot>,
    /// The created calendar event, once scheduled.
    pub event: Option<ScheduledEvent>,
}

impl MeetingRequest {
    /// A fresh pending request around extracted details.
    #[must_use]
    pub fn new(details: MeetingDetails) -> Self {
        Self {
            status: RequestStatus::Pending,
            details,
            available_slots: Vec::new(),
            chosen_slot: None,
            event: None,
        }
    }
}

/// Everything the workspace holds for one in-flight message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    pub message: EmailMessage,
    /// Present once the message is classified as a scheduling request.
    pub request: Option<MeetingRequest>,
    /// Present once a reply has been drafted.
    pub draft: Option<EmailDraft>,
}

impl MailItem {
    /// Wrap a freshly admitted message.
    #[must_use]
    pub fn new(message: EmailMessage) -> Self {
        Self {
            message,
            request: None,
            draft: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, h, m, 0).unwrap()
    }

    #[test]
    fn rejects_degenerate_slot() {
        assert!(TimeSlot::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeSlot::new(at(11, 0), at(10, 0)).is_err());
        assert!(TimeSlot::new(at(10, 0), at(11, 0)).is_ok());
    }

    #[test]
    fn containment_and_overlap() {
        let outer = TimeSlot::new(at(9, 0), at(17, 0)).unwrap();
        let inner = TimeSlot::new(at(10, 0), at(11, 0)).unwrap();
        let straddling = TimeSlot::new(at(16, 30), at(17, 30)).unwrap();
        let disjoint = TimeSlot::new(at(18, 0), at(19, 0)).unwrap();

        assert!(outer.contains(&inner));
        assert!(!outer.contains(&straddling));
        assert!(outer.overlaps(&straddling));
        assert!(!outer.overlaps(&disjoint));
        assert_eq!(inner.duration(), Duration::hours(1));
    }

    #[test]
    fn well_formedness() {
        let a = TimeSlot::new(at(9, 0), at(10, 0)).unwrap();
        let b = TimeSlot::new(at(10, 0), at(11, 0)).unwrap();
        let c = TimeSlot::new(at(10, 30), at(12, 0)).unwrap();

        // Adjacent is fine, overlapping is not, order matters.
        assert!(slots_well_formed(&[a, b]));
        assert!(slots_well_formed(&[]));
        assert!(slots_well_formed(&[a]));
        assert!(!slots_well_formed(&[b, a]));
        assert!(!slots_well_formed(&[b, c]));
    }

    #[test]
    fn attendees_stay_deduplicated() {
        let mut details = MeetingDetails {
            duration_minutes: 30,
            window: TimeSlot::new(at(9, 0), at(17, 0)).unwrap(),
            attendees: vec!["a@x.io".into()],
            location: None,
            description: "sync".into(),
            reason: String::new(),
        };
        details.add_attendee("b@x.io".into());
        details.add_attendee("a@x.io".into());
        assert_eq!(details.attendees, vec!["a@x.io", "b@x.io"]);
        assert_eq!(details.duration(), Duration::minutes(30));
    }
}
