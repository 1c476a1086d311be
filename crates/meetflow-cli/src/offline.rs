//! Offline scenario support: scripted collaborators driven by a JSON
//! file, so a whole mailbox pass can run without any live transport.
//!
//! A scenario lists the unread messages and, per message, the scripted
//! reasoning outputs (intent verdict, extracted details, planned action).
//! Calendar busy intervals are global to the scenario.  The deterministic
//! pieces (drafting templates, event links, the outbound log) are
//! implemented here rather than scripted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use meetflow_scheduler::message::reply_prefixed;
use meetflow_scheduler::{
    ActionPlanner, CalendarAvailability, CalendarScheduler, Collaborators, DraftKind, DraftWriter,
    EmailMessage, IntentClassifier, IntentVerdict, MailFetcher, MailItem, Mailer, MeetingDetails,
    MeetingExtractor, OutgoingEmail, PlannedAction, Result, ScheduledEvent, SchedulerError,
    TimeSlot,
};

// ---------------------------------------------------------------------------
// Scenario file
// ---------------------------------------------------------------------------

/// One message and its scripted reasoning outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub message: EmailMessage,
    pub intent: IntentVerdict,
    /// Required when `intent.is_scheduling`; ignored otherwise.
    #[serde(default)]
    pub details: Option<MeetingDetails>,
    /// Defaults to asking for a time preference when absent.
    #[serde(default)]
    pub plan: Option<PlannedAction>,
}

/// A full offline run: unread messages plus the calendar's busy state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub busy: Vec<TimeSlot>,
    #[serde(default)]
    pub entries: Vec<ScenarioEntry>,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let scenario: Self = serde_json::from_str(&raw)?;
        Ok(scenario)
    }
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Hands out the scenario's messages on the first poll, then reports a
/// quiet mailbox.
pub struct ScenarioFetcher {
    pending: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl MailFetcher for ScenarioFetcher {
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>> {
        Ok(std::mem::take(&mut *self.pending.lock().map_err(poisoned)?))
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> SchedulerError {
    SchedulerError::collaborator("offline", "scenario state lock poisoned")
}

struct ScriptedClassifier {
    by_id: HashMap<String, IntentVerdict>,
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, message: &EmailMessage) -> Result<IntentVerdict> {
        self.by_id
            .get(&message.id)
            .cloned()
            .ok_or_else(|| missing_script("intent verdict", &message.id))
    }
}

struct ScriptedExtractor {
    by_id: HashMap<String, MeetingDetails>,
}

#[async_trait]
impl MeetingExtractor for ScriptedExtractor {
    async fn extract(&self, message: &EmailMessage, _now: DateTime<Utc>) -> Result<MeetingDetails> {
        self.by_id
            .get(&message.id)
            .cloned()
            .ok_or_else(|| missing_script("meeting details", &message.id))
    }
}

struct ScriptedPlanner {
    by_id: HashMap<String, PlannedAction>,
}

#[async_trait]
impl ActionPlanner for ScriptedPlanner {
    async fn decide(
        &self,
        message: &EmailMessage,
        _free_slots: &[TimeSlot],
        _details: &MeetingDetails,
    ) -> Result<PlannedAction> {
        Ok(self
            .by_id
            .get(&message.id)
            .cloned()
            .unwrap_or(PlannedAction::AskTime))
    }
}

fn missing_script(what: &str, id: &str) -> SchedulerError {
    SchedulerError::collaborator("offline", format!("no scripted {what} for message `{id}`"))
}

struct FixedBusyCalendar {
    busy: Vec<TimeSlot>,
}

#[async_trait]
impl CalendarAvailability for FixedBusyCalendar {
    async fn list_busy(&self, window: TimeSlot) -> Result<Vec<TimeSlot>> {
        // Only intervals that touch the window matter; the resolver copes
        // with the rest, this just keeps the logs readable.
        Ok(self
            .busy
            .iter()
            .copied()
            .filter(|b| b.overlaps(&window))
            .collect())
    }
}

/// Issues event links without talking to any calendar backend.
pub struct OfflineCalendar {
    calendar_id: String,
}

#[async_trait]
impl CalendarScheduler for OfflineCalendar {
    async fn create_event(
        &self,
        title: &str,
        slot: TimeSlot,
        _description: &str,
        attendees: &[String],
        _location: Option<&str>,
    ) -> Result<ScheduledEvent> {
        let link = format!(
            "https://calendar.local/{}/events/{}",
            self.calendar_id,
            Uuid::now_v7()
        );
        info!(title, slot = %slot, attendees = attendees.len(), link = %link, "event created (offline)");
        Ok(ScheduledEvent { link, slot })
    }
}

/// Plain-text reply templates.
pub struct TemplateWriter;

#[async_trait]
impl DraftWriter for TemplateWriter {
    async fn draft(&self, kind: DraftKind, item: &MailItem) -> Result<String> {
        let request = item
            .request
            .as_ref()
            .ok_or_else(|| SchedulerError::collaborator("draft_writer", "no request on item"))?;
        let body = match kind {
            DraftKind::Confirmation => {
                let event = request.event.as_ref().ok_or_else(|| {
                    SchedulerError::collaborator("draft_writer", "no event to confirm")
                })?;
                format!(
                    "Hi,\n\nYour meeting is booked for {}.\nEvent link: {}\n\nSee you there!",
                    event.slot, event.link
                )
            }
            DraftKind::Proposal => {
                let mut lines = vec![
                    "Hi,\n\nI could not pin down a time from your message.".to_string(),
                    "Here are the open slots I found:".to_string(),
                ];
                for slot in &request.available_slots {
                    lines.push(format!("  - {slot}"));
                }
                lines.push("\nWhich one works for you?".to_string());
                lines.join("\n")
            }
            DraftKind::NoSlots => format!(
                "Hi,\n\nUnfortunately there is no opening of {} minutes in the \
                 requested timeframe ({}).\nCould you suggest another window?",
                request.details.duration_minutes, request.details.window
            ),
        };
        Ok(body)
    }
}

/// Logs outbound mail instead of delivering it.
#[derive(Default)]
pub struct LoggingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl LoggingMailer {
    /// Everything "sent" so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let subject = if email.in_reply_to.is_some() {
            reply_prefixed(&email.subject)
        } else {
            email.subject.clone()
        };
        info!(
            subject = %subject,
            recipients = email.recipients.join(", "),
            in_reply_to = email.in_reply_to.as_deref().unwrap_or("-"),
            "outbound mail (offline)"
        );
        println!("--- outbound mail ---");
        println!("To: {}", email.recipients.join(", "));
        println!("Subject: {subject}");
        println!("{}\n", email.body);
        self.sent.lock().map_err(poisoned)?.push(email.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Everything an offline run needs: the collaborator bundle plus handles
/// to the pieces the host inspects afterwards.
pub struct OfflineBundle {
    pub collaborators: Collaborators,
    pub fetcher: Arc<ScenarioFetcher>,
    pub mailer: Arc<LoggingMailer>,
}

/// Wire scripted collaborators for `scenario`.
pub fn build_offline(scenario: Scenario, calendar_id: String) -> OfflineBundle {
    let mut intents = HashMap::new();
    let mut details = HashMap::new();
    let mut plans = HashMap::new();
    let mut messages = Vec::new();

    for entry in scenario.entries {
        let id = entry.message.id.clone();
        intents.insert(id.clone(), entry.intent);
        if let Some(d) = entry.details {
            details.insert(id.clone(), d);
        }
        if let Some(p) = entry.plan {
            plans.insert(id, p);
        }
        messages.push(entry.message);
    }

    let fetcher = Arc::new(ScenarioFetcher {
        pending: Mutex::new(messages),
    });
    let mailer = Arc::new(LoggingMailer::default());
    let collaborators = Collaborators {
        classifier: Arc::new(ScriptedClassifier { by_id: intents }),
        extractor: Arc::new(ScriptedExtractor { by_id: details }),
        availability: Arc::new(FixedBusyCalendar {
            busy: scenario.busy,
        }),
        planner: Arc::new(ScriptedPlanner { by_id: plans }),
        scheduler: Arc::new(OfflineCalendar { calendar_id }),
        writer: Arc::new(TemplateWriter),
        mailer: mailer.clone(),
    };

    OfflineBundle {
        collaborators,
        fetcher,
        mailer,
    }
}
