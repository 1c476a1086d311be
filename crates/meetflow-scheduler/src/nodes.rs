//! Workflow nodes for the scheduling graph.
//!
//! Each node implements the engine's three-stage contract over
//! [`MailWorkspace`]: `prepare` projects the item state it needs,
//! `execute` talks to a collaborator, `finalize` applies the node's one
//! workspace mutation and names the outgoing transition.  Collaborator
//! failures surface as execution errors; collaborator output that breaks
//! an invariant surfaces as a validation error.  Both abort only the
//! current item's walk.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetflow_engine::{Action, EngineError, Result, RunContext, Stage};
use tracing::{info, warn};

use crate::MailWorkspace;
use crate::collab::{
    ActionPlanner, CalendarAvailability, CalendarScheduler, DraftKind, DraftWriter,
    IntentClassifier, IntentVerdict, Mailer, MeetingExtractor, OutgoingEmail, PlannedAction,
};
use crate::error::SchedulerError;
use crate::meeting::{
    EmailDraft, MailItem, MeetingDetails, MeetingRequest, RequestStatus, ScheduledEvent, TimeSlot,
};
use crate::message::{EmailMessage, normalize_address};
use crate::slots::{WorkingHours, resolve_free_slots};

// ---------------------------------------------------------------------------
// Node names and actions
// ---------------------------------------------------------------------------

pub const INTENT_ANALYZER: &str = "intent_analyzer";
pub const DETAIL_EXTRACTOR: &str = "detail_extractor";
pub const AVAILABILITY: &str = "availability";
pub const ACTION_DECIDER: &str = "action_decider";
pub const EVENT_CREATOR: &str = "event_creator";
pub const CONFIRMATION_DRAFT: &str = "confirmation_draft";
pub const PROPOSAL_DRAFT: &str = "proposal_draft";
pub const NO_SLOTS_DRAFT: &str = "no_slots_draft";
pub const REPLY_SENDER: &str = "reply_sender";

/// Proceed to meeting-detail extraction.
pub const EXTRACT: Action = Action::new("extract");
/// Proceed to calendar availability lookup.
pub const CHECK_AVAILABILITY: Action = Action::new("check_availability");
/// Proceed to the action decision.
pub const DECIDE: Action = Action::new("decide");
/// A slot was chosen; book it.
pub const SCHEDULE: Action = Action::new("schedule");
/// No clear preference; propose times instead.
pub const ASK_TIME: Action = Action::new("ask_time");
/// The requested window is fully booked.
pub const NO_SLOTS: Action = Action::new("no_slots");
/// The event exists; draft the confirmation reply.
pub const DRAFT_CONFIRMATION: Action = Action::new("draft_confirmation");
/// A reply is drafted; send it.
pub const SEND: Action = Action::new("send");

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn missing(node: &'static str, what: &str, run: &RunContext) -> EngineError {
    EngineError::MissingState {
        node,
        key: format!("{}/{what}", run.key()),
    }
}

fn exec_err(node: &'static str, err: SchedulerError) -> EngineError {
    EngineError::Execution {
        node,
        reason: err.to_string(),
    }
}

/// Project a value out of the item, treating an absent item or an absent
/// field uniformly as missing state.
fn read_item<R>(
    ws: &MailWorkspace,
    run: &RunContext,
    node: &'static str,
    what: &str,
    f: impl FnOnce(&MailItem) -> Option<R>,
) -> Result<R> {
    ws.with(run.key(), f)
        .flatten()
        .ok_or_else(|| missing(node, what, run))
}

// ---------------------------------------------------------------------------
// Intent analysis
// ---------------------------------------------------------------------------

/// Classifies the message; non-scheduling messages are discarded from the
/// workspace and their walk ends.
pub struct IntentAnalyzerNode {
    classifier: Arc<dyn IntentClassifier>,
}

impl IntentAnalyzerNode {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for IntentAnalyzerNode {
    type Prepared = EmailMessage;
    type Output = IntentVerdict;

    fn name(&self) -> &'static str {
        INTENT_ANALYZER
    }

    fn emits(&self) -> &'static [Action] {
        &[EXTRACT, Action::END]
    }

    async fn prepare(&self, ws: &MailWorkspace, run: &RunContext) -> Result<EmailMessage> {
        read_item(ws, run, INTENT_ANALYZER, "message", |item| {
            Some(item.message.clone())
        })
    }

    async fn execute(&self, message: &EmailMessage) -> Result<IntentVerdict> {
        self.classifier
            .classify(message)
            .await
            .map_err(|e| exec_err(INTENT_ANALYZER, e))
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        _message: EmailMessage,
        verdict: IntentVerdict,
    ) -> Result<Action> {
        if verdict.is_scheduling {
            info!(key = %run.key(), reason = %verdict.reason, "message is a scheduling request");
            Ok(EXTRACT)
        } else {
            info!(key = %run.key(), reason = %verdict.reason, "not a scheduling request; discarding");
            ws.remove(run.key());
            Ok(Action::END)
        }
    }
}

// ---------------------------------------------------------------------------
// Detail extraction
// ---------------------------------------------------------------------------

/// Extracts meeting details, validates them, and folds the original
/// participants into the attendee set.
pub struct DetailExtractorNode {
    extractor: Arc<dyn MeetingExtractor>,
}

impl DetailExtractorNode {
    pub fn new(extractor: Arc<dyn MeetingExtractor>) -> Self {
        Self { extractor }
    }
}

impl DetailExtractorNode {
    fn validate(details: &MeetingDetails, now: DateTime<Utc>) -> Result<()> {
        let invalid = |reason: String| EngineError::Validation {
            node: DETAIL_EXTRACTOR,
            reason,
        };
        if details.duration_minutes == 0 {
            return Err(invalid("duration must be a positive number of minutes".into()));
        }
        if details.window.start >= details.window.end {
            return Err(invalid(format!(
                "timeframe start {} is not before end {}",
                details.window.start, details.window.end
            )));
        }
        if details.window.start < now {
            return Err(invalid(format!(
                "timeframe start {} is in the past",
                details.window.start
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Stage<MailWorkspace> for DetailExtractorNode {
    type Prepared = (EmailMessage, DateTime<Utc>);
    type Output = MeetingDetails;

    fn name(&self) -> &'static str {
        DETAIL_EXTRACTOR
    }

    fn emits(&self) -> &'static [Action] {
        &[CHECK_AVAILABILITY]
    }

    async fn prepare(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
    ) -> Result<(EmailMessage, DateTime<Utc>)> {
        let message = read_item(ws, run, DETAIL_EXTRACTOR, "message", |item| {
            Some(item.message.clone())
        })?;
        Ok((message, Utc::now()))
    }

    async fn execute(&self, input: &(EmailMessage, DateTime<Utc>)) -> Result<MeetingDetails> {
        let (message, now) = input;
        let mut details = self
            .extractor
            .extract(message, *now)
            .await
            .map_err(|e| exec_err(DETAIL_EXTRACTOR, e))?;
        Self::validate(&details, *now)?;

        // Normalize whatever the extractor produced before merging in the
        // on-the-wire participants.
        let mut attendees = Vec::new();
        for raw in details.attendees.drain(..) {
            match normalize_address(&raw) {
                Ok(addr) if !attendees.contains(&addr) => attendees.push(addr),
                Ok(_) => {}
                Err(_) => {
                    return Err(EngineError::Validation {
                        node: DETAIL_EXTRACTOR,
                        reason: format!("extractor returned invalid attendee `{raw}`"),
                    });
                }
            }
        }
        details.attendees = attendees;

        // The sender always attends; cc and bcc are folded in as in the
        // original thread.  Malformed copied addresses are dropped, not
        // fatal.
        let sender = message
            .sender_address()
            .map_err(|e| exec_err(DETAIL_EXTRACTOR, e))?;
        details.add_attendee(sender);
        for raw in message.cc.iter().chain(message.bcc.iter()) {
            match normalize_address(raw) {
                Ok(addr) => details.add_attendee(addr),
                Err(_) => warn!(address = %raw, "skipping unparsable copied address"),
            }
        }

        Ok(details)
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        _input: (EmailMessage, DateTime<Utc>),
        details: MeetingDetails,
    ) -> Result<Action> {
        info!(
            key = %run.key(),
            duration_minutes = details.duration_minutes,
            window = %details.window,
            attendees = details.attendees.len(),
            reason = %details.reason,
            "meeting details extracted"
        );
        ws.update(run.key(), |item| {
            item.request = Some(MeetingRequest::new(details));
        })
        .ok_or_else(|| missing(DETAIL_EXTRACTOR, "item", run))?;
        Ok(CHECK_AVAILABILITY)
    }
}

// ---------------------------------------------------------------------------
// Availability lookup
// ---------------------------------------------------------------------------

/// Lists the calendar's busy intervals in the requested window and
/// resolves the free slots.
pub struct AvailabilityNode {
    availability: Arc<dyn CalendarAvailability>,
    hours: WorkingHours,
}

impl AvailabilityNode {
    pub fn new(availability: Arc<dyn CalendarAvailability>, hours: WorkingHours) -> Self {
        Self {
            availability,
            hours,
        }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for AvailabilityNode {
    type Prepared = (TimeSlot, chrono::Duration);
    type Output = Vec<TimeSlot>;

    fn name(&self) -> &'static str {
        AVAILABILITY
    }

    fn emits(&self) -> &'static [Action] {
        &[DECIDE]
    }

    async fn prepare(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
    ) -> Result<(TimeSlot, chrono::Duration)> {
        read_item(ws, run, AVAILABILITY, "request", |item| {
            item.request
                .as_ref()
                .map(|r| (r.details.window, r.details.duration()))
        })
    }

    async fn execute(&self, input: &(TimeSlot, chrono::Duration)) -> Result<Vec<TimeSlot>> {
        let (window, min_duration) = *input;
        let busy = self
            .availability
            .list_busy(window)
            .await
            .map_err(|e| exec_err(AVAILABILITY, e))?;
        match resolve_free_slots(window.start, window.end, min_duration, self.hours, &busy) {
            Ok(slots) => Ok(slots),
            Err(SchedulerError::Engine(e)) => Err(e),
            Err(other) => Err(exec_err(AVAILABILITY, other)),
        }
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        _input: (TimeSlot, chrono::Duration),
        slots: Vec<TimeSlot>,
    ) -> Result<Action> {
        if slots.is_empty() {
            warn!(key = %run.key(), "no free slots in the requested window");
        } else {
            info!(key = %run.key(), slots = slots.len(), "free slots resolved");
        }
        ws.update(run.key(), |item| {
            if let Some(request) = item.request.as_mut() {
                request.available_slots = slots;
            }
        })
        .ok_or_else(|| missing(AVAILABILITY, "item", run))?;
        Ok(DECIDE)
    }
}

// ---------------------------------------------------------------------------
// Action decision
// ---------------------------------------------------------------------------

/// Resolved outcome of the decision step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Book the validated slot.
    Schedule(TimeSlot),
    /// Ask the participants to pick a time.
    AskTime,
    /// Nothing available; send the no-slots notice.
    NoSlots,
}

/// Decides whether to book a slot, propose times, or report that nothing
/// is available.
///
/// The planner is only consulted when free slots exist.  A planner slot
/// that is not contained in a listed free slot, or that is shorter than
/// the requested duration, is rejected outright: the downstream event
/// creator does not re-check the calendar before booking.
pub struct ActionDeciderNode {
    planner: Arc<dyn ActionPlanner>,
}

impl ActionDeciderNode {
    pub fn new(planner: Arc<dyn ActionPlanner>) -> Self {
        Self { planner }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for ActionDeciderNode {
    type Prepared = (EmailMessage, MeetingDetails, Vec<TimeSlot>);
    type Output = Decision;

    fn name(&self) -> &'static str {
        ACTION_DECIDER
    }

    fn emits(&self) -> &'static [Action] {
        &[SCHEDULE, ASK_TIME, NO_SLOTS]
    }

    async fn prepare(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
    ) -> Result<(EmailMessage, MeetingDetails, Vec<TimeSlot>)> {
        read_item(ws, run, ACTION_DECIDER, "request", |item| {
            item.request.as_ref().map(|r| {
                (
                    item.message.clone(),
                    r.details.clone(),
                    r.available_slots.clone(),
                )
            })
        })
    }

    async fn execute(
        &self,
        input: &(EmailMessage, MeetingDetails, Vec<TimeSlot>),
    ) -> Result<Decision> {
        let (message, details, free_slots) = input;
        if free_slots.is_empty() {
            return Ok(Decision::NoSlots);
        }

        let planned = self
            .planner
            .decide(message, free_slots, details)
            .await
            .map_err(|e| exec_err(ACTION_DECIDER, e))?;

        match planned {
            PlannedAction::AskTime => Ok(Decision::AskTime),
            PlannedAction::Schedule { slot } => {
                if slot.duration() < details.duration() {
                    return Err(EngineError::Validation {
                        node: ACTION_DECIDER,
                        reason: format!(
                            "chosen slot {slot} is shorter than the requested {} minutes",
                            details.duration_minutes
                        ),
                    });
                }
                if !free_slots.iter().any(|free| free.contains(&slot)) {
                    return Err(EngineError::Validation {
                        node: ACTION_DECIDER,
                        reason: format!("chosen slot {slot} is not within any available slot"),
                    });
                }
                Ok(Decision::Schedule(slot))
            }
        }
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        _input: (EmailMessage, MeetingDetails, Vec<TimeSlot>),
        decision: Decision,
    ) -> Result<Action> {
        match decision {
            Decision::Schedule(slot) => {
                info!(key = %run.key(), slot = %slot, "slot chosen; scheduling");
                ws.update(run.key(), |item| {
                    if let Some(request) = item.request.as_mut() {
                        request.chosen_slot = Some(slot);
                    }
                })
                .ok_or_else(|| missing(ACTION_DECIDER, "item", run))?;
                Ok(SCHEDULE)
            }
            Decision::AskTime => {
                info!(key = %run.key(), "no clear preference; proposing times");
                Ok(ASK_TIME)
            }
            Decision::NoSlots => {
                info!(key = %run.key(), "window fully booked; sending no-slots notice");
                Ok(NO_SLOTS)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Event creation
// ---------------------------------------------------------------------------

/// Books the chosen slot on the calendar.
pub struct EventCreatorNode {
    scheduler: Arc<dyn CalendarScheduler>,
}

impl EventCreatorNode {
    pub fn new(scheduler: Arc<dyn CalendarScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for EventCreatorNode {
    type Prepared = (MeetingDetails, TimeSlot);
    type Output = ScheduledEvent;

    fn name(&self) -> &'static str {
        EVENT_CREATOR
    }

    fn emits(&self) -> &'static [Action] {
        &[DRAFT_CONFIRMATION]
    }

    async fn prepare(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
    ) -> Result<(MeetingDetails, TimeSlot)> {
        read_item(ws, run, EVENT_CREATOR, "chosen_slot", |item| {
            let request = item.request.as_ref()?;
            Some((request.details.clone(), request.chosen_slot?))
        })
    }

    async fn execute(&self, input: &(MeetingDetails, TimeSlot)) -> Result<ScheduledEvent> {
        let (details, slot) = input;
        self.scheduler
            .create_event(
                &details.description,
                *slot,
                &details.description,
                &details.attendees,
                details.location.as_deref(),
            )
            .await
            .map_err(|e| exec_err(EVENT_CREATOR, e))
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        _input: (MeetingDetails, TimeSlot),
        event: ScheduledEvent,
    ) -> Result<Action> {
        info!(key = %run.key(), link = %event.link, "calendar event created");
        ws.update(run.key(), |item| {
            if let Some(request) = item.request.as_mut() {
                request.status = RequestStatus::Scheduled;
                request.event = Some(event);
            }
        })
        .ok_or_else(|| missing(EVENT_CREATOR, "item", run))?;
        Ok(DRAFT_CONFIRMATION)
    }
}

// ---------------------------------------------------------------------------
// Reply drafting
// ---------------------------------------------------------------------------

/// Drafts the reply for one of the three outcome paths.  One instance per
/// path so each is a distinct graph node with its own name.
pub struct DraftNode {
    kind: DraftKind,
    writer: Arc<dyn DraftWriter>,
}

impl DraftNode {
    pub fn new(kind: DraftKind, writer: Arc<dyn DraftWriter>) -> Self {
        Self { kind, writer }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for DraftNode {
    type Prepared = MailItem;
    type Output = String;

    fn name(&self) -> &'static str {
        match self.kind {
            DraftKind::Confirmation => CONFIRMATION_DRAFT,
            DraftKind::Proposal => PROPOSAL_DRAFT,
            DraftKind::NoSlots => NO_SLOTS_DRAFT,
        }
    }

    fn emits(&self) -> &'static [Action] {
        &[SEND]
    }

    async fn prepare(&self, ws: &MailWorkspace, run: &RunContext) -> Result<MailItem> {
        read_item(ws, run, self.name(), "item", |item| Some(item.clone()))
    }

    async fn execute(&self, item: &MailItem) -> Result<String> {
        self.writer
            .draft(self.kind, item)
            .await
            .map_err(|e| exec_err(self.name(), e))
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        item: MailItem,
        body: String,
    ) -> Result<Action> {
        info!(key = %run.key(), kind = %self.kind, "reply drafted");
        let draft = EmailDraft {
            subject: item.message.reply_subject(),
            body,
        };
        ws.update(run.key(), |item| item.draft = Some(draft))
            .ok_or_else(|| missing(self.name(), "item", run))?;
        Ok(SEND)
    }
}

// ---------------------------------------------------------------------------
// Reply sending
// ---------------------------------------------------------------------------

/// Sends the drafted reply, threaded onto the original message, and
/// retires the item from the workspace.
pub struct ReplySenderNode {
    mailer: Arc<dyn Mailer>,
}

impl ReplySenderNode {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Stage<MailWorkspace> for ReplySenderNode {
    type Prepared = OutgoingEmail;
    type Output = ();

    fn name(&self) -> &'static str {
        REPLY_SENDER
    }

    fn emits(&self) -> &'static [Action] {
        &[Action::END]
    }

    async fn prepare(&self, ws: &MailWorkspace, run: &RunContext) -> Result<OutgoingEmail> {
        read_item(ws, run, REPLY_SENDER, "draft", |item| {
            let draft = item.draft.as_ref()?;
            let request = item.request.as_ref()?;

            // Extend the thread chain with the message being replied to.
            let mut references = item.message.references.clone();
            references.push(item.message.id.clone());

            Some(OutgoingEmail {
                subject: draft.subject.clone(),
                body: draft.body.clone(),
                recipients: request.details.attendees.clone(),
                in_reply_to: Some(item.message.id.clone()),
                references,
            })
        })
    }

    async fn execute(&self, email: &OutgoingEmail) -> Result<()> {
        self.mailer
            .send(email)
            .await
            .map_err(|e| exec_err(REPLY_SENDER, e))
    }

    async fn finalize(
        &self,
        ws: &MailWorkspace,
        run: &RunContext,
        email: OutgoingEmail,
        _sent: (),
    ) -> Result<Action> {
        info!(
            key = %run.key(),
            recipients = email.recipients.len(),
            "reply sent; retiring message"
        );
        ws.remove(run.key());
        Ok(Action::END)
    }
}
