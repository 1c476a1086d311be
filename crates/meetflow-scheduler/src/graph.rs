//! Assembly of the scheduling workflow graph.
//!
//! One function wires the nine nodes and their transitions; the builder
//! validates the wiring at construction time, so a mis-routed action can
//! never surface mid-walk.

use std::sync::Arc;

use meetflow_engine::{Action, Graph, GraphBuilder};

use crate::MailWorkspace;
use crate::collab::{
    ActionPlanner, CalendarAvailability, CalendarScheduler, DraftKind, DraftWriter,
    IntentClassifier, Mailer, MeetingExtractor,
};
use crate::error::Result;
use crate::nodes::{
    ACTION_DECIDER, ASK_TIME, AVAILABILITY, AvailabilityNode, ActionDeciderNode,
    CHECK_AVAILABILITY, CONFIRMATION_DRAFT, DECIDE, DRAFT_CONFIRMATION, DETAIL_EXTRACTOR,
    DetailExtractorNode, DraftNode, EVENT_CREATOR, EXTRACT, EventCreatorNode, INTENT_ANALYZER,
    IntentAnalyzerNode, NO_SLOTS, NO_SLOTS_DRAFT, PROPOSAL_DRAFT, REPLY_SENDER, ReplySenderNode,
    SCHEDULE, SEND,
};
use crate::slots::WorkingHours;

/// The full set of external collaborators the workflow depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn IntentClassifier>,
    pub extractor: Arc<dyn MeetingExtractor>,
    pub availability: Arc<dyn CalendarAvailability>,
    pub planner: Arc<dyn ActionPlanner>,
    pub scheduler: Arc<dyn CalendarScheduler>,
    pub writer: Arc<dyn DraftWriter>,
    pub mailer: Arc<dyn Mailer>,
}

/// Build the validated scheduling graph.
///
/// ```text
/// intent_analyzer --extract--> detail_extractor
///                 --end------> (walk ends; item discarded)
/// detail_extractor --check_availability--> availability
/// availability --decide--> action_decider
/// action_decider --schedule--> event_creator
///                --ask_time--> proposal_draft
///                --no_slots--> no_slots_draft
/// event_creator --draft_confirmation--> confirmation_draft
/// *_draft --send--> reply_sender --end--> (walk ends; item retired)
/// ```
pub fn build_graph(
    collaborators: Collaborators,
    hours: WorkingHours,
) -> Result<Graph<MailWorkspace>> {
    let graph = GraphBuilder::new()
        .node(IntentAnalyzerNode::new(collaborators.classifier))
        .node(DetailExtractorNode::new(collaborators.extractor))
        .node(AvailabilityNode::new(collaborators.availability, hours))
        .node(ActionDeciderNode::new(collaborators.planner))
        .node(EventCreatorNode::new(collaborators.scheduler))
        .node(DraftNode::new(
            DraftKind::Confirmation,
            collaborators.writer.clone(),
        ))
        .node(DraftNode::new(
            DraftKind::Proposal,
            collaborators.writer.clone(),
        ))
        .node(DraftNode::new(DraftKind::NoSlots, collaborators.writer))
        .node(ReplySenderNode::new(collaborators.mailer))
        .entry(INTENT_ANALYZER)
        .route(INTENT_ANALYZER, EXTRACT, DETAIL_EXTRACTOR)
        .terminate(INTENT_ANALYZER, Action::END)
        .route(DETAIL_EXTRACTOR, CHECK_AVAILABILITY, AVAILABILITY)
        .route(AVAILABILITY, DECIDE, ACTION_DECIDER)
        .route(ACTION_DECIDER, SCHEDULE, EVENT_CREATOR)
        .route(ACTION_DECIDER, ASK_TIME, PROPOSAL_DRAFT)
        .route(ACTION_DECIDER, NO_SLOTS, NO_SLOTS_DRAFT)
        .route(EVENT_CREATOR, DRAFT_CONFIRMATION, CONFIRMATION_DRAFT)
        .route(CONFIRMATION_DRAFT, SEND, REPLY_SENDER)
        .route(PROPOSAL_DRAFT, SEND, REPLY_SENDER)
        .route(NO_SLOTS_DRAFT, SEND, REPLY_SENDER)
        .terminate(REPLY_SENDER, Action::END)
        .build()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::collab::{IntentVerdict, OutgoingEmail, PlannedAction};
    use crate::meeting::{MailItem, MeetingDetails, ScheduledEvent, TimeSlot};
    use crate::message::EmailMessage;

    struct Inert;

    #[async_trait]
    impl IntentClassifier for Inert {
        async fn classify(&self, _m: &EmailMessage) -> crate::Result<IntentVerdict> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl MeetingExtractor for Inert {
        async fn extract(
            &self,
            _m: &EmailMessage,
            _now: DateTime<Utc>,
        ) -> crate::Result<MeetingDetails> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl CalendarAvailability for Inert {
        async fn list_busy(&self, _w: TimeSlot) -> crate::Result<Vec<TimeSlot>> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl ActionPlanner for Inert {
        async fn decide(
            &self,
            _m: &EmailMessage,
            _s: &[TimeSlot],
            _d: &MeetingDetails,
        ) -> crate::Result<PlannedAction> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl CalendarScheduler for Inert {
        async fn create_event(
            &self,
            _title: &str,
            _slot: TimeSlot,
            _description: &str,
            _attendees: &[String],
            _location: Option<&str>,
        ) -> crate::Result<ScheduledEvent> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl DraftWriter for Inert {
        async fn draft(&self, _kind: DraftKind, _item: &MailItem) -> crate::Result<String> {
            unimplemented!("wiring test only")
        }
    }

    #[async_trait]
    impl Mailer for Inert {
        async fn send(&self, _email: &OutgoingEmail) -> crate::Result<()> {
            unimplemented!("wiring test only")
        }
    }

    fn inert_collaborators() -> Collaborators {
        let inert = Arc::new(Inert);
        Collaborators {
            classifier: inert.clone(),
            extractor: inert.clone(),
            availability: inert.clone(),
            planner: inert.clone(),
            scheduler: inert.clone(),
            writer: inert.clone(),
            mailer: inert,
        }
    }

    #[test]
    fn graph_wiring_is_complete() {
        let graph = build_graph(
            inert_collaborators(),
            WorkingHours::new(9, 17).unwrap(),
        )
        .unwrap();
        assert_eq!(graph.entry(), INTENT_ANALYZER);
        assert_eq!(graph.node_count(), 9);
        // 10 routes plus 2 terminations.
        assert_eq!(graph.route_count(), 12);
    }
}
