//! Batch execution of item walks.
//!
//! The runner takes a snapshot of item keys at batch start — items that
//! appear in the workspace afterwards wait for the next batch.  Each
//! item's walk is isolated: a failure aborts only that item and is
//! recorded in the [`BatchReport`]; siblings and the caller are never
//! affected.  The batch always yields [`Action::DEFAULT`] back to the
//! polling loop.
//!
//! Walks run sequentially in snapshot order.  Distinct items share no
//! mutable state beyond their own workspace key, so the contract permits
//! concurrent execution; callers must not rely on cross-item ordering.

use tracing::{error, info};

use crate::graph::Graph;
use crate::node::{Action, RunContext};
use crate::workspace::ItemKey;

/// Outcome of one item's walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The walk reached a terminal action.
    Completed { action: Action },
    /// The walk aborted with an error (rendered, so the report stays
    /// cheap to clone and log).
    Failed { error: String },
}

/// Per-item outcomes of one batch, in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: Vec<(ItemKey, ItemOutcome)>,
}

impl BatchReport {
    /// All outcomes in snapshot order.
    #[must_use]
    pub fn outcomes(&self) -> &[(ItemKey, ItemOutcome)] {
        &self.outcomes
    }

    /// Number of items whose walk completed.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Completed { .. }))
            .count()
    }

    /// Number of items whose walk failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    /// The aggregate action handed back to the polling loop.  Always
    /// [`Action::DEFAULT`]: per-item failures are reported, not
    /// propagated.
    #[must_use]
    pub fn aggregate(&self) -> Action {
        Action::DEFAULT
    }
}

/// Drives a snapshot of items through a graph, one walk per item.
pub struct BatchRunner;

impl BatchRunner {
    /// Create a batch runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every item in `snapshot` through `graph` and collect per-item
    /// outcomes.
    pub async fn run<W: Send + Sync>(
        &self,
        graph: &Graph<W>,
        ws: &W,
        snapshot: Vec<ItemKey>,
    ) -> BatchReport {
        info!(items = snapshot.len(), "batch started");
        let mut outcomes = Vec::with_capacity(snapshot.len());

        for key in snapshot {
            let run = RunContext::new(key.clone());
            let outcome = match graph.walk(ws, &run).await {
                Ok(action) => ItemOutcome::Completed { action },
                Err(err) => {
                    // Attribute the failure to the item and keep going.
                    error!(key = %key, error = %err, "item walk failed");
                    ItemOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push((key, outcome));
        }

        let report = BatchReport { outcomes };
        info!(
            completed = report.completed(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, Result};
    use crate::graph::GraphBuilder;
    use crate::node::{RunContext, Stage};
    use crate::workspace::Workspace;
    use async_trait::async_trait;

    /// Succeeds for every item except the one whose state is `poison`.
    struct FlakyNode;

    #[async_trait]
    impl Stage<Workspace<&'static str>> for FlakyNode {
        type Prepared = &'static str;
        type Output = ();

        fn name(&self) -> &'static str {
            "flaky"
        }

        fn emits(&self) -> &'static [Action] {
            &[Action::END]
        }

        async fn prepare(
            &self,
            ws: &Workspace<&'static str>,
            run: &RunContext,
        ) -> Result<&'static str> {
            ws.with(run.key(), |v| *v)
                .ok_or_else(|| EngineError::MissingState {
                    node: "flaky",
                    key: run.key().to_string(),
                })
        }

        async fn execute(&self, input: &&'static str) -> Result<()> {
            if *input == "poison" {
                return Err(EngineError::Execution {
                    node: "flaky",
                    reason: "collaborator exploded".into(),
                });
            }
            Ok(())
        }

        async fn finalize(
            &self,
            ws: &Workspace<&'static str>,
            run: &RunContext,
            _input: &'static str,
            _output: (),
        ) -> Result<Action> {
            ws.update(run.key(), |v| *v = "done");
            Ok(Action::END)
        }
    }

    #[tokio::test]
    async fn failure_is_isolated_per_item() {
        let graph = GraphBuilder::new()
            .node(FlakyNode)
            .entry("flaky")
            .terminate("flaky", Action::END)
            .build()
            .unwrap();

        let ws = Workspace::new();
        for (id, state) in [("m1", "ok"), ("m2", "poison"), ("m3", "ok")] {
            ws.insert(ItemKey::new(id), state);
        }

        let snapshot = vec![ItemKey::new("m1"), ItemKey::new("m2"), ItemKey::new("m3")];
        let report = BatchRunner::new().run(&graph, &ws, snapshot).await;

        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.aggregate(), Action::DEFAULT);

        let outcomes = report.outcomes();
        assert_eq!(
            outcomes[0].1,
            ItemOutcome::Completed { action: Action::END }
        );
        assert!(matches!(&outcomes[1].1, ItemOutcome::Failed { error } if error.contains("exploded")));
        assert_eq!(
            outcomes[2].1,
            ItemOutcome::Completed { action: Action::END }
        );

        // Items 1 and 3 reached finalize; item 2 did not.
        assert_eq!(ws.with(&ItemKey::new("m1"), |v| *v), Some("done"));
        assert_eq!(ws.with(&ItemKey::new("m2"), |v| *v), Some("poison"));
        assert_eq!(ws.with(&ItemKey::new("m3"), |v| *v), Some("done"));
    }

    #[tokio::test]
    async fn snapshot_order_is_preserved() {
        let graph = GraphBuilder::new()
            .node(FlakyNode)
            .entry("flaky")
            .terminate("flaky", Action::END)
            .build()
            .unwrap();

        let ws = Workspace::new();
        for id in ["c", "a", "b"] {
            ws.insert(ItemKey::new(id), "ok");
        }

        let snapshot = vec![ItemKey::new("c"), ItemKey::new("a"), ItemKey::new("b")];
        let report = BatchRunner::new().run(&graph, &ws, snapshot.clone()).await;

        let keys: Vec<ItemKey> = report.outcomes().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, snapshot);
    }

    #[tokio::test]
    async fn empty_snapshot_yields_empty_report() {
        let graph = GraphBuilder::new()
            .node(FlakyNode)
            .entry("flaky")
            .terminate("flaky", Action::END)
            .build()
            .unwrap();

        let ws = Workspace::new();
        let report = BatchRunner::new().run(&graph, &ws, Vec::new()).await;
        assert!(report.outcomes().is_empty());
        assert_eq!(report.aggregate(), Action::DEFAULT);
    }
}
