//! Node lifecycle contract.
//!
//! Every processing step is a node with three stages, executed strictly
//! in order for each invocation:
//!
//! 1. `prepare` — read-only projection of the workspace state the node
//!    needs.  Fails with [`EngineError::MissingState`] when a required
//!    key is absent.
//! 2. `execute` — the node's actual work, typically a collaborator call.
//!    Must not touch the workspace; failures surface as
//!    [`EngineError::Execution`] or [`EngineError::Validation`].
//! 3. `finalize` — applies the single workspace mutation this node is
//!    responsible for and returns the outgoing [`Action`].
//!
//! Node authors implement the typed [`Stage`] trait; the graph stores the
//! object-safe [`Node`] trait, which every `Stage` gets for free via a
//! blanket impl that drives the three stages.
//!
//! A node declares the closed set of actions it can emit through
//! [`Stage::emits`].  [`crate::GraphBuilder::build`] checks that every
//! declared action of every node has a registered destination, so an
//! unrouted action is a construction-time failure, never a runtime one.

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::workspace::ItemKey;

/// Named outcome of a node's finalize stage, used to select the next node.
///
/// Actions are interned `&'static str` labels, so they are `Copy` and
/// comparisons are cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action(&'static str);

impl Action {
    /// The aggregate action a batch yields back to the polling loop.
    pub const DEFAULT: Action = Action("default");

    /// The conventional terminal action.
    pub const END: Action = Action("end");

    /// Create an action with the given label.
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self(label)
    }

    /// The action's label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Per-walk binding of a single item key.
///
/// A `RunContext` is never shared across concurrent walks; two walks only
/// meet through the workspace, and never on the same key.
#[derive(Debug, Clone)]
pub struct RunContext {
    key: ItemKey,
}

impl RunContext {
    /// Bind a walk to one item key.
    #[must_use]
    pub fn new(key: ItemKey) -> Self {
        Self { key }
    }

    /// The item this walk is processing.
    #[must_use]
    pub fn key(&self) -> &ItemKey {
        &self.key
    }
}

/// The typed three-stage node contract.
///
/// `W` is the shared workspace type.  `Prepared` carries data from
/// `prepare` to `execute` and `finalize`; `Output` carries the result of
/// `execute` into `finalize`.
#[async_trait]
pub trait Stage<W>: Send + Sync
where
    W: Send + Sync,
{
    /// Data projected out of the workspace by `prepare`.
    type Prepared: Send + Sync;

    /// Result produced by `execute`.
    type Output: Send;

    /// Unique node name used for graph wiring and diagnostics.
    fn name(&self) -> &'static str;

    /// The closed set of actions `finalize` may return.
    fn emits(&self) -> &'static [Action];

    /// Read-only projection of the state this node needs.
    async fn prepare(&self, ws: &W, run: &RunContext) -> Result<Self::Prepared>;

    /// Perform the node's work.  No workspace access here.
    async fn execute(&self, input: &Self::Prepared) -> Result<Self::Output>;

    /// Apply this node's workspace mutation and name the outgoing
    /// transition.
    async fn finalize(
        &self,
        ws: &W,
        run: &RunContext,
        input: Self::Prepared,
        output: Self::Output,
    ) -> Result<Action>;
}

/// Object-safe node interface stored by the graph.
#[async_trait]
pub trait Node<W>: Send + Sync
where
    W: Send + Sync,
{
    /// Unique node name used for graph wiring and diagnostics.
    fn name(&self) -> &'static str;

    /// The closed set of actions this node may emit.
    fn emits(&self) -> &'static [Action];

    /// Drive one full prepare → execute → finalize pass.
    async fn run(&self, ws: &W, run: &RunContext) -> Result<Action>;
}

#[async_trait]
impl<W, T> Node<W> for T
where
    W: Send + Sync,
    T: Stage<W>,
{
    fn name(&self) -> &'static str {
        Stage::name(self)
    }

    fn emits(&self) -> &'static [Action] {
        Stage::emits(self)
    }

    async fn run(&self, ws: &W, run: &RunContext) -> Result<Action> {
        let input = self.prepare(ws, run).await?;
        let output = self.execute(&input).await?;
        let action = self.finalize(ws, run, input, output).await?;

        // Guards the emits() declaration; unreachable for nodes that keep
        // their declaration honest.
        if !self.emits().contains(&action) {
            return Err(EngineError::Configuration {
                reason: format!(
                    "node `{}` returned undeclared action `{action}`",
                    Stage::name(self)
                ),
            });
        }
        Ok(action)
    }
}
