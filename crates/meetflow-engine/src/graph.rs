//! Transition graph construction and walking.
//!
//! A [`Graph`] is a static, directed mapping from `(node, action)` pairs
//! to destinations.  It is not necessarily acyclic.  All wiring invariants
//! are enforced by [`GraphBuilder::build`], which fails with
//! [`EngineError::Configuration`] before any run starts:
//!
//! - the entry node must be registered,
//! - every route source and destination must be a registered node,
//! - a route's action must be in the source node's declared action set,
//! - every declared action of every node must have a route or an explicit
//!   termination marker.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{EngineError, Result};
use crate::node::{Action, Node, RunContext};

/// Destination of a `(node, action)` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Continue the walk at the named node.
    To(&'static str),
    /// Terminate the walk.
    End,
}

/// Builder for [`Graph`].  Collects nodes and routes, then validates the
/// whole wiring in [`GraphBuilder::build`].
pub struct GraphBuilder<W> {
    nodes: HashMap<&'static str, Box<dyn Node<W>>>,
    routes: HashMap<(&'static str, Action), Route>,
    entry: Option<&'static str>,
    duplicate: Option<&'static str>,
}

impl<W: Send + Sync> GraphBuilder<W> {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            routes: HashMap::new(),
            entry: None,
            duplicate: None,
        }
    }

    /// Register a node.  Node names must be unique within a graph.
    pub fn node(mut self, node: impl Node<W> + 'static) -> Self {
        let name = node.name();
        if self.nodes.insert(name, Box::new(node)).is_some() {
            self.duplicate = Some(name);
        }
        self
    }

    /// Set the entry node for every walk.
    pub fn entry(mut self, name: &'static str) -> Self {
        self.entry = Some(name);
        self
    }

    /// Route `action` emitted by `from` to the node `to`.
    pub fn route(mut self, from: &'static str, action: Action, to: &'static str) -> Self {
        self.routes.insert((from, action), Route::To(to));
        self
    }

    /// Mark `action` emitted by `from` as terminating the walk.
    pub fn terminate(mut self, from: &'static str, action: Action) -> Self {
        self.routes.insert((from, action), Route::End);
        self
    }

    /// Validate the wiring and produce an immutable [`Graph`].
    pub fn build(self) -> Result<Graph<W>> {
        if let Some(name) = self.duplicate {
            return Err(EngineError::Configuration {
                reason: format!("node `{name}` registered more than once"),
            });
        }

        let entry = self.entry.ok_or_else(|| EngineError::Configuration {
            reason: "no entry node configured".into(),
        })?;
        if !self.nodes.contains_key(entry) {
            return Err(EngineError::Configuration {
                reason: format!("entry node `{entry}` is not registered"),
            });
        }

        for ((from, action), route) in &self.routes {
            let node = self
                .nodes
                .get(from)
                .ok_or_else(|| EngineError::Configuration {
                    reason: format!("route from unknown node `{from}`"),
                })?;
            if !node.emits().contains(action) {
                return Err(EngineError::Configuration {
                    reason: format!("node `{from}` never emits routed action `{action}`"),
                });
            }
            if let Route::To(to) = route
                && !self.nodes.contains_key(to)
            {
                return Err(EngineError::Configuration {
                    reason: format!("route `{from}` --{action}--> unknown node `{to}`"),
                });
            }
        }

        // Exhaustiveness: every action a node can emit must be covered.
        for (name, node) in &self.nodes {
            for action in node.emits() {
                if !self.routes.contains_key(&(name, *action)) {
                    return Err(EngineError::Configuration {
                        reason: format!(
                            "node `{name}` emits `{action}` but no route or termination is registered"
                        ),
                    });
                }
            }
        }

        debug!(
            entry,
            nodes = self.nodes.len(),
            routes = self.routes.len(),
            "workflow graph validated"
        );

        Ok(Graph {
            nodes: self.nodes,
            routes: self.routes,
            entry,
        })
    }
}

impl<W: Send + Sync> Default for GraphBuilder<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated workflow graph.
///
/// Walks are read-only with respect to the graph itself, so one graph can
/// drive any number of concurrent walks.
pub struct Graph<W> {
    nodes: HashMap<&'static str, Box<dyn Node<W>>>,
    routes: HashMap<(&'static str, Action), Route>,
    entry: &'static str,
}

// Manual impl: `dyn Node` is not Debug, so summarize the wiring.
impl<W> std::fmt::Debug for Graph<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.len())
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl<W: Send + Sync> Graph<W> {
    /// Name of the entry node.
    #[must_use]
    pub fn entry(&self) -> &'static str {
        self.entry
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of registered routes (including terminations).
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Drive one item from the entry node to a terminal action.
    ///
    /// Each arrival at a node runs its lifecycle exactly once; the emitted
    /// action deterministically selects the next node from the route
    /// table.  Returns the terminal action.
    pub async fn walk(&self, ws: &W, run: &RunContext) -> Result<Action> {
        let mut current = self.entry;
        loop {
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| EngineError::Configuration {
                    reason: format!("walk reached unknown node `{current}`"),
                })?;

            let action = node.run(ws, run).await?;
            trace!(key = %run.key(), node = current, action = %action, "node finished");

            match self.routes.get(&(current, action)) {
                Some(Route::To(next)) => current = next,
                Some(Route::End) => {
                    debug!(key = %run.key(), node = current, action = %action, "walk terminated");
                    return Ok(action);
                }
                // Unreachable after build(); kept as a guard so a bug here
                // surfaces as a configuration failure instead of a hang.
                None => {
                    return Err(EngineError::Configuration {
                        reason: format!("no route registered for `{current}` --{action}-->"),
                    });
                }
            }
        }
    }
}
