//! meetflow-engine — the workflow orchestration engine.
//!
//! The engine knows nothing about email or calendars.  It provides:
//!
//! - [`Stage`] / [`Node`] — the prepare/execute/finalize contract every
//!   processing step implements.
//! - [`Graph`] — a directed graph of nodes connected by named [`Action`]
//!   transitions, validated exhaustively at construction time.
//! - [`BatchRunner`] — drives a snapshot of work items through a graph,
//!   one isolated walk per item.
//! - [`PollingDriver`] — the outer loop that polls a [`WorkSource`] for
//!   new items and dispatches batches, with cooperative shutdown.
//! - [`Workspace`] — the concurrency-safe keyed store that holds per-item
//!   state while an item is in flight.

pub mod batch;
pub mod error;
pub mod graph;
pub mod node;
pub mod poll;
pub mod workspace;

pub use batch::{BatchReport, BatchRunner, ItemOutcome};
pub use error::{EngineError, Result};
pub use graph::{Graph, GraphBuilder, Route};
pub use node::{Action, Node, RunContext, Stage};
pub use poll::{PollingDriver, WorkSource};
pub use workspace::{ItemKey, Workspace};
