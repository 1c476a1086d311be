//! Outer polling loop.
//!
//! The driver alternates between two self-transitions: *idle* (the source
//! had nothing — wait one backoff interval and re-check) and *dispatch*
//! (the source admitted new items — run a batch over the snapshot, then
//! go back to checking).  The loop has no natural termination; it runs
//! until [`PollingDriver::shutdown`] is called.
//!
//! Fetch failures are transient by design: they are logged and retried
//! after the same fixed backoff, with no cap and no exponential growth.
//! Callers that need a harder policy wrap the driver in their own
//! supervision.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::batch::{BatchReport, BatchRunner};
use crate::error::Result;
use crate::graph::Graph;
use crate::workspace::ItemKey;

/// Supplies new work to the polling loop.
///
/// An implementation fetches pending items from wherever they originate,
/// admits their state into the workspace, and returns the keys of the
/// items it admitted.  An empty list is the normal "nothing new" answer,
/// not an error.
#[async_trait]
pub trait WorkSource<W>: Send + Sync
where
    W: Send + Sync,
{
    /// Fetch new work and admit it into `ws`.
    async fn poll(&self, ws: &W) -> Result<Vec<ItemKey>>;
}

struct DriverInner<W> {
    graph: Graph<W>,
    workspace: Arc<W>,
    source: Arc<dyn WorkSource<W>>,
    runner: BatchRunner,
    backoff: Duration,
    shutdown: AtomicBool,
    notify: Notify,
}

/// The outer poll-and-dispatch loop.
///
/// Cheaply cloneable (`Arc`-backed); clone a handle to request shutdown
/// from elsewhere while the loop runs.
pub struct PollingDriver<W> {
    inner: Arc<DriverInner<W>>,
}

// Manual impl: the derive would demand `W: Clone`, but only the handle
// is cloned, never the workspace behind it.
impl<W> Clone for PollingDriver<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Send + Sync + 'static> PollingDriver<W> {
    /// The reference backoff between polling cycles.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(30);

    /// Create a driver over a validated graph.
    #[must_use]
    pub fn new(
        graph: Graph<W>,
        workspace: Arc<W>,
        source: Arc<dyn WorkSource<W>>,
        backoff: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                graph,
                workspace,
                source,
                runner: BatchRunner::new(),
                backoff,
                shutdown: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Spawn the polling loop onto the tokio runtime.
    ///
    /// Returns a [`JoinHandle`] that resolves once shutdown completes.
    pub fn start(&self) -> JoinHandle<()> {
        let driver = self.clone();
        tokio::spawn(async move {
            info!("polling driver started");
            driver.run_until_shutdown().await;
            info!("polling driver stopped");
        })
    }

    /// Run the loop on the current task until shutdown is requested.
    ///
    /// A batch that has already started is allowed to finish; the
    /// shutdown check sits between cycles so workspace state is never
    /// left half-applied.
    pub async fn run_until_shutdown(&self) {
        let inner = &self.inner;
        loop {
            if inner.shutdown.load(Ordering::Acquire) {
                break;
            }

            match inner.source.poll(inner.workspace.as_ref()).await {
                Ok(snapshot) if snapshot.is_empty() => {
                    debug!("no new work; backing off");
                    if !self.wait_backoff().await {
                        break;
                    }
                }
                Ok(snapshot) => {
                    info!(items = snapshot.len(), "new work; dispatching batch");
                    let report = inner
                        .runner
                        .run(&inner.graph, inner.workspace.as_ref(), snapshot)
                        .await;
                    debug!(
                        completed = report.completed(),
                        failed = report.failed(),
                        aggregate = %report.aggregate(),
                        "returning to poll"
                    );
                }
                Err(err) => {
                    // Transient: retry after the standard backoff.
                    warn!(error = %err, "work source fetch failed; retrying after backoff");
                    if !self.wait_backoff().await {
                        break;
                    }
                }
            }
        }
    }

    /// Run exactly one fetch-and-dispatch cycle.
    ///
    /// Useful for hosts that want to own the loop (or drive a single
    /// pass, as the offline CLI run does).
    pub async fn poll_once(&self) -> Result<BatchReport> {
        let inner = &self.inner;
        let snapshot = inner.source.poll(inner.workspace.as_ref()).await?;
        if snapshot.is_empty() {
            return Ok(BatchReport::default());
        }
        Ok(inner
            .runner
            .run(&inner.graph, inner.workspace.as_ref(), snapshot)
            .await)
    }

    /// Request cooperative shutdown.  The loop exits at the next
    /// between-cycles check; an idle backoff wait is interrupted
    /// immediately.
    pub fn shutdown(&self) {
        info!("polling driver shutdown requested");
        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Sleep one backoff interval.  Returns `false` when shutdown was
    /// requested during the wait.
    async fn wait_backoff(&self) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.inner.backoff) => {
                !self.inner.shutdown.load(Ordering::Acquire)
            }
            () = self.inner.notify.notified() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::graph::GraphBuilder;
    use crate::node::{Action, RunContext, Stage};
    use crate::workspace::Workspace;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Consumes the item: marks it handled and removes it.
    struct ConsumeNode;

    #[async_trait]
    impl Stage<Workspace<&'static str>> for ConsumeNode {
        type Prepared = ();
        type Output = ();

        fn name(&self) -> &'static str {
            "consume"
        }

        fn emits(&self) -> &'static [Action] {
            &[Action::END]
        }

        async fn prepare(
            &self,
            ws: &Workspace<&'static str>,
            run: &RunContext,
        ) -> Result<()> {
            ws.with(run.key(), |_| ())
                .ok_or_else(|| EngineError::MissingState {
                    node: "consume",
                    key: run.key().to_string(),
                })
        }

        async fn execute(&self, _input: &()) -> Result<()> {
            Ok(())
        }

        async fn finalize(
            &self,
            ws: &Workspace<&'static str>,
            run: &RunContext,
            _input: (),
            _output: (),
        ) -> Result<Action> {
            ws.remove(run.key());
            Ok(Action::END)
        }
    }

    /// Replays a scripted sequence of poll results, recording when each
    /// poll happened.  Once the script is exhausted it reports no work.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<&'static str>>>>,
        polls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<&'static str>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                polls: Mutex::new(Vec::new()),
            }
        }

        fn poll_times(&self) -> Vec<Instant> {
            self.polls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkSource<Workspace<&'static str>> for ScriptedSource {
        async fn poll(&self, ws: &Workspace<&'static str>) -> Result<Vec<ItemKey>> {
            self.polls.lock().unwrap().push(Instant::now());
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(ids)) => {
                    let mut keys = Vec::new();
                    for id in ids {
                        let key = ItemKey::new(id);
                        ws.insert(key.clone(), "pending");
                        keys.push(key);
                    }
                    Ok(keys)
                }
                Some(Err(err)) => Err(err),
                None => Ok(Vec::new()),
            }
        }
    }

    fn consume_graph() -> Graph<Workspace<&'static str>> {
        GraphBuilder::new()
            .node(ConsumeNode)
            .entry("consume")
            .terminate("consume", Action::END)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn idle_twice_then_dispatch() {
        let backoff = Duration::from_millis(20);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec!["m1"]),
        ]));
        let ws = Arc::new(Workspace::new());
        let driver = PollingDriver::new(consume_graph(), Arc::clone(&ws), source.clone(), backoff);

        let handle = driver.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        driver.shutdown();
        handle.await.unwrap();

        let polls = source.poll_times();
        assert!(polls.len() >= 3, "expected at least 3 polls, got {}", polls.len());
        // Two empty polls mean two full backoff waits before the dispatch.
        assert!(polls[2] - polls[0] >= backoff * 2);
        // The single message was dispatched and consumed by its walk.
        assert!(ws.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_retried() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(EngineError::Execution {
                node: "source",
                reason: "imap down".into(),
            }),
            Ok(vec!["m1"]),
        ]));
        let ws = Arc::new(Workspace::new());
        let driver = PollingDriver::new(
            consume_graph(),
            Arc::clone(&ws),
            source.clone(),
            Duration::from_millis(10),
        );

        let handle = driver.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        driver.shutdown();
        handle.await.unwrap();

        // The failed fetch did not kill the loop; the follow-up poll ran
        // and its item was processed.
        assert!(source.poll_times().len() >= 2);
        assert!(ws.is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_idle_wait() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let ws = Arc::new(Workspace::new());
        let driver = PollingDriver::new(
            consume_graph(),
            ws,
            source,
            Duration::from_secs(3600),
        );

        let handle = driver.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!driver.is_shutdown());
        driver.shutdown();

        // The hour-long backoff must not delay the join.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("driver should stop promptly")
            .unwrap();
        assert!(driver.is_shutdown());
    }

    #[tokio::test]
    async fn cloned_handle_requests_shutdown() {
        // The workspace type is deliberately not Clone; only the handle is.
        let source = Arc::new(ScriptedSource::new(vec![]));
        let ws = Arc::new(Workspace::new());
        let driver = PollingDriver::new(
            consume_graph(),
            ws,
            source,
            Duration::from_secs(3600),
        );
        let handle_clone = driver.clone();

        let join = driver.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle_clone.shutdown();

        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .expect("driver should stop promptly")
            .unwrap();
        assert!(driver.is_shutdown());
    }

    #[tokio::test]
    async fn poll_once_dispatches_single_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec!["m1", "m2"])]));
        let ws = Arc::new(Workspace::new());
        let driver = PollingDriver::new(
            consume_graph(),
            Arc::clone(&ws),
            source,
            PollingDriver::<Workspace<&'static str>>::DEFAULT_BACKOFF,
        );

        let report = driver.poll_once().await.unwrap();
        assert_eq!(report.completed(), 2);
        assert!(ws.is_empty());

        // Script exhausted: the next cycle is a no-op.
        let report = driver.poll_once().await.unwrap();
        assert!(report.outcomes().is_empty());
    }
}
