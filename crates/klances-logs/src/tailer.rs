use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use klances_k8s::ClusterSource;
use klances_state::{SelectionFilter, Snapshot};
use klances_types::{ClusterError, PodKey};

use crate::backoff::BackoffConfig;
use crate::store::LogStore;
use crate::stream::follow_pod;

/// Default number of poll ticks a drained buffer survives
pub const DEFAULT_GRACE_TICKS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TailerConfig {
    /// Reconciles a pod may stay away before its buffer is released
    pub grace_ticks: u32,
    pub backoff: BackoffConfig,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            grace_ticks: DEFAULT_GRACE_TICKS,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Lifecycle of a pod's log stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    /// Never watched, or forgotten after being closed
    Unwatched,
    /// A stream task is feeding the buffer
    Watching,
    /// Stream cancelled, buffer kept while the pod may come back
    Draining { idle_ticks: u32 },
    /// Buffer released
    Closed,
}

struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    fn stop(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.task
    }
}

struct PodWatch {
    state: WatchState,
    stream: Option<StreamHandle>,
}

/// Keeps one log stream per pod that is both in the latest snapshot and in
/// the selection, driven once per poll tick by [`LogTailer::reconcile`].
pub struct LogTailer<S> {
    source: Arc<S>,
    logs: LogStore,
    config: TailerConfig,
    watches: HashMap<PodKey, PodWatch>,
    cancel: CancellationToken,
    fatal: mpsc::UnboundedSender<ClusterError>,
}

impl<S: ClusterSource> LogTailer<S> {
    /// Create a tailer. Streams are cancelled with `cancel`; authentication
    /// failures seen by a stream are sent on `fatal`.
    pub fn new(
        source: Arc<S>,
        logs: LogStore,
        config: TailerConfig,
        cancel: CancellationToken,
        fatal: mpsc::UnboundedSender<ClusterError>,
    ) -> Self {
        Self {
            source,
            logs,
            config,
            watches: HashMap::new(),
            cancel,
            fatal,
        }
    }

    /// Advance every pod's state machine against a freshly committed snapshot
    pub fn reconcile(&mut self, snapshot: &Snapshot, selection: &SelectionFilter) {
        // Closed watches were visible for one tick, now they are forgotten
        self.watches
            .retain(|_, watch| watch.state != WatchState::Closed);

        let wanted: HashSet<PodKey> = snapshot
            .pods()
            .iter()
            .filter(|pod| selection.includes(&pod.namespace))
            .map(|pod| pod.key())
            .collect();

        let to_start: Vec<PodKey> = wanted
            .iter()
            .filter(|key| self.state(key) != WatchState::Watching)
            .cloned()
            .collect();

        for key in to_start {
            self.start(key);
        }

        for (key, watch) in self.watches.iter_mut() {
            if wanted.contains(key) {
                continue;
            }

            match watch.state {
                WatchState::Watching => {
                    if let Some(stream) = watch.stream.take() {
                        stream.stop();
                    }
                    watch.state = WatchState::Draining { idle_ticks: 0 };
                    tracing::debug!(pod = %key, "Pod gone or deselected, draining");
                }
                WatchState::Draining { idle_ticks } => {
                    let idle_ticks = idle_ticks + 1;
                    if idle_ticks >= self.config.grace_ticks {
                        self.logs.release(key);
                        watch.state = WatchState::Closed;
                        tracing::debug!(pod = %key, "Grace period over, closed");
                    } else {
                        watch.state = WatchState::Draining { idle_ticks };
                    }
                }
                WatchState::Unwatched | WatchState::Closed => {}
            }
        }
    }

    fn start(&mut self, key: PodKey) {
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(follow_pod(
            Arc::clone(&self.source),
            key.clone(),
            self.logs.clone(),
            self.config.backoff,
            self.fatal.clone(),
            cancel.clone(),
        ));

        let watch = self.watches.entry(key.clone()).or_insert(PodWatch {
            state: WatchState::Unwatched,
            stream: None,
        });

        match watch.state {
            WatchState::Draining { .. } => {
                tracing::debug!(pod = %key, "Pod is back, resuming with its buffer")
            }
            _ => tracing::debug!(pod = %key, "Watching pod"),
        }

        watch.state = WatchState::Watching;
        if let Some(previous) = watch.stream.replace(StreamHandle { cancel, task }) {
            previous.stop();
        }
    }

    /// Current state of a pod's watch
    pub fn state(&self, key: &PodKey) -> WatchState {
        self.watches
            .get(key)
            .map(|watch| watch.state)
            .unwrap_or(WatchState::Unwatched)
    }

    /// Pods with a running stream, sorted
    pub fn watching(&self) -> Vec<PodKey> {
        let mut keys: Vec<PodKey> = self
            .watches
            .iter()
            .filter(|(_, watch)| watch.state == WatchState::Watching)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of running stream tasks
    pub fn active_count(&self) -> usize {
        self.watches
            .values()
            .filter(|watch| watch.stream.as_ref().is_some_and(|s| !s.task.is_finished()))
            .count()
    }

    /// Cancel every stream and wait for the tasks to finish
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self
            .watches
            .values_mut()
            .filter_map(|watch| watch.stream.take())
            .map(StreamHandle::stop)
            .collect();

        for task in tasks {
            let _ = task.await;
        }
        tracing::debug!("Log tailer stopped");
    }
}

impl<S> Drop for LogTailer<S> {
    fn drop(&mut self) {
        for watch in self.watches.values_mut() {
            if let Some(stream) = watch.stream.take() {
                stream.cancel.cancel();
            }
        }
    }
}
