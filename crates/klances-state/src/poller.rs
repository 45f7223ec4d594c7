use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};

use klances_k8s::ClusterSource;
use klances_types::{ClusterError, NamespaceInfo, NodeInfo, PodInfo, ResourceKind};

/// Outcome of one poll, each resource type fetched independently
#[derive(Debug)]
pub struct PollResult {
    pub nodes: Result<Vec<NodeInfo>, ClusterError>,
    pub namespaces: Result<Vec<NamespaceInfo>, ClusterError>,
    pub pods: Result<Vec<PodInfo>, ClusterError>,
}

impl PollResult {
    /// Failed resource types with their errors
    pub fn failures(&self) -> Vec<(ResourceKind, &ClusterError)> {
        let mut failures = Vec::new();
        if let Err(e) = &self.nodes {
            failures.push((ResourceKind::Nodes, e));
        }
        if let Err(e) = &self.namespaces {
            failures.push((ResourceKind::Namespaces, e));
        }
        if let Err(e) = &self.pods {
            failures.push((ResourceKind::Pods, e));
        }
        failures
    }

    /// First error that should end the session
    pub fn fatal_error(&self) -> Option<&ClusterError> {
        self.failures()
            .into_iter()
            .map(|(_, e)| e)
            .find(|e| e.is_fatal())
    }
}

/// Fetches nodes, namespaces and pods from the cluster data source
pub struct ResourcePoller<S> {
    source: Arc<S>,
    in_flight: AtomicBool,
}

impl<S: ClusterSource> ResourcePoller<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Fetch all resource types concurrently; one failing never affects the others
    pub async fn poll(&self) -> PollResult {
        let (nodes, namespaces, pods) = tokio::join!(
            self.source.list_nodes(),
            self.source.list_namespaces(),
            self.source.list_pods(None),
        );

        PollResult {
            nodes,
            namespaces,
            pods,
        }
    }

    /// Poll unless another poll is still running, in which case nothing
    /// happens and `None` is returned.
    pub async fn poll_if_idle(&self) -> Option<PollResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Poll still in flight, skipping tick");
            return None;
        }

        // Released on drop so a cancelled poll does not wedge the poller
        let _guard = InFlight(&self.in_flight);
        Some(self.poll().await)
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Why the poll loop woke up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollTrigger {
    Interval,
    Refresh,
}

/// Fixed cadence for the poll loop, with on-demand refresh.
///
/// Missed ticks are skipped rather than bunched up, and refresh requests
/// made while a poll runs collapse into a single extra poll.
pub struct PollTimer {
    interval: Interval,
    refresh: Arc<Notify>,
}

impl PollTimer {
    pub fn new(period: Duration, refresh: Arc<Notify>) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, refresh }
    }

    /// Wait for the next poll. The first call returns immediately.
    pub async fn tick(&mut self) -> PollTrigger {
        tokio::select! {
            _ = self.interval.tick() => PollTrigger::Interval,
            _ = self.refresh.notified() => {
                self.interval.reset();
                PollTrigger::Refresh
            }
        }
    }
}
