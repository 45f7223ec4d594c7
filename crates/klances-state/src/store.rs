use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use klances_types::{ClusterError, NamespaceInfo, NodeInfo, PodInfo, PodKey, ResourceKind};

use crate::poller::PollResult;

/// Health of one resource type across polls
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceHealth {
    /// Consecutive failed polls since the last success
    pub stale_ticks: u32,

    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
}

impl ResourceHealth {
    pub fn is_stale(&self) -> bool {
        self.stale_ticks > 0
    }
}

/// Per-resource health carried by every snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Staleness {
    pub nodes: ResourceHealth,
    pub namespaces: ResourceHealth,
    pub pods: ResourceHealth,
}

impl Staleness {
    pub fn get(&self, kind: ResourceKind) -> &ResourceHealth {
        match kind {
            ResourceKind::Nodes => &self.nodes,
            ResourceKind::Namespaces => &self.namespaces,
            ResourceKind::Pods => &self.pods,
        }
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut ResourceHealth {
        match kind {
            ResourceKind::Nodes => &mut self.nodes,
            ResourceKind::Namespaces => &mut self.namespaces,
            ResourceKind::Pods => &mut self.pods,
        }
    }
}

/// Immutable view of the cluster at one poll tick
#[derive(Clone, Debug)]
pub struct Snapshot {
    version: u64,
    nodes: Arc<[NodeInfo]>,
    namespaces: Arc<[NamespaceInfo]>,
    pods: Arc<[PodInfo]>,
    staleness: Staleness,
}

impl Snapshot {
    /// The snapshot published before the first poll
    pub fn empty() -> Self {
        Self {
            version: 0,
            nodes: Arc::from(Vec::new()),
            namespaces: Arc::from(Vec::new()),
            pods: Arc::from(Vec::new()),
            staleness: Staleness::default(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn namespaces(&self) -> &[NamespaceInfo] {
        &self.namespaces
    }

    pub fn pods(&self) -> &[PodInfo] {
        &self.pods
    }

    pub fn staleness(&self) -> &Staleness {
        &self.staleness
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.iter().any(|ns| ns.name == name)
    }

    pub fn pod(&self, key: &PodKey) -> Option<&PodInfo> {
        self.pods
            .iter()
            .find(|p| p.namespace == key.namespace && p.name == key.name)
    }

    /// Same data and health, ignoring the version
    fn same_content(&self, other: &Snapshot) -> bool {
        self.staleness == other.staleness
            && self.nodes == other.nodes
            && self.namespaces == other.namespaces
            && self.pods == other.pods
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

struct Shared {
    current: RwLock<Arc<Snapshot>>,
    version: AtomicU64,
}

/// Owner of the current snapshot. There is exactly one writer; readers get a
/// [`StoreReader`].
pub struct StateStore {
    shared: Arc<Shared>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                current: RwLock::new(Arc::new(Snapshot::empty())),
                version: AtomicU64::new(0),
            }),
        }
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.shared.current.read().clone()
    }

    /// Fold a poll result into a new snapshot and publish it.
    ///
    /// Failed resources keep their previous value and get one more stale tick.
    /// When nothing changed the current snapshot is returned as is and the
    /// version stays the same.
    pub fn apply(&mut self, result: PollResult) -> Arc<Snapshot> {
        let prev = self.current();
        let mut staleness = prev.staleness.clone();

        let nodes = merge(
            ResourceKind::Nodes,
            result.nodes,
            &prev.nodes,
            staleness.get_mut(ResourceKind::Nodes),
        );
        let namespaces = merge(
            ResourceKind::Namespaces,
            result.namespaces,
            &prev.namespaces,
            staleness.get_mut(ResourceKind::Namespaces),
        );
        let pods = merge(
            ResourceKind::Pods,
            result.pods.map(dedup_pods),
            &prev.pods,
            staleness.get_mut(ResourceKind::Pods),
        );

        let mut next = Snapshot {
            version: prev.version,
            nodes,
            namespaces,
            pods,
            staleness,
        };

        if next.same_content(&prev) {
            tracing::trace!(version = prev.version, "Poll brought no change");
            return prev;
        }

        next.version = prev.version + 1;
        let next = Arc::new(next);
        *self.shared.current.write() = Arc::clone(&next);
        self.shared.version.store(next.version, Ordering::Release);

        tracing::debug!(
            version = next.version,
            nodes = next.nodes.len(),
            namespaces = next.namespaces.len(),
            pods = next.pods.len(),
            "Published snapshot"
        );

        next
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle on the store, cheap to clone
#[derive(Clone)]
pub struct StoreReader {
    shared: Arc<Shared>,
}

impl StoreReader {
    /// Latest committed snapshot
    pub fn current(&self) -> Arc<Snapshot> {
        self.shared.current.read().clone()
    }

    /// Version of the latest committed snapshot, without touching it
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }
}

fn merge<T: PartialEq>(
    kind: ResourceKind,
    fetched: Result<Vec<T>, ClusterError>,
    prev: &Arc<[T]>,
    health: &mut ResourceHealth,
) -> Arc<[T]> {
    match fetched {
        Ok(items) => {
            if health.is_stale() {
                tracing::info!(resource = %kind, after = health.stale_ticks, "Fetch recovered");
            }
            *health = ResourceHealth::default();

            // Keep sharing the old allocation when the list did not change
            if prev.as_ref() == items.as_slice() {
                Arc::clone(prev)
            } else {
                Arc::from(items)
            }
        }
        Err(err) => {
            health.stale_ticks += 1;
            health.last_error = Some(err.to_string());
            tracing::warn!(
                resource = %kind,
                stale_ticks = health.stale_ticks,
                error = %err,
                "Fetch failed, keeping previous data"
            );
            Arc::clone(prev)
        }
    }
}

/// Drop pods repeating an already seen `(namespace, name)`
fn dedup_pods(pods: Vec<PodInfo>) -> Vec<PodInfo> {
    let mut seen = HashSet::with_capacity(pods.len());
    pods.into_iter()
        .filter(|pod| {
            let fresh = seen.insert(pod.key());
            if !fresh {
                tracing::warn!(pod = %pod.key(), "Dropping duplicate pod from listing");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use klances_types::NamespacePhase;

    fn transient() -> ClusterError {
        ClusterError::Transient("connection reset".to_string())
    }

    fn ok_result(nodes: &[&str], namespaces: &[&str], pods: &[(&str, &str)]) -> PollResult {
        PollResult {
            nodes: Ok(nodes.iter().map(|n| NodeInfo::new(*n)).collect()),
            namespaces: Ok(namespaces
                .iter()
                .map(|n| NamespaceInfo::new(*n, NamespacePhase::Active))
                .collect()),
            pods: Ok(pods.iter().map(|(ns, name)| PodInfo::new(*ns, *name)).collect()),
        }
    }

    fn node_names(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.nodes().iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_failed_fetch_keeps_last_success() {
        let mut store = StateStore::new();
        store.apply(ok_result(&["n1"], &["default"], &[("default", "a")]));

        let snapshot = store.apply(PollResult {
            nodes: Err(transient()),
            ..ok_result(&[], &["default", "kube"], &[("default", "a")])
        });

        assert_eq!(node_names(&snapshot), vec!["n1"]);
        assert_eq!(snapshot.namespaces().len(), 2);
        assert_eq!(snapshot.staleness().nodes.stale_ticks, 1);
        assert!(snapshot.staleness().nodes.last_error.is_some());
        assert!(!snapshot.staleness().namespaces.is_stale());
    }

    #[test]
    fn test_interleaved_results_track_latest_success() {
        let mut store = StateStore::new();
        let script: Vec<(Option<&str>, bool)> = vec![
            (Some("n1"), true),
            (None, true),
            (None, false),
            (Some("n2"), false),
            (None, true),
            (Some("n3"), true),
            (None, false),
        ];

        let mut expected: Option<&str> = None;
        let mut failures = 0;
        for (node, pods_ok) in script {
            let nodes = match node {
                Some(name) => {
                    expected = Some(name);
                    failures = 0;
                    Ok(vec![NodeInfo::new(name)])
                }
                None => {
                    failures += 1;
                    Err(transient())
                }
            };
            let pods = if pods_ok {
                Ok(vec![PodInfo::new("default", "a")])
            } else {
                Err(transient())
            };
            let snapshot = store.apply(PollResult {
                nodes,
                namespaces: Ok(vec![]),
                pods,
            });

            assert_eq!(node_names(&snapshot), expected.into_iter().collect::<Vec<_>>());
            assert_eq!(snapshot.staleness().nodes.stale_ticks, failures);
        }
    }

    #[test]
    fn test_version_unchanged_on_identical_poll() {
        let mut store = StateStore::new();
        let reader = store.reader();

        let first = store.apply(ok_result(&["n1"], &["default"], &[]));
        assert_eq!(first.version(), 1);

        let second = store.apply(ok_result(&["n1"], &["default"], &[]));
        assert_eq!(second.version(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(reader.version(), 1);
    }

    #[test]
    fn test_failure_bumps_version() {
        let mut store = StateStore::new();
        store.apply(ok_result(&["n1"], &[], &[]));

        let failed = store.apply(PollResult {
            pods: Err(transient()),
            ..ok_result(&["n1"], &[], &[])
        });
        assert_eq!(failed.version(), 2);

        let failed_again = store.apply(PollResult {
            pods: Err(transient()),
            ..ok_result(&["n1"], &[], &[])
        });
        assert_eq!(failed_again.version(), 3);
        assert_eq!(failed_again.staleness().pods.stale_ticks, 2);
    }

    #[test]
    fn test_reader_keeps_old_snapshot_intact() {
        let mut store = StateStore::new();
        let reader = store.reader();
        store.apply(ok_result(&["n1"], &[], &[]));

        let held = reader.current();
        store.apply(ok_result(&["n1", "n2"], &[], &[]));

        assert_eq!(node_names(&held), vec!["n1"]);
        assert_eq!(node_names(&reader.current()), vec!["n1", "n2"]);
        assert_eq!(reader.version(), 2);
    }

    #[test]
    fn test_duplicate_pods_dropped() {
        let mut store = StateStore::new();
        let snapshot = store.apply(ok_result(
            &[],
            &[],
            &[("default", "a"), ("kube", "a"), ("default", "a")],
        ));

        let keys: Vec<String> = snapshot.pods().iter().map(|p| p.key().to_string()).collect();
        assert_eq!(keys, vec!["default/a", "kube/a"]);
    }
}
