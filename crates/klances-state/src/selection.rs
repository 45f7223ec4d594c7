use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use klances_types::PodInfo;

use crate::store::Snapshot;

/// Namespaces chosen by the user. An empty selection means all namespaces.
///
/// Clones share the same selection. Every effective change bumps a
/// generation counter so the render side can notice it without locking.
#[derive(Clone, Default)]
pub struct SelectionFilter {
    selected: Arc<RwLock<BTreeSet<String>>>,
    generation: Arc<AtomicU64>,
}

impl SelectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole selection
    pub fn set_selection<I, S>(&self, namespace_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = namespace_ids.into_iter().map(Into::into).collect();
        let mut selected = self.selected.write();
        if *selected != next {
            *selected = next;
            self.bump();
        }
    }

    /// Flip one namespace in or out of the selection, returning whether it is now selected
    pub fn toggle_namespace(&self, namespace_id: &str) -> bool {
        let mut selected = self.selected.write();
        let now_selected = if selected.remove(namespace_id) {
            false
        } else {
            selected.insert(namespace_id.to_string());
            true
        };
        self.bump();
        now_selected
    }

    /// Go back to showing all namespaces
    pub fn clear(&self) {
        let mut selected = self.selected.write();
        if !selected.is_empty() {
            selected.clear();
            self.bump();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.read().is_empty()
    }

    /// Whether the namespace was explicitly picked
    pub fn is_selected(&self, namespace_id: &str) -> bool {
        self.selected.read().contains(namespace_id)
    }

    /// Whether pods of the namespace pass the filter
    pub fn includes(&self, namespace_id: &str) -> bool {
        let selected = self.selected.read();
        selected.is_empty() || selected.contains(namespace_id)
    }

    pub fn filtered_namespace_ids(&self) -> BTreeSet<String> {
        self.selected.read().clone()
    }

    /// Pods of the selected namespaces, in snapshot order
    pub fn filtered_pods(&self, snapshot: &Snapshot) -> Vec<PodInfo> {
        let selected = self.selected.read();
        snapshot
            .pods()
            .iter()
            .filter(|pod| selected.is_empty() || selected.contains(&pod.namespace))
            .cloned()
            .collect()
    }

    /// Drop namespaces the snapshot no longer knows about, returning the removed ids.
    ///
    /// Skipped while the namespace list itself is stale, since it cannot tell
    /// a deleted namespace from one that simply was not fetched.
    pub fn prune(&self, snapshot: &Snapshot) -> Vec<String> {
        if snapshot.staleness().namespaces.is_stale() {
            return Vec::new();
        }

        let mut selected = self.selected.write();
        let removed: Vec<String> = selected
            .iter()
            .filter(|id| !snapshot.has_namespace(id))
            .cloned()
            .collect();

        if !removed.is_empty() {
            for id in &removed {
                selected.remove(id);
            }
            self.bump();
            tracing::info!(?removed, "Pruned namespaces gone from the cluster");
        }

        removed
    }

    /// Counter bumped on every change
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PollResult, StateStore};
    use klances_types::{ClusterError, NamespaceInfo, NamespacePhase};

    fn snapshot(namespaces: &[&str], pods: &[(&str, &str)]) -> Arc<Snapshot> {
        let mut store = StateStore::new();
        store.apply(PollResult {
            nodes: Ok(vec![]),
            namespaces: Ok(namespaces
                .iter()
                .map(|n| NamespaceInfo::new(*n, NamespacePhase::Active))
                .collect()),
            pods: Ok(pods.iter().map(|(ns, name)| PodInfo::new(*ns, *name)).collect()),
        })
    }

    fn names(pods: &[PodInfo]) -> Vec<&str> {
        pods.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_empty_selection_returns_all_in_order() {
        let snap = snapshot(
            &["ns-a", "ns-b"],
            &[("ns-b", "p1"), ("ns-a", "p2"), ("ns-b", "p3")],
        );
        let filter = SelectionFilter::new();
        assert_eq!(names(&filter.filtered_pods(&snap)), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_selection_keeps_relative_order() {
        let snap = snapshot(
            &["ns-a", "ns-b"],
            &[("ns-a", "p1"), ("ns-b", "p2"), ("ns-a", "p3"), ("ns-b", "p4")],
        );
        let filter = SelectionFilter::new();
        filter.set_selection(["ns-a"]);

        let pods = filter.filtered_pods(&snap);
        assert_eq!(names(&pods), vec!["p1", "p3"]);
        assert!(pods.iter().all(|p| p.namespace == "ns-a"));
    }

    #[test]
    fn test_toggle_and_generation() {
        let filter = SelectionFilter::new();
        let start = filter.generation();

        assert!(filter.toggle_namespace("ns-a"));
        assert!(filter.is_selected("ns-a"));
        assert!(!filter.includes("ns-b"));

        assert!(!filter.toggle_namespace("ns-a"));
        assert!(filter.is_empty());
        assert!(filter.includes("ns-b"));
        assert_eq!(filter.generation(), start + 2);
    }

    #[test]
    fn test_setting_same_selection_keeps_generation() {
        let filter = SelectionFilter::new();
        filter.set_selection(["ns-a", "ns-b"]);
        let generation = filter.generation();

        filter.set_selection(["ns-b", "ns-a"]);
        filter.clear();
        filter.clear();
        assert_eq!(filter.generation(), generation + 1);
    }

    #[test]
    fn test_prune_removes_deleted_namespaces() {
        let filter = SelectionFilter::new();
        filter.set_selection(["ns-a", "ns-gone"]);

        let removed = filter.prune(&snapshot(&["ns-a", "ns-b"], &[]));
        assert_eq!(removed, vec!["ns-gone".to_string()]);
        assert_eq!(
            filter.filtered_namespace_ids(),
            BTreeSet::from(["ns-a".to_string()])
        );
    }

    #[test]
    fn test_prune_skipped_when_namespaces_stale() {
        let mut store = StateStore::new();
        let snap = store.apply(PollResult {
            nodes: Ok(vec![]),
            namespaces: Err(ClusterError::Transient("timeout".into())),
            pods: Ok(vec![]),
        });

        let filter = SelectionFilter::new();
        filter.set_selection(["ns-a"]);
        assert!(filter.prune(&snap).is_empty());
        assert!(filter.is_selected("ns-a"));
    }
}
