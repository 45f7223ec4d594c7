use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use klances_logs::StreamFault;
use klances_state::Snapshot;
use klances_types::{LogLine, PodInfo, PodKey};

/// Everything one frame needs, computed before the renderer is called
#[derive(Clone, Debug)]
pub struct DashboardView {
    /// Cluster context shown in the header
    pub context: String,
    pub snapshot: Arc<Snapshot>,
    pub selection: BTreeSet<String>,

    /// Pods that pass the selection, in snapshot order
    pub pods: Vec<PodInfo>,

    /// Visible window of each shown pod that has logged something
    pub logs: BTreeMap<PodKey, Vec<LogLine>>,
    pub faults: BTreeMap<PodKey, StreamFault>,

    /// Focused row of the namespace list
    pub cursor: usize,

    /// Problem outside the panels, e.g. unreadable terminal input
    pub notice: Option<String>,
}

impl DashboardView {
    /// Namespace under the cursor
    pub fn focused_namespace(&self) -> Option<&str> {
        self.snapshot
            .namespaces()
            .get(self.cursor)
            .map(|ns| ns.name.as_str())
    }

    /// e.g. "3 pods in namespaces default, kube" or "5 pods in all namespaces"
    pub fn pods_summary(&self) -> String {
        let noun = if self.pods.len() == 1 { "pod" } else { "pods" };
        if self.selection.is_empty() {
            format!("{} {} in all namespaces", self.pods.len(), noun)
        } else {
            let names: Vec<&str> = self.selection.iter().map(String::as_str).collect();
            format!("{} {} in namespaces {}", self.pods.len(), noun, names.join(", "))
        }
    }

    /// Log lines of all shown pods interleaved by receive time, oldest first
    pub fn merged_logs(&self) -> Vec<(&PodKey, &LogLine)> {
        let mut merged: Vec<(&PodKey, &LogLine)> = self
            .logs
            .iter()
            .flat_map(|(key, lines)| lines.iter().map(move |line| (key, line)))
            .collect();
        merged.sort_by(|a, b| {
            a.1.received_at
                .cmp(&b.1.received_at)
                .then_with(|| a.0.cmp(b.0))
                .then_with(|| a.1.seq.cmp(&b.1.seq))
        });
        merged
    }

    pub fn total_log_lines(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }
}
