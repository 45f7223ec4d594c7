//! Cluster state for klances
//!
//! This crate polls the cluster data source, keeps the latest immutable
//! [`Snapshot`] and tracks the user's namespace selection.

mod poller;
mod selection;
mod store;

pub use poller::{PollResult, PollTimer, PollTrigger, ResourcePoller};
pub use selection::SelectionFilter;
pub use store::{ResourceHealth, Snapshot, StateStore, Staleness, StoreReader};

// Re-export types used in our public API
pub use klances_types::{ClusterError, NamespaceInfo, NodeInfo, PodInfo, PodKey, ResourceKind};
