//! Kubernetes data source for klances
//!
//! This crate defines the [`ClusterSource`] capability consumed by the poller
//! and the log tailer, a `kube` backed implementation, and an in-memory fake.

mod client;
mod fake;
mod source;

pub use client::KubeClient;
pub use fake::FakeCluster;
pub use source::{ClusterSource, LogLineStream, StreamedLine};

// Re-export types that are used in our public API
pub use klances_types::{ClusterError, NamespaceInfo, NodeInfo, PodInfo, PodKey};
