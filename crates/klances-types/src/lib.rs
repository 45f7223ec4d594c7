//! Shared types for klances
//!
//! This crate contains the cluster data model and the error taxonomy used
//! across all klances crates.

use std::fmt;

use chrono::{DateTime, Utc};

// ============================================================================
// Kubernetes Resource Types
// ============================================================================

/// Node information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub address: Option<String>,
    pub cpu_capacity: Option<String>,
    pub memory_capacity: Option<String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            cpu_capacity: None,
            memory_capacity: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NamespacePhase {
    Active,
    Terminating,
    #[default]
    Unknown,
}

impl NamespacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Terminating => "Terminating",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<&str> for NamespacePhase {
    fn from(s: &str) -> Self {
        match s {
            "Active" => Self::Active,
            "Terminating" => Self::Terminating,
            _ => Self::Unknown,
        }
    }
}

/// Namespace information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    pub phase: NamespacePhase,
}

impl NamespaceInfo {
    pub fn new(name: impl Into<String>, phase: NamespacePhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Pod information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Absent until the pod has been scheduled
    pub ip: Option<String>,
    pub node_name: Option<String>,
}

impl PodInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: PodPhase::Unknown,
            ip: None,
            node_name: None,
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey::new(&self.namespace, &self.name)
    }
}

/// Identity of a pod: `(namespace, name)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The resource types fetched on every poll
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Nodes,
    Namespaces,
    Pods,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Nodes, Self::Namespaces, Self::Pods];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Namespaces => "namespaces",
            Self::Pods => "pods",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by a cluster data source.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ClusterError {
    /// Network, timeout or server failure on a single request; retried on the next tick.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// A log stream broke or could not be opened; retried with backoff.
    #[error("log stream error: {0}")]
    Stream(String),

    /// Credentials are invalid or expired; nothing can succeed after this.
    #[error("authentication failed: {0}")]
    FatalAuth(String),
}

impl ClusterError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalAuth(_))
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// A single line received from a pod log stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Sequence number within the owning buffer
    pub seq: u64,

    /// When the line arrived
    pub received_at: DateTime<Utc>,

    /// Line content without the trailing newline
    pub text: String,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            seq: 0,
            received_at: Utc::now(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parsing() {
        assert_eq!(NamespacePhase::from("Terminating"), NamespacePhase::Terminating);
        assert_eq!(NamespacePhase::from("weird"), NamespacePhase::Unknown);
        assert_eq!(PodPhase::from("Running"), PodPhase::Running);
        assert_eq!(PodPhase::from(""), PodPhase::Unknown);
    }

    #[test]
    fn test_pod_key_display() {
        let pod = PodInfo::new("kube-system", "etcd-minikube");
        assert_eq!(pod.key().to_string(), "kube-system/etcd-minikube");
    }

    #[test]
    fn test_only_auth_errors_are_fatal() {
        assert!(ClusterError::FatalAuth("expired".into()).is_fatal());
        assert!(!ClusterError::Transient("timeout".into()).is_fatal());
        assert!(!ClusterError::Stream("reset".into()).is_fatal());
    }
}
