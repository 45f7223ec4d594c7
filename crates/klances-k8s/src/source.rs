use std::future::Future;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::mpsc;

use klances_types::{ClusterError, NamespaceInfo, NodeInfo, PodInfo, PodKey};

/// One line of a pod log as delivered by the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamedLine {
    /// Server-side write time, when the server reported one
    pub timestamp: Option<DateTime<Utc>>,
    pub text: String,
}

impl StreamedLine {
    pub fn new(timestamp: Option<DateTime<Utc>>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// Split a `<RFC3339 timestamp> <text>` line as written by the kubelet.
    /// Lines without a parseable prefix are kept whole.
    pub fn parse(line: String) -> Self {
        if let Some((stamp, text)) = line.split_once(' ') {
            if let Ok(timestamp) = stamp.parse::<DateTime<Utc>>() {
                return Self::new(Some(timestamp), text);
            }
        }
        Self::new(None, line)
    }
}

/// Lines of a followed pod log. Ends when the server closes the stream.
pub type LogLineStream = BoxStream<'static, Result<StreamedLine, ClusterError>>;

/// Read access to a cluster, injected into the poller and the log tailer.
pub trait ClusterSource: Send + Sync + 'static {
    fn list_nodes(&self) -> impl Future<Output = Result<Vec<NodeInfo>, ClusterError>> + Send;

    fn list_namespaces(
        &self,
    ) -> impl Future<Output = Result<Vec<NamespaceInfo>, ClusterError>> + Send;

    /// Lists pods of one namespace, or of all namespaces when `namespace` is `None`.
    fn list_pods(
        &self,
        namespace: Option<&str>,
    ) -> impl Future<Output = Result<Vec<PodInfo>, ClusterError>> + Send;

    /// Opens a follow stream on the pod's log. May be called again after the
    /// returned stream fails or ends.
    ///
    /// Without `since` the stream starts with the recent tail of the log. With
    /// `since` it resumes at that server timestamp; the server may repeat lines
    /// stamped at or shortly before it.
    fn stream_logs(
        &self,
        pod: &PodKey,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<LogLineStream, ClusterError>> + Send;
}

/// Adapt a channel of lines into a [`LogLineStream`]
pub(crate) fn receiver_stream(
    rx: mpsc::UnboundedReceiver<Result<StreamedLine, ClusterError>>,
) -> LogLineStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
