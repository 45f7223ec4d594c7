//! Kubernetes client for klances

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::Api;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use tokio::sync::{mpsc, oneshot};

use klances_types::{ClusterError, NamespaceInfo, NamespacePhase, NodeInfo, PodInfo, PodKey, PodPhase};

use crate::source::{ClusterSource, LogLineStream, StreamedLine, receiver_stream};

/// Number of historical lines requested when a log stream is opened
const DEFAULT_TAIL_LINES: i64 = 100;

/// Kubernetes client wrapper
pub struct KubeClient {
    client: kube::Client,
    context: Option<String>,
    tail_lines: Option<i64>,
}

impl KubeClient {
    /// Create a new KubeClient from the kubeconfig, using `context` or the current one
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;

        let context = context
            .map(str::to_string)
            .or_else(|| kubeconfig.current_context.clone());

        let config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            },
        )
        .await
        .with_context(|| {
            format!(
                "Failed to create config for context: {}",
                context.as_deref().unwrap_or("<current>")
            )
        })?;

        let client = kube::Client::try_from(config).with_context(|| {
            format!(
                "Failed to create client for context: {}",
                context.as_deref().unwrap_or("<current>")
            )
        })?;

        Ok(Self {
            client,
            context,
            tail_lines: Some(DEFAULT_TAIL_LINES),
        })
    }

    /// Set how many historical lines a new log stream starts with (`None` = all)
    pub fn with_tail_lines(mut self, tail_lines: Option<i64>) -> Self {
        self.tail_lines = tail_lines;
        self
    }

    /// Get the context name the client talks to
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl ClusterSource for KubeClient {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, "Failed to list nodes"))?;

        Ok(list.items.into_iter().map(node_to_info).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, "Failed to list namespaces"))?;

        Ok(list
            .items
            .into_iter()
            .map(|ns| {
                let name = ns.metadata.name.unwrap_or_default();
                let phase = ns
                    .status
                    .and_then(|s| s.phase)
                    .as_deref()
                    .map(NamespacePhase::from)
                    .unwrap_or_default();
                NamespaceInfo::new(name, phase)
            })
            .collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodInfo>, ClusterError> {
        let pods: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, "Failed to list pods"))?;

        Ok(list.items.into_iter().map(pod_to_info).collect())
    }

    async fn stream_logs(
        &self,
        pod: &PodKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<LogLineStream, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let pod_name = pod.name.clone();
        let params = log_params(self.tail_lines, since);

        // The reader borrows the request, so it is driven by its own task and
        // lines are forwarded through a channel.
        let (open_tx, open_rx) = oneshot::channel();
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let reader = match api.log_stream(&pod_name, &params).await {
                Ok(reader) => {
                    let _ = open_tx.send(Ok(()));
                    reader
                }
                Err(e) => {
                    let err = classify_stream(e, &pod_name);
                    tracing::debug!(pod = %pod_name, error = %err, "Log request rejected");
                    let _ = open_tx.send(Err(err));
                    return;
                }
            };

            let mut lines = reader.lines();
            loop {
                tokio::select! {
                    // Consumer dropped the stream
                    _ = line_tx.closed() => break,

                    result = lines.try_next() => {
                        match result {
                            Ok(Some(line)) => {
                                if line_tx.send(Ok(StreamedLine::parse(line))).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                tracing::debug!(pod = %pod_name, "Server closed the log stream");
                                break;
                            }
                            Err(e) => {
                                tracing::debug!(pod = %pod_name, error = %e, "Reading the log stream failed");
                                let _ = line_tx.send(Err(ClusterError::Stream(e.to_string())));
                                break;
                            }
                        }
                    }
                }
            }
        });

        open_rx
            .await
            .map_err(|_| ClusterError::Stream(format!("log stream for {} aborted", pod)))??;

        Ok(receiver_stream(line_rx))
    }
}

/// Request parameters for a followed log: the recent tail on a first open,
/// everything from `since` on a resume. Lines are always timestamped.
fn log_params(tail_lines: Option<i64>, since: Option<DateTime<Utc>>) -> LogParams {
    let mut params = LogParams {
        follow: true,
        timestamps: true,
        ..Default::default()
    };

    match since {
        Some(since) => params.since_time = Some(since),
        None => params.tail_lines = tail_lines,
    }

    params
}

/// Map a kube error to the cluster error taxonomy
fn classify(err: kube::Error, what: &str) -> ClusterError {
    let classified = match &err {
        kube::Error::Api(resp) if resp.code == 401 => {
            ClusterError::FatalAuth(format!("{}: {}", what, resp.message))
        }
        kube::Error::Auth(_) => ClusterError::FatalAuth(format!("{}: {}", what, err)),
        _ => ClusterError::Transient(format!("{}: {}", what, err)),
    };

    if classified.is_fatal() {
        tracing::warn!(error = %err, "{}: credentials rejected", what);
    } else {
        tracing::debug!(error = %err, "{}", what);
    }

    classified
}

fn classify_stream(err: kube::Error, pod_name: &str) -> ClusterError {
    match classify(err, &format!("Failed to stream logs of {}", pod_name)) {
        ClusterError::Transient(msg) => ClusterError::Stream(msg),
        other => other,
    }
}

/// Convert a k8s Node to NodeInfo
fn node_to_info(node: Node) -> NodeInfo {
    let mut info = NodeInfo::new(node.metadata.name.unwrap_or_default());

    if let Some(status) = node.status {
        // Prefer the internal IP, fall back to whatever is listed first
        info.address = status.addresses.as_ref().and_then(|addresses| {
            addresses
                .iter()
                .find(|a| a.type_ == "InternalIP")
                .or_else(|| addresses.first())
                .map(|a| a.address.clone())
        });

        if let Some(capacity) = status.capacity {
            info.cpu_capacity = capacity.get("cpu").map(|q| q.0.clone());
            info.memory_capacity = capacity.get("memory").map(|q| q.0.clone());
        }
    }

    info
}

/// Convert a k8s Pod to PodInfo
fn pod_to_info(pod: Pod) -> PodInfo {
    let mut info = PodInfo::new(
        pod.metadata.namespace.unwrap_or_default(),
        pod.metadata.name.unwrap_or_default(),
    );

    if let Some(spec) = &pod.spec {
        info.node_name = spec.node_name.clone();
    }

    if let Some(status) = pod.status {
        info.ip = status.pod_ip;
        info.phase = status
            .phase
            .as_deref()
            .map(PodPhase::from)
            .unwrap_or_default();
    }

    info
}
