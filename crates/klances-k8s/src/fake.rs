//! In-memory cluster used by tests and by the demo mode

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use klances_types::{ClusterError, NamespaceInfo, NamespacePhase, NodeInfo, PodInfo, PodKey, PodPhase};

use crate::source::{ClusterSource, LogLineStream, StreamedLine, receiver_stream};

type LineSender = mpsc::UnboundedSender<Result<StreamedLine, ClusterError>>;

/// Lines of a pod log kept for replay, like the kubelet's log file
const HISTORY_LINES: usize = 100;

#[derive(Default)]
struct FakeState {
    nodes: Option<Result<Vec<NodeInfo>, ClusterError>>,
    namespaces: Option<Result<Vec<NamespaceInfo>, ClusterError>>,
    pods: Option<Result<Vec<PodInfo>, ClusterError>>,

    /// When set, `list_nodes` waits for a notification before answering
    nodes_gate: Option<Arc<Notify>>,

    /// Live log streams per pod
    feeds: HashMap<PodKey, Vec<LineSender>>,

    /// Recent lines per pod, replayed to every new stream
    history: HashMap<PodKey, VecDeque<StreamedLine>>,

    /// Pods whose container exited: streams replay the history and end
    finished: HashSet<PodKey>,

    /// Number of `stream_logs` calls per pod, failed ones included
    opens: HashMap<PodKey, u32>,

    /// Errors returned by the next `stream_logs` calls, in order
    open_failures: HashMap<PodKey, VecDeque<ClusterError>>,

    /// Last server timestamp handed out, keeps stamps strictly increasing
    last_stamp: Option<DateTime<Utc>>,
}

impl FakeState {
    /// Stamp a line, record it in the pod's history and send it to open streams
    fn write(&mut self, pod: &PodKey, text: &str) -> usize {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        let line = StreamedLine::new(Some(stamp), text);

        let history = self.history.entry(pod.clone()).or_default();
        if history.len() == HISTORY_LINES {
            history.pop_front();
        }
        history.push_back(line.clone());

        let Some(feeds) = self.feeds.get_mut(pod) else {
            return 0;
        };
        feeds.retain(|tx| tx.send(Ok(line.clone())).is_ok());
        feeds.len()
    }
}

/// Scriptable [`ClusterSource`] holding everything in memory
#[derive(Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small cluster with a few pods spread over three namespaces
    pub fn demo() -> Self {
        let cluster = Self::new();

        let mut n1 = NodeInfo::new("node-1");
        n1.address = Some("10.0.0.11".to_string());
        n1.cpu_capacity = Some("8".to_string());
        n1.memory_capacity = Some("32Gi".to_string());
        let mut n2 = NodeInfo::new("node-2");
        n2.address = Some("10.0.0.12".to_string());
        n2.cpu_capacity = Some("4".to_string());
        n2.memory_capacity = Some("16Gi".to_string());
        cluster.set_nodes(vec![n1, n2]);

        cluster.set_namespaces(vec![
            NamespaceInfo::new("default", NamespacePhase::Active),
            NamespaceInfo::new("kube-system", NamespacePhase::Active),
            NamespaceInfo::new("monitoring", NamespacePhase::Active),
        ]);

        let pods = [
            ("default", "web-7d9f8b-x2k4q", "node-1", "10.244.1.5"),
            ("default", "worker-5c6d7-j8m2n", "node-2", "10.244.2.9"),
            ("kube-system", "coredns-6f6b679f8f-4wq8r", "node-1", "10.244.1.2"),
            ("kube-system", "etcd-node-1", "node-1", "10.0.0.11"),
            ("monitoring", "prometheus-0", "node-2", "10.244.2.3"),
        ]
        .into_iter()
        .map(|(namespace, name, node, ip)| {
            let mut pod = PodInfo::new(namespace, name);
            pod.phase = PodPhase::Running;
            pod.node_name = Some(node.to_string());
            pod.ip = Some(ip.to_string());
            pod
        })
        .collect();
        cluster.set_pods(pods);

        cluster
    }

    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        self.inner.lock().nodes = Some(Ok(nodes));
    }

    pub fn set_namespaces(&self, namespaces: Vec<NamespaceInfo>) {
        self.inner.lock().namespaces = Some(Ok(namespaces));
    }

    pub fn set_pods(&self, pods: Vec<PodInfo>) {
        self.inner.lock().pods = Some(Ok(pods));
    }

    /// Make every following `list_nodes` fail until `set_nodes` is called
    pub fn fail_nodes(&self, err: ClusterError) {
        self.inner.lock().nodes = Some(Err(err));
    }

    pub fn fail_namespaces(&self, err: ClusterError) {
        self.inner.lock().namespaces = Some(Err(err));
    }

    pub fn fail_pods(&self, err: ClusterError) {
        self.inner.lock().pods = Some(Err(err));
    }

    /// Hold `list_nodes` calls until the returned handle is notified
    pub fn gate_nodes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().nodes_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Make the next `stream_logs` call for `pod` fail with `err`
    pub fn fail_next_open(&self, pod: &PodKey, err: ClusterError) {
        self.inner
            .lock()
            .open_failures
            .entry(pod.clone())
            .or_default()
            .push_back(err);
    }

    /// Send a line to every open stream of `pod`, returning how many received it.
    /// The line is also kept in the pod's history.
    pub fn emit_line(&self, pod: &PodKey, line: &str) -> usize {
        self.inner.lock().write(pod, line)
    }

    /// Mark the container of `pod` as exited after writing `lines`.
    ///
    /// Open streams end, and every later open replays the history from its
    /// resume point before ending again.
    pub fn finish_log(&self, pod: &PodKey, lines: &[&str]) {
        let mut state = self.inner.lock();
        for line in lines {
            state.write(pod, line);
        }
        state.finished.insert(pod.clone());
        state.feeds.remove(pod);
    }

    /// Send a generated line to every open stream of every pod
    pub fn broadcast<F>(&self, mut line: F) -> usize
    where
        F: FnMut(&PodKey) -> String,
    {
        let mut state = self.inner.lock();
        let pods: Vec<PodKey> = state.feeds.keys().cloned().collect();
        pods.iter().map(|pod| state.write(pod, &line(pod))).sum()
    }

    /// Fail every open stream of `pod` with `err` and close them
    pub fn break_streams(&self, pod: &PodKey, err: ClusterError) {
        if let Some(feeds) = self.inner.lock().feeds.remove(pod) {
            for tx in feeds {
                let _ = tx.send(Err(err.clone()));
            }
        }
    }

    /// Number of `stream_logs` calls made for `pod`
    pub fn stream_opens(&self, pod: &PodKey) -> u32 {
        self.inner.lock().opens.get(pod).copied().unwrap_or(0)
    }

    /// Number of streams of `pod` whose consumer is still alive
    pub fn open_streams(&self, pod: &PodKey) -> usize {
        let mut state = self.inner.lock();
        let Some(feeds) = state.feeds.get_mut(pod) else {
            return 0;
        };
        feeds.retain(|tx| !tx.is_closed());
        feeds.len()
    }
}

impl ClusterSource for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        let gate = self.inner.lock().nodes_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.lock().nodes.clone().unwrap_or(Ok(Vec::new()))
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, ClusterError> {
        self.inner.lock().namespaces.clone().unwrap_or(Ok(Vec::new()))
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<PodInfo>, ClusterError> {
        let pods = self.inner.lock().pods.clone().unwrap_or(Ok(Vec::new()))?;
        Ok(match namespace {
            Some(ns) => pods.into_iter().filter(|p| p.namespace == ns).collect(),
            None => pods,
        })
    }

    async fn stream_logs(
        &self,
        pod: &PodKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<LogLineStream, ClusterError> {
        let mut state = self.inner.lock();
        *state.opens.entry(pod.clone()).or_default() += 1;

        if let Some(err) = state
            .open_failures
            .get_mut(pod)
            .and_then(|failures| failures.pop_front())
        {
            return Err(err);
        }

        // The server resumes at `since` inclusive, so the last line seen comes back
        let replay: Vec<Result<StreamedLine, ClusterError>> = state
            .history
            .get(pod)
            .into_iter()
            .flatten()
            .filter(|line| match (since, line.timestamp) {
                (Some(since), Some(stamp)) => stamp >= since,
                _ => true,
            })
            .cloned()
            .map(Ok)
            .collect();

        if state.finished.contains(pod) {
            return Ok(stream::iter(replay).boxed());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.feeds.entry(pod.clone()).or_default().push(tx);
        Ok(stream::iter(replay).chain(receiver_stream(rx)).boxed())
    }
}
