use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use klances_types::{ClusterError, LogLine, PodKey};

use crate::buffer::LogBuffer;

/// Last problem seen on a pod's log stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFault {
    pub error: String,

    /// Failures since the last received line
    pub retries: u32,
}

/// All pod log buffers, shared between the stream tasks and the renderer.
///
/// Buffers are created on the first line received for a pod and dropped
/// with [`LogStore::release`].
#[derive(Clone)]
pub struct LogStore {
    buffers: Arc<RwLock<HashMap<PodKey, LogBuffer>>>,
    faults: Arc<RwLock<HashMap<PodKey, StreamFault>>>,

    /// Server timestamp of the newest line per pod, where streams resume
    resume_points: Arc<RwLock<HashMap<PodKey, DateTime<Utc>>>>,
    capacity: usize,
    generation: Arc<AtomicU64>,
}

impl LogStore {
    /// Create a store whose buffers keep `capacity` lines each
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Arc::new(RwLock::new(HashMap::new())),
            faults: Arc::new(RwLock::new(HashMap::new())),
            resume_points: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append a line to the pod's buffer, creating the buffer if needed
    pub fn append(&self, pod: &PodKey, text: impl Into<String>) {
        let existing = self.buffers.read().get(pod).cloned();
        let buffer = match existing {
            Some(buffer) => buffer,
            None => {
                tracing::debug!(pod = %pod, "Creating log buffer");
                self.buffers
                    .write()
                    .entry(pod.clone())
                    .or_insert_with(|| LogBuffer::new(self.capacity))
                    .clone()
            }
        };
        buffer.push(LogLine::new(text));

        // A received line means the stream is healthy again
        if self.faults.read().contains_key(pod) {
            self.faults.write().remove(pod);
        }
        self.bump();
    }

    /// Remember a stream failure so it can be shown next to the logs
    pub fn record_fault(&self, pod: &PodKey, err: &ClusterError) {
        let mut faults = self.faults.write();
        let fault = faults.entry(pod.clone()).or_insert_with(|| StreamFault {
            error: String::new(),
            retries: 0,
        });
        fault.error = err.to_string();
        fault.retries += 1;
        drop(faults);
        self.bump();
    }

    /// Where a reopened stream of `pod` should resume, if any line was stamped
    pub fn resume_point(&self, pod: &PodKey) -> Option<DateTime<Utc>> {
        self.resume_points.read().get(pod).copied()
    }

    pub fn set_resume_point(&self, pod: &PodKey, at: DateTime<Utc>) {
        self.resume_points.write().insert(pod.clone(), at);
    }

    /// Drop the pod's buffer, fault and resume point, returning whether a
    /// buffer or fault was held
    pub fn release(&self, pod: &PodKey) -> bool {
        self.resume_points.write().remove(pod);
        let had_buffer = self.buffers.write().remove(pod).is_some();
        let had_fault = self.faults.write().remove(pod).is_some();
        if had_buffer || had_fault {
            tracing::debug!(pod = %pod, "Released log buffer");
            self.bump();
        }
        had_buffer || had_fault
    }

    pub fn buffer(&self, pod: &PodKey) -> Option<LogBuffer> {
        self.buffers.read().get(pod).cloned()
    }

    pub fn fault(&self, pod: &PodKey) -> Option<StreamFault> {
        self.faults.read().get(pod).cloned()
    }

    /// The last `lines` lines of every listed pod that has a buffer
    pub fn window<'a, I>(&self, pods: I, lines: usize) -> BTreeMap<PodKey, Vec<LogLine>>
    where
        I: IntoIterator<Item = &'a PodKey>,
    {
        let buffers = self.buffers.read();
        pods.into_iter()
            .filter_map(|pod| {
                buffers
                    .get(pod)
                    .map(|buffer| (pod.clone(), buffer.tail(lines)))
            })
            .collect()
    }

    /// Faults of the listed pods
    pub fn faults<'a, I>(&self, pods: I) -> BTreeMap<PodKey, StreamFault>
    where
        I: IntoIterator<Item = &'a PodKey>,
    {
        let faults = self.faults.read();
        pods.into_iter()
            .filter_map(|pod| faults.get(pod).map(|f| (pod.clone(), f.clone())))
            .collect()
    }

    /// Number of pods with a buffer
    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.read().is_empty()
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

    #[test]
    fn test_buffer_created_on_first_line() {
        let store = LogStore::new(10);
        let pod = PodKey::new("default", "web");
        assert!(store.buffer(&pod).is_none());

        store.append(&pod, "ready");
        assert_eq!(store.buffer(&pod).map(|b| b.len()), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_line_clears_fault() {
        let store = LogStore::new(10);
        let pod = PodKey::new("default", "web");

        store.record_fault(&pod, &ClusterError::Stream("reset".into()));
        store.record_fault(&pod, &ClusterError::Stream("reset again".into()));
        let fault = store.fault(&pod).unwrap();
        assert_eq!(fault.retries, 2);
        assert!(fault.error.contains("reset again"));

        store.append(&pod, "back");
        assert!(store.fault(&pod).is_none());
    }

    #[test]
    fn test_window_only_requested_pods() {
        let store = LogStore::new(10);
        let a = PodKey::new("ns-a", "a");
        let b = PodKey::new("ns-b", "b");
        let silent = PodKey::new("ns-a", "silent");
        for i in 0..5 {
            store.append(&a, format!("a{}", i));
            store.append(&b, format!("b{}", i));
        }

        let window = store.window([&a, &silent], 2);
        assert_eq!(window.len(), 1);
        let texts: Vec<&str> = window[&a].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a3", "a4"]);
    }

    #[test]
    fn test_release_and_generation() {
        let store = LogStore::new(10);
        let pod = PodKey::new("default", "web");
        let start = store.generation();

        store.append(&pod, "x");
        assert!(store.release(&pod));
        assert!(!store.release(&pod));
        assert!(store.buffer(&pod).is_none());
        assert_eq!(store.generation(), start + 2);
    }

    #[test]
    fn test_resume_point_dropped_on_release() {
        let store = LogStore::new(10);
        let pod = PodKey::new("default", "web");
        assert!(store.resume_point(&pod).is_none());

        let at = Utc::now();
        store.append(&pod, "x");
        store.set_resume_point(&pod, at);
        assert_eq!(store.resume_point(&pod), Some(at));

        store.release(&pod);
        assert!(store.resume_point(&pod).is_none());
    }
}
