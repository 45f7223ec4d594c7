//! Synthetic log chatter for `--demo`

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use klances_k8s::FakeCluster;
use klances_types::PodKey;

const CHATTER_INTERVAL: Duration = Duration::from_millis(700);

const MESSAGES: &[&str] = &[
    "GET /healthz 200",
    "GET /api/v1/items 200",
    "POST /api/v1/orders 201",
    "cache miss, fetching from upstream",
    "reconnecting to upstream after timeout",
    "GET /api/v1/items/42 404",
    "flushed metrics batch",
];

/// Line emitted by `pod` on chatter tick `tick`
fn chatter_line(pod: &PodKey, tick: u64) -> String {
    // Offset by the name so pods do not all say the same thing
    let offset = pod.name.bytes().map(u64::from).sum::<u64>();
    let index = ((tick + offset) % MESSAGES.len() as u64) as usize;
    let latency = 3 + (tick * 7 + offset) % 120;
    format!("{} in {}ms", MESSAGES[index], latency)
}

/// Feed every open stream of the fake cluster until `cancel` fires
pub fn spawn_chatter(cluster: FakeCluster, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHATTER_INTERVAL);
        let mut tick = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let delivered = cluster.broadcast(|pod| chatter_line(pod, tick));
                    tracing::trace!(delivered, "Demo chatter");
                    tick += 1;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatter_varies_per_pod_and_tick() {
        let a = PodKey::new("default", "web");
        let b = PodKey::new("default", "worker");

        assert_ne!(chatter_line(&a, 0), chatter_line(&a, 1));
        assert_ne!(chatter_line(&a, 0), chatter_line(&b, 0));
        assert!(chatter_line(&a, 3).ends_with("ms"));
    }

    #[tokio::test]
    async fn test_chatter_reaches_open_streams() {
        use futures::StreamExt;
        use klances_k8s::ClusterSource;

        let cluster = FakeCluster::demo();
        let pod = PodKey::new("monitoring", "prometheus-0");
        let mut lines = cluster.stream_logs(&pod, None).await.unwrap();

        let cancel = CancellationToken::new();
        let task = spawn_chatter(cluster.clone(), cancel.clone());

        let first = tokio::time::timeout(Duration::from_secs(2), lines.next())
            .await
            .unwrap();
        assert!(matches!(first, Some(Ok(_))));

        cancel.cancel();
        task.await.unwrap();
    }
}
