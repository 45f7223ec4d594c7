use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use klances_k8s::ClusterSource;
use klances_types::{ClusterError, PodKey};

use crate::backoff::{BackoffConfig, StreamBackoff};
use crate::store::LogStore;

/// Follow one pod's log until `cancel` fires.
///
/// Broken or finished streams are reopened after a backoff delay, resuming at
/// the last server timestamp seen. Lines the server repeats on a resume are
/// dropped, and only a line newer than everything seen resets the backoff, so
/// an exited container is retried at the capped rate instead of replayed.
/// Authentication failures are forwarded to `fatal` and end the task.
pub(crate) async fn follow_pod<S: ClusterSource>(
    source: Arc<S>,
    pod: PodKey,
    logs: LogStore,
    backoff: BackoffConfig,
    fatal: mpsc::UnboundedSender<ClusterError>,
    cancel: CancellationToken,
) {
    let mut backoff = StreamBackoff::new(backoff);
    // Survives a drained stream, so a pod that comes back is not replayed
    let mut resume = logs.resume_point(&pod);

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = source.stream_logs(&pod, resume) => opened,
        };

        match opened {
            Ok(mut lines) => {
                tracing::debug!(pod = %pod, ?resume, "Log stream opened");

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        next = lines.next() => next,
                    };

                    match next {
                        Some(Ok(line)) => {
                            if is_replayed(line.timestamp, resume) {
                                tracing::trace!(pod = %pod, "Dropping replayed log line");
                                continue;
                            }
                            if let Some(stamp) = line.timestamp {
                                resume = Some(stamp);
                                logs.set_resume_point(&pod, stamp);
                            }
                            backoff.reset();
                            logs.append(&pod, line.text);
                        }
                        Some(Err(err)) if err.is_fatal() => {
                            tracing::error!(pod = %pod, error = %err, "Log stream lost its credentials");
                            let _ = fatal.send(err);
                            return;
                        }
                        Some(Err(err)) => {
                            tracing::warn!(pod = %pod, error = %err, "Log stream broke");
                            logs.record_fault(&pod, &err);
                            break;
                        }
                        None => {
                            tracing::debug!(pod = %pod, "Log stream ended");
                            logs.record_fault(
                                &pod,
                                &ClusterError::Stream("log stream ended".to_string()),
                            );
                            break;
                        }
                    }
                }
            }
            Err(err) if err.is_fatal() => {
                tracing::error!(pod = %pod, error = %err, "Cannot open log stream");
                let _ = fatal.send(err);
                return;
            }
            Err(err) => {
                tracing::warn!(pod = %pod, error = %err, "Cannot open log stream");
                logs.record_fault(&pod, &err);
            }
        }

        let delay = backoff.next_delay();
        tracing::debug!(pod = %pod, ?delay, "Reopening log stream after backoff");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Whether a line stamped `stamp` was already delivered before `resume`
fn is_replayed(stamp: Option<DateTime<Utc>>, resume: Option<DateTime<Utc>>) -> bool {
    stamp.zip(resume).is_some_and(|(stamp, last)| stamp <= last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_replay_detection() {
        let last = Utc::now();
        assert!(is_replayed(Some(last), Some(last)));
        assert!(is_replayed(Some(last - TimeDelta::seconds(1)), Some(last)));
        assert!(!is_replayed(Some(last + TimeDelta::microseconds(1)), Some(last)));

        // Nothing to compare against
        assert!(!is_replayed(None, Some(last)));
        assert!(!is_replayed(Some(last), None));
    }
}
