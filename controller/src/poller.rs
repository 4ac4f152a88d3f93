//! Waits for evicted Pods to actually leave the Node.
//!
//! An accepted eviction only authorizes the Pod's termination; the Pod object disappears some time later. We poll
//! until every Pod is gone or bound elsewhere, blocking the reconciliation for at most `timeout`. A shutdown
//! signal ends the wait early with the last complete check as the remaining set.
use models::node::{pod_node_name, ClusterClient, PodRef};

use tokio::sync::watch;
use tokio::time::{sleep, timeout, Duration};
use tracing::{event, instrument, Level};

/// Time between two checks of the evicted Pods.
pub const DELETION_CHECK_INTERVAL: Duration = Duration::from_secs(10);
/// Total time to wait for the evicted Pods to leave the Node.
pub const DELETION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Every Pod has left the Node.
    Departed,
    /// The timeout elapsed. These Pods were still on the Node at the last complete check.
    TimedOut { remaining: Vec<PodRef> },
    /// Shutdown was requested. These Pods were still on the Node at the last complete check.
    Interrupted { remaining: Vec<PodRef> },
}

/// Polls the given Pods, checking immediately and then every `interval`, until none remain on the Node.
#[derive(Debug, Clone)]
pub struct DrainCompletionPoller {
    interval: Duration,
    timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Default for DrainCompletionPoller {
    fn default() -> Self {
        Self::new(DELETION_CHECK_INTERVAL, DELETION_TIMEOUT)
    }
}

impl DrainCompletionPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        // Without a shutdown channel the sender is dropped here and the wait is never interrupted.
        let (_, shutdown) = watch::channel(false);
        DrainCompletionPoller {
            interval,
            timeout,
            shutdown,
        }
    }

    /// Interrupts waits once `true` is sent on the channel.
    pub fn with_shutdown(self, shutdown: watch::Receiver<bool>) -> Self {
        DrainCompletionPoller { shutdown, ..self }
    }

    #[instrument(skip(self, client, pods), fields(pods = pods.len()))]
    pub async fn wait_for_departure<T: ClusterClient>(
        &self,
        client: &T,
        node_name: &str,
        pods: &[PodRef],
    ) -> PollOutcome {
        let mut remaining = pods.to_vec();
        let mut shutdown = self.shutdown.clone();

        let polled = timeout(self.timeout, async {
            loop {
                remaining = remaining_pods(client, node_name, pods).await;
                if remaining.is_empty() {
                    return true;
                }
                event!(
                    Level::DEBUG,
                    remaining = remaining.len(),
                    "Pods not yet gone. Waiting {}s.",
                    self.interval.as_secs_f64()
                );
                tokio::select! {
                    _ = sleep(self.interval) => {}
                    _ = shutdown_requested(&mut shutdown) => return false,
                }
            }
        })
        .await;

        match polled {
            Ok(true) => PollOutcome::Departed,
            Ok(false) => {
                event!(Level::INFO, "Shutdown requested, no longer waiting for pods.");
                PollOutcome::Interrupted { remaining }
            }
            Err(_elapsed) => PollOutcome::TimedOut { remaining },
        }
    }
}

/// Resolves once `true` has been sent on the channel. Never resolves if the sender is dropped first.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Re-fetches each Pod and returns those still bound to the Node.
///
/// A Pod that can't be fetched is logged and counted as remaining.
async fn remaining_pods<T: ClusterClient>(
    client: &T,
    node_name: &str,
    pods: &[PodRef],
) -> Vec<PodRef> {
    let mut remaining = Vec::with_capacity(pods.len());
    for pod in pods {
        match client.get_pod(pod).await {
            Ok(None) => {
                event!(Level::INFO, %pod, "Pod deleted.");
            }
            Ok(Some(live)) if pod_node_name(&live) != Some(node_name) => {
                event!(Level::INFO, %pod, "Pod has moved to another node.");
            }
            Ok(Some(_)) => remaining.push(pod.clone()),
            Err(err) => {
                event!(Level::ERROR, %pod, error = %err, "Unable to retrieve pod");
                remaining.push(pod.clone());
            }
        }
    }
    remaining
}
