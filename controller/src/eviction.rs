//! Issues evictions for every drainable Pod bound to a cordoned Node.
//!
//! Evictions respect PodDisruptionBudgets: the API server answers 429 (TOO_MANY_REQUESTS) when a budget would be
//! violated. That answer stops the whole pass, since every further request is likely to be refused as well. Any other
//! failure is recorded and the remaining Pods are still attempted.
use crate::error::{self, Result};
use crate::metrics::{DrainerMetrics, EvictionOutcome};
use models::constants::EVICTION_GRACE_PERIOD_SECONDS;
use models::node::{
    is_daemonset_pod, is_pod_pending, pod_node_name, ClusterClient, EvictionError, PodRef,
};

use k8s_openapi::api::core::v1::Pod;
use snafu::{IntoError, ResultExt};
use tracing::{event, instrument, Level};

#[derive(Debug)]
pub enum EvictionPass {
    /// Some Pod in the cluster could not be scheduled yet; nothing was evicted.
    PendingPods { pending_pod: PodRef },
    /// An eviction was refused by a disruption budget; the remaining Pods were skipped.
    RateLimited(error::Error),
    /// At least one eviction failed for another reason. The rest of the Pods were still attempted.
    PartialFailure { failed: Vec<PodRef> },
    /// Every eviction was accepted (or found its Pod already gone). These Pods are now terminating.
    Accepted { under_eviction: Vec<PodRef> },
}

/// Runs one eviction pass against the named Node.
#[instrument(skip(client, metrics), err)]
pub async fn evict_node_pods<T: ClusterClient>(
    client: &T,
    metrics: &DrainerMetrics,
    node_name: &str,
) -> Result<EvictionPass> {
    let pods = client.list_pods().await.context(error::ListPodsSnafu)?;

    // Don't add to the scheduling pressure while the cluster already has work it cannot place.
    if let Some(pending_pod) = pods.iter().find(|pod| is_pod_pending(pod)) {
        let pending_pod = PodRef::from(pending_pod);
        event!(
            Level::DEBUG,
            %pending_pod,
            "Found pending pod, postponing evictions on node"
        );
        return Ok(EvictionPass::PendingPods { pending_pod });
    }

    let mut under_eviction = Vec::new();
    let mut failed = Vec::new();
    for pod in target_pods(&pods, node_name) {
        event!(Level::INFO, %pod, "Evicting pod from node");
        match client.evict_pod(&pod, EVICTION_GRACE_PERIOD_SECONDS).await {
            Ok(()) => {
                metrics.record_eviction(EvictionOutcome::Accepted);
                under_eviction.push(pod);
            }
            Err(EvictionError::PodNotFound { .. }) => {
                metrics.record_eviction(EvictionOutcome::NotFound);
                event!(Level::DEBUG, %pod, "Pod already gone");
            }
            Err(err @ EvictionError::TooManyRequests { .. }) => {
                metrics.record_eviction(EvictionOutcome::RateLimited);
                event!(
                    Level::WARN,
                    %pod,
                    "Eviction refused, likely to respect a PodDisruptionBudget. Abandoning this pass."
                );
                return Ok(EvictionPass::RateLimited(
                    error::EvictionRateLimitedSnafu.into_error(err),
                ));
            }
            Err(err) => {
                metrics.record_eviction(EvictionOutcome::Failed);
                event!(Level::ERROR, %pod, error = %err, "Unable to evict pod");
                failed.push(pod);
            }
        }
    }

    if failed.is_empty() {
        Ok(EvictionPass::Accepted { under_eviction })
    } else {
        Ok(EvictionPass::PartialFailure { failed })
    }
}

/// The Pods bound to the Node which we attempt to evict, in list order.
///
/// DaemonSet Pods are skipped: the DaemonSet controller ignores cordons and would recreate them in place.
fn target_pods<'a>(pods: &'a [Pod], node_name: &'a str) -> impl Iterator<Item = PodRef> + 'a {
    pods.iter()
        .filter(move |pod| pod_node_name(pod) == Some(node_name))
        .filter(|pod| {
            if is_daemonset_pod(pod) {
                event!(
                    Level::DEBUG,
                    pod = %PodRef::from(*pod),
                    "Not draining pod: pod is member of a DaemonSet"
                );
                return false;
            }
            true
        })
        .map(PodRef::from)
}
