use crate::{
    cordon::{try_cordon, CordonOutcome},
    disposition::{Disposition, RequeueError},
    error::{self, Result},
    eviction::{evict_node_pods, EvictionPass},
    metrics::DrainerMetrics,
    poller::{DrainCompletionPoller, PollOutcome},
};
use models::node::{ClusterClient, DrainMarker};

use k8s_openapi::api::core::v1::Node;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use snafu::ResultExt;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{event, instrument, Level};

/// Wait this long before cordoning while another Node is unschedulable.
pub const CORDON_POSTPONE_DELAY: Duration = Duration::from_secs(15 * 60);
/// Wait this long before evicting while the cluster has Pending Pods.
pub const PENDING_PODS_DELAY: Duration = Duration::from_secs(30);
/// Wait this long after a disruption budget refused an eviction.
pub const RATE_LIMITED_DELAY: Duration = Duration::from_secs(10);
/// Wait this long after API failures, failed evictions, or Pods that didn't leave in time.
pub const RETRY_DELAY: Duration = Duration::from_secs(60);

/// The NodeDrainer cordons and drains Nodes carrying the drain marker, one Node at a time.
///
/// No state is kept between reconciliations. Every call re-reads the Node, the other Nodes and the Pods from the
/// cluster and works out where the drain stands:
///
/// * not marked: nothing to do.
/// * marked and schedulable: cordon, unless another Node is already unschedulable.
/// * marked and unschedulable: evict the Node's Pods and wait for them to leave.
///
/// A fully drained Node needs no state of its own. Cordoning is a no-op and the eviction pass finds nothing to evict.
pub struct NodeDrainer<T: ClusterClient> {
    client: T,
    marker: DrainMarker,
    poller: DrainCompletionPoller,
    metrics: Arc<DrainerMetrics>,
}

impl<T: ClusterClient> NodeDrainer<T> {
    pub fn new(client: T, marker: DrainMarker, metrics: Arc<DrainerMetrics>) -> Self {
        NodeDrainer {
            client,
            marker,
            poller: DrainCompletionPoller::default(),
            metrics,
        }
    }

    pub fn with_poller(self, poller: DrainCompletionPoller) -> Self {
        NodeDrainer { poller, ..self }
    }

    /// Runs the drain state machine once for the named Node.
    #[instrument(skip(self))]
    pub async fn reconcile_node(&self, node_name: &str) -> Disposition {
        let disposition = self.progress_node(node_name).await;

        match disposition.error() {
            Some(err) => event!(
                Level::ERROR,
                requeue_after = ?disposition.requeue_after(),
                error = %err,
                "Failed to reconcile node."
            ),
            None => event!(
                Level::DEBUG,
                requeue_after = ?disposition.requeue_after(),
                "Reconciled node."
            ),
        }
        self.metrics.record_disposition(disposition.label());

        disposition
    }

    async fn progress_node(&self, node_name: &str) -> Disposition {
        let node = match self.fetch_node(node_name).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                // The Node was deleted; there's nothing left to drain.
                event!(Level::WARN, "Could not find Node");
                return Disposition::Settled;
            }
            Err(err) => return Disposition::Failed(err),
        };

        event!(Level::TRACE, "Reconciling Node");
        if !self.marker.is_marked(&node) {
            return Disposition::Settled;
        }

        match try_cordon(&self.client, node).await {
            Ok(CordonOutcome::AlreadyCordoned(node)) => self.drain(&node.name_any()).await,
            Ok(CordonOutcome::Postponed { .. }) => Disposition::RequeueAfter(CORDON_POSTPONE_DELAY),
            // Cordoning updates the Node, which brings us back here to start evicting.
            Ok(CordonOutcome::Cordoned) => Disposition::Settled,
            Err(err) => Disposition::RequeueAfterWithError(RETRY_DELAY, err),
        }
    }

    async fn fetch_node(&self, node_name: &str) -> Result<Option<Node>> {
        self.client
            .get_node(node_name)
            .await
            .context(error::FetchNodeSnafu { node_name })
    }

    /// Evicts the Pods from a cordoned Node and waits for them to leave.
    async fn drain(&self, node_name: &str) -> Disposition {
        let pass = match evict_node_pods(&self.client, &self.metrics, node_name).await {
            Ok(pass) => pass,
            Err(err) => return Disposition::RequeueAfterWithError(RETRY_DELAY, err),
        };

        let under_eviction = match pass {
            EvictionPass::PendingPods { .. } => {
                return Disposition::RequeueAfter(PENDING_PODS_DELAY)
            }
            EvictionPass::RateLimited(err) => {
                return Disposition::RequeueAfterWithError(RATE_LIMITED_DELAY, err)
            }
            EvictionPass::PartialFailure { failed } => {
                // The next pass retries everything, so this isn't reported as an error.
                event!(
                    Level::WARN,
                    failed = failed.len(),
                    "Some evictions failed, retrying the node later"
                );
                return Disposition::RequeueAfter(RETRY_DELAY);
            }
            EvictionPass::Accepted { under_eviction } => under_eviction,
        };

        match self
            .poller
            .wait_for_departure(&self.client, node_name, &under_eviction)
            .await
        {
            PollOutcome::Departed => Disposition::Settled,
            PollOutcome::TimedOut { remaining } => {
                let remaining: Vec<String> = remaining.iter().map(ToString::to_string).collect();
                event!(
                    Level::ERROR,
                    ?remaining,
                    "Pods remain on node after timeout"
                );
                Disposition::RequeueAfter(RETRY_DELAY)
            }
            PollOutcome::Interrupted { remaining } => {
                let remaining: Vec<String> = remaining.iter().map(ToString::to_string).collect();
                event!(
                    Level::WARN,
                    ?remaining,
                    "Stopped waiting for pods on shutdown"
                );
                Disposition::RequeueAfter(RETRY_DELAY)
            }
        }
    }
}

/// Entry point for `kube::runtime::Controller`: drains the Node the watch delivered.
///
/// The watched object is only used for its name; the state machine reads the live Node itself.
pub async fn reconcile<T: ClusterClient + 'static>(
    node: Arc<Node>,
    drainer: Arc<NodeDrainer<T>>,
) -> std::result::Result<Action, RequeueError> {
    drainer.reconcile_node(&node.name_any()).await.into_action()
}

/// Error policy for `kube::runtime::Controller`: requeue after the delay the state machine chose.
pub fn error_policy<T: ClusterClient>(
    node: Arc<Node>,
    err: &RequeueError,
    _drainer: Arc<NodeDrainer<T>>,
) -> Action {
    event!(
        Level::DEBUG,
        node = %node.name_any(),
        error = %err.source_error(),
        "Requeueing node after error"
    );
    err.action()
}
