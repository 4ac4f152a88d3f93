//! Cordoning, gated on no other Node being unschedulable.
//!
//! The gate is a read of every Node followed by a write of this one. There is no lock between the two, so two
//! Nodes reconciled at the same moment can both observe an empty cluster and both be cordoned. The write replaces
//! the whole Node object, which at least turns a concurrent change to *this* Node into a conflict error.
use crate::error::{self, Result};
use models::node::{is_schedulable, set_unschedulable, ClusterClient};

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

#[derive(Debug)]
pub enum CordonOutcome {
    /// The Node was unschedulable before we looked at it; it is ready for evictions.
    AlreadyCordoned(Node),
    /// Another Node is unschedulable, so this one must wait its turn.
    Postponed { cordoned_node: String },
    /// We marked the Node unschedulable.
    Cordoned,
}

/// Attempts to make the Node unschedulable while keeping at most one unschedulable Node in the cluster.
#[instrument(skip(client, node), fields(node = %node.name_any()), err)]
pub async fn try_cordon<T: ClusterClient>(client: &T, mut node: Node) -> Result<CordonOutcome> {
    if !is_schedulable(&node) {
        return Ok(CordonOutcome::AlreadyCordoned(node));
    }

    let node_name = node.name_any();
    let nodes = client
        .list_nodes()
        .await
        .context(error::FindCordonedNodesSnafu)?;

    if let Some(cordoned) = nodes
        .iter()
        .find(|other| other.name_any() != node_name && !is_schedulable(other))
    {
        let cordoned_node = cordoned.name_any();
        event!(
            Level::INFO,
            %cordoned_node,
            "Have other cordoned nodes, will postpone cordoning this one"
        );
        return Ok(CordonOutcome::Postponed { cordoned_node });
    }

    event!(Level::INFO, "Cordoning node");
    set_unschedulable(&mut node);
    client
        .update_node(&node)
        .await
        .context(error::CordonNodeSnafu { node_name })?;

    Ok(CordonOutcome::Cordoned)
}
