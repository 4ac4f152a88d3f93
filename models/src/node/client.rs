use super::{
    error::{self, EvictionError, Result},
    PodRef,
};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, EvictParams, ListParams, PostParams};
use kube::ResourceExt;
use snafu::ResultExt;
use std::sync::Arc;
use tracing::instrument;

#[cfg(feature = "mockall")]
use mockall::mock;

// HTTP status codes the eviction subresource uses to classify its answers.
const STATUS_NOT_FOUND: u16 = 404;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

#[async_trait]
/// A trait providing the reads and writes the drain controller performs against the cluster. This is provided
/// as a trait in order to allow mocks and in-memory fakes to be used for testing purposes.
pub trait ClusterClient: Clone + Sized + Send + Sync {
    /// Fetch a Node by name, returning `None` if it does not exist.
    async fn get_node(&self, node_name: &str) -> Result<Option<Node>>;
    /// List every Node in the cluster.
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    /// Overwrite a Node with the given object. The object's resourceVersion guards against lost updates.
    async fn update_node(&self, node: &Node) -> Result<()>;
    /// List every Pod in the cluster, across all namespaces.
    async fn list_pods(&self) -> Result<Vec<Pod>>;
    /// Fetch a Pod, returning `None` if it does not exist.
    async fn get_pod(&self, pod: &PodRef) -> Result<Option<Pod>>;
    /// Ask the API server to evict a Pod, respecting PodDisruptionBudgets.
    async fn evict_pod(
        &self,
        pod: &PodRef,
        grace_period_seconds: u32,
    ) -> std::result::Result<(), EvictionError>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock ClusterClient for use in tests.
    pub ClusterClient {}
    #[async_trait]
    impl ClusterClient for ClusterClient {
        async fn get_node(&self, node_name: &str) -> Result<Option<Node>>;
        async fn list_nodes(&self) -> Result<Vec<Node>>;
        async fn update_node(&self, node: &Node) -> Result<()>;
        async fn list_pods(&self) -> Result<Vec<Pod>>;
        async fn get_pod(&self, pod: &PodRef) -> Result<Option<Pod>>;
        async fn evict_pod(
            &self,
            pod: &PodRef,
            grace_period_seconds: u32,
        ) -> std::result::Result<(), EvictionError>;
    }

    impl Clone for ClusterClient {
        fn clone(&self) -> Self;
    }
}

#[async_trait]
impl<T> ClusterClient for Arc<T>
where
    T: ClusterClient,
{
    async fn get_node(&self, node_name: &str) -> Result<Option<Node>> {
        (**self).get_node(node_name).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        (**self).list_nodes().await
    }

    async fn update_node(&self, node: &Node) -> Result<()> {
        (**self).update_node(node).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        (**self).list_pods().await
    }

    async fn get_pod(&self, pod: &PodRef) -> Result<Option<Pod>> {
        (**self).get_pod(pod).await
    }

    async fn evict_pod(
        &self,
        pod: &PodRef,
        grace_period_seconds: u32,
    ) -> std::result::Result<(), EvictionError> {
        (**self).evict_pod(pod, grace_period_seconds).await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `ClusterClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SClusterClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterClient { k8s_client }
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.k8s_client.clone())
    }

    /// Creates a kube::Api<Pod> for the namespace the given Pod lives in.
    fn namespaced_pods(&self, pod: &PodRef) -> Api<Pod> {
        Api::namespaced(self.k8s_client.clone(), &pod.namespace)
    }
}

fn boxed(err: kube::Error) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(err)
}

#[async_trait]
impl ClusterClient for K8SClusterClient {
    #[instrument(skip(self), err)]
    async fn get_node(&self, node_name: &str) -> Result<Option<Node>> {
        self.nodes()
            .get_opt(node_name)
            .await
            .map_err(boxed)
            .context(error::GetNodeSnafu { node_name })
    }

    #[instrument(skip(self), err)]
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self
            .nodes()
            .list(&ListParams::default())
            .await
            .map_err(boxed)
            .context(error::ListNodesSnafu)?;
        Ok(nodes.items)
    }

    #[instrument(skip(self, node), fields(node = %node.name_any()), err)]
    async fn update_node(&self, node: &Node) -> Result<()> {
        let node_name = node.name_any();
        self.nodes()
            .replace(&node_name, &PostParams::default(), node)
            .await
            .map_err(boxed)
            .context(error::UpdateNodeSnafu {
                node_name: node_name.clone(),
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::all(self.k8s_client.clone());
        let pods = pods
            .list(&ListParams::default())
            .await
            .map_err(boxed)
            .context(error::ListPodsSnafu)?;
        Ok(pods.items)
    }

    #[instrument(skip(self), fields(pod = %pod), err)]
    async fn get_pod(&self, pod: &PodRef) -> Result<Option<Pod>> {
        self.namespaced_pods(pod)
            .get_opt(&pod.name)
            .await
            .map_err(boxed)
            .context(error::GetPodSnafu { pod: pod.clone() })
    }

    /// When evicting a Pod, a 429 (TOO_MANY_REQUESTS) response code is used to indicate that we must wait
    /// to allow a PodDisruptionBudget (PDB) to be satisfied. A 404 means the Pod is already gone.
    #[instrument(skip(self), fields(pod = %pod))]
    async fn evict_pod(
        &self,
        pod: &PodRef,
        grace_period_seconds: u32,
    ) -> std::result::Result<(), EvictionError> {
        let evict_params = EvictParams {
            delete_options: Some(DeleteParams {
                grace_period_seconds: Some(grace_period_seconds),
                ..Default::default()
            }),
            ..Default::default()
        };

        match self.namespaced_pods(pod).evict(&pod.name, &evict_params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == STATUS_NOT_FOUND => {
                error::PodNotFoundSnafu { pod: pod.clone() }.fail()
            }
            Err(kube::Error::Api(e)) if e.code == STATUS_TOO_MANY_REQUESTS => {
                Err(EvictionError::TooManyRequests {
                    source: boxed(kube::Error::Api(e)),
                    pod: pod.clone(),
                })
            }
            Err(e) => Err(EvictionError::EvictionRejected {
                source: boxed(e),
                pod: pod.clone(),
            }),
        }
    }
}
