//! Fixtures and an in-memory cluster for exercising the drain state machine across several reconciliations.
use models::constants::{DAEMONSET_KIND, DEFAULT_DRAIN_MARKER, POD_PHASE_PENDING};
use models::node::{ClusterClient, ClusterClientError, EvictionError, PodRef, Result};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeSpec, Pod, PodSpec, PodStatus, Taint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

pub(crate) fn test_node(name: &str, schedulable: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            taints: Some(vec![]),
            unschedulable: Some(!schedulable),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A Node carrying the default drain taint.
pub(crate) fn marked_node(name: &str, schedulable: bool) -> Node {
    marked_node_with(name, schedulable, DEFAULT_DRAIN_MARKER)
}

/// A Node carrying a `NoSchedule` taint with the given key.
pub(crate) fn marked_node_with(name: &str, schedulable: bool, taint_key: &str) -> Node {
    let mut node = test_node(name, schedulable);
    if let Some(spec) = node.spec.as_mut() {
        spec.taints = Some(vec![Taint {
            key: taint_key.to_string(),
            effect: "NoSchedule".to_string(),
            value: Some("yes".to_string()),
            ..Default::default()
        }]);
    }
    node
}

/// A running Pod owned by a ReplicaSet.
pub(crate) fn test_pod(namespace: &str, name: &str, node_name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![owner("ReplicaSet")]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node_name.to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        }),
    }
}

pub(crate) fn pending_pod(namespace: &str, name: &str, node_name: &str) -> Pod {
    let mut pod = test_pod(namespace, name, node_name);
    pod.status = Some(PodStatus {
        phase: Some(POD_PHASE_PENDING.to_string()),
        ..Default::default()
    });
    pod
}

pub(crate) fn daemonset_pod(namespace: &str, name: &str, node_name: &str) -> Pod {
    let mut pod = test_pod(namespace, name, node_name);
    pod.metadata.owner_references = Some(vec![owner(DAEMONSET_KIND)]);
    pod
}

fn owner(kind: &str) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: "owner".to_string(),
        controller: Some(true),
        ..Default::default()
    }
}

/// How the fake eviction endpoint answers the next eviction request.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ScriptedEviction {
    /// Accept the eviction and delete the Pod right away.
    AcceptAndDelete,
    /// Accept the eviction but leave the Pod running.
    AcceptAndKeep,
    NotFound,
    TooManyRequests,
    Fail,
}

#[derive(Default)]
struct ClusterState {
    nodes: BTreeMap<String, Node>,
    pods: BTreeMap<PodRef, Pod>,
    script: VecDeque<ScriptedEviction>,
    evictions: Vec<PodRef>,
    node_updates: usize,
}

/// A cluster held in memory. Evictions follow the script and fall back to accepting and deleting the Pod.
#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub(crate) fn new(nodes: Vec<Node>, pods: Vec<Pod>) -> Self {
        let state = ClusterState {
            nodes: nodes
                .into_iter()
                .map(|node| (node.name_any(), node))
                .collect(),
            pods: pods.into_iter().map(|pod| (PodRef::from(&pod), pod)).collect(),
            ..Default::default()
        };
        FakeCluster {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn script_evictions(&self, script: Vec<ScriptedEviction>) {
        self.state.lock().unwrap().script.extend(script);
    }

    pub(crate) fn node(&self, name: &str) -> Option<Node> {
        self.state.lock().unwrap().nodes.get(name).cloned()
    }

    pub(crate) fn pod(&self, pod: &PodRef) -> Option<Pod> {
        self.state.lock().unwrap().pods.get(pod).cloned()
    }

    /// Every eviction request received, in order, whatever its answer.
    pub(crate) fn evictions(&self) -> Vec<PodRef> {
        self.state.lock().unwrap().evictions.clone()
    }

    pub(crate) fn node_updates(&self) -> usize {
        self.state.lock().unwrap().node_updates
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_node(&self, node_name: &str) -> Result<Option<Node>> {
        Ok(self.node(node_name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state.lock().unwrap().nodes.values().cloned().collect())
    }

    async fn update_node(&self, node: &Node) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let node_name = node.name_any();
        if !state.nodes.contains_key(&node_name) {
            return Err(ClusterClientError::UpdateNode {
                source: "not found".into(),
                node_name,
            });
        }
        state.node_updates += 1;
        state.nodes.insert(node_name, node.clone());
        Ok(())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        Ok(self.state.lock().unwrap().pods.values().cloned().collect())
    }

    async fn get_pod(&self, pod: &PodRef) -> Result<Option<Pod>> {
        Ok(self.pod(pod))
    }

    async fn evict_pod(
        &self,
        pod: &PodRef,
        _grace_period_seconds: u32,
    ) -> std::result::Result<(), EvictionError> {
        let mut state = self.state.lock().unwrap();
        state.evictions.push(pod.clone());
        let answer = state
            .script
            .pop_front()
            .unwrap_or(ScriptedEviction::AcceptAndDelete);

        match answer {
            ScriptedEviction::AcceptAndDelete => {
                state.pods.remove(pod);
                Ok(())
            }
            ScriptedEviction::AcceptAndKeep => Ok(()),
            ScriptedEviction::NotFound => Err(EvictionError::PodNotFound { pod: pod.clone() }),
            ScriptedEviction::TooManyRequests => Err(EvictionError::TooManyRequests {
                source: "Cannot evict pod as it would violate the pod's disruption budget.".into(),
                pod: pod.clone(),
            }),
            ScriptedEviction::Fail => Err(EvictionError::EvictionRejected {
                source: "unexpected EOF".into(),
                pod: pod.clone(),
            }),
        }
    }
}
