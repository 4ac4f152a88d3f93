mod client;
mod error;

pub use self::client::*;
pub use self::error::{Error as ClusterClientError, EvictionError, Result};

use crate::constants::{DAEMONSET_KIND, POD_PHASE_PENDING, TAINT_EFFECT_NO_SCHEDULE};

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::fmt;

#[cfg(feature = "mockall")]
pub use self::client::MockClusterClient;

/// The marker an operator places on a Node to request that it be drained.
///
/// A deployment uses exactly one of the two schemes; they are never combined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DrainMarker {
    /// A taint with this key and the `NoSchedule` effect.
    Taint(String),
    /// An annotation with this key, regardless of its value.
    Annotation(String),
}

impl DrainMarker {
    /// Returns whether the given Node carries this marker.
    pub fn is_marked(&self, node: &Node) -> bool {
        match self {
            Self::Taint(key) => node
                .spec
                .as_ref()
                .and_then(|spec| spec.taints.as_ref())
                .map_or(false, |taints| {
                    taints
                        .iter()
                        .any(|taint| &taint.key == key && taint.effect == TAINT_EFFECT_NO_SCHEDULE)
                }),
            Self::Annotation(key) => node.annotations().contains_key(key),
        }
    }
}

impl fmt::Display for DrainMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Taint(key) => write!(f, "taint '{}:{}'", key, TAINT_EFFECT_NO_SCHEDULE),
            Self::Annotation(key) => write!(f, "annotation '{}'", key),
        }
    }
}

/// Whether new Pods may be scheduled onto the Node. A missing `spec.unschedulable` means schedulable.
pub fn is_schedulable(node: &Node) -> bool {
    !node
        .spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

/// Marks the Node object unschedulable. The change is local until the object is written back.
pub fn set_unschedulable(node: &mut Node) {
    node.spec.get_or_insert_with(Default::default).unschedulable = Some(true);
}

/// The name of the Node a Pod is bound to, if it has been scheduled.
pub fn pod_node_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.node_name.as_deref())
        .filter(|name| !name.is_empty())
}

pub fn is_pod_pending(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map_or(false, |phase| phase == POD_PHASE_PENDING)
}

/// Whether the Pod's primary owner is a DaemonSet. Only the first owner reference is considered.
pub fn is_daemonset_pod(pod: &Pod) -> bool {
    pod.owner_references()
        .first()
        .map_or(false, |owner| owner.kind == DAEMONSET_KIND)
}

/// Identifies a single Pod by namespace and name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new<S1: Into<String>, S2: Into<String>>(namespace: S1, name: S2) -> Self {
        PodRef {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl From<&Pod> for PodRef {
    fn from(pod: &Pod) -> Self {
        PodRef {
            namespace: pod.namespace().unwrap_or_default(),
            name: pod.name_any(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_DRAIN_MARKER;

    use k8s_openapi::api::core::v1::{NodeSpec, PodSpec, PodStatus, Taint};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::api::ObjectMeta;
    use maplit::btreemap;

    fn node_with_taints(taints: Vec<Taint>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("test-node".to_string()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                taints: Some(taints),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn taint(key: &str, effect: &str) -> Taint {
        Taint {
            key: key.to_string(),
            effect: effect.to_string(),
            value: Some("yes".to_string()),
            ..Default::default()
        }
    }

    fn owned_pod(kinds: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("test-pod".to_string()),
                namespace: Some("test".to_string()),
                owner_references: Some(
                    kinds
                        .iter()
                        .map(|kind| OwnerReference {
                            kind: kind.to_string(),
                            name: "owner".to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_taint_marker() {
        let marker = DrainMarker::Taint(DEFAULT_DRAIN_MARKER.to_string());
        let test_cases = vec![
            (node_with_taints(vec![]), false),
            (
                node_with_taints(vec![taint(DEFAULT_DRAIN_MARKER, "NoSchedule")]),
                true,
            ),
            (
                node_with_taints(vec![taint(DEFAULT_DRAIN_MARKER, "NoExecute")]),
                false,
            ),
            (
                node_with_taints(vec![
                    taint("some-other-taint", "NoSchedule"),
                    taint(DEFAULT_DRAIN_MARKER, "NoSchedule"),
                ]),
                true,
            ),
            (Node::default(), false),
        ];

        for (node, expected) in test_cases {
            assert_eq!(marker.is_marked(&node), expected, "{:?}", node.spec);
        }
    }

    #[test]
    fn test_annotation_marker_ignores_taints() {
        let marker = DrainMarker::Annotation(DEFAULT_DRAIN_MARKER.to_string());

        let tainted = node_with_taints(vec![taint(DEFAULT_DRAIN_MARKER, "NoSchedule")]);
        assert!(!marker.is_marked(&tainted));

        let mut annotated = Node::default();
        annotated.metadata.annotations = Some(btreemap! {
            DEFAULT_DRAIN_MARKER.to_string() => String::new(),
        });
        assert!(marker.is_marked(&annotated));
    }

    #[test]
    fn test_schedulability() {
        let mut node = Node::default();
        assert!(is_schedulable(&node));

        set_unschedulable(&mut node);
        assert!(!is_schedulable(&node));
    }

    #[test]
    fn test_daemonset_pod_uses_primary_owner() {
        assert!(is_daemonset_pod(&owned_pod(&["DaemonSet"])));
        assert!(is_daemonset_pod(&owned_pod(&["DaemonSet", "ReplicaSet"])));
        assert!(!is_daemonset_pod(&owned_pod(&["ReplicaSet", "DaemonSet"])));
        assert!(!is_daemonset_pod(&owned_pod(&[])));
        assert!(!is_daemonset_pod(&Pod::default()));
    }

    #[test]
    fn test_pod_accessors() {
        let pod = Pod {
            spec: Some(PodSpec {
                node_name: Some("test-node".to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Pending".to_string()),
                ..Default::default()
            }),
            ..owned_pod(&[])
        };
        assert_eq!(pod_node_name(&pod), Some("test-node"));
        assert!(is_pod_pending(&pod));
        assert_eq!(PodRef::from(&pod).to_string(), "test/test-pod");

        assert_eq!(pod_node_name(&Pod::default()), None);
        assert!(!is_pod_pending(&Pod::default()));
    }
}
