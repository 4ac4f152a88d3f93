use super::PodRef;

use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors talking to the Kubernetes API on behalf of the drain controller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to fetch Node '{}': '{}'", node_name, source))]
    GetNode {
        source: Box<dyn std::error::Error + Send + Sync>,
        node_name: String,
    },

    #[snafu(display("Unable to list Nodes: '{}'", source))]
    ListNodes {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Unable to update Node '{}': '{}'", node_name, source))]
    UpdateNode {
        source: Box<dyn std::error::Error + Send + Sync>,
        node_name: String,
    },

    #[snafu(display("Unable to list Pods: '{}'", source))]
    ListPods {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Unable to fetch Pod '{}': '{}'", pod, source))]
    GetPod {
        source: Box<dyn std::error::Error + Send + Sync>,
        pod: PodRef,
    },
}

/// The classified result of a rejected eviction request.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EvictionError {
    #[snafu(display("Pod '{}' no longer exists", pod))]
    /// The Pod is already gone. Callers treat this as a completed eviction.
    PodNotFound { pod: PodRef },

    #[snafu(display(
        "Too many requests when creating Eviction for Pod '{}': '{}'",
        pod,
        source
    ))]
    /// The eviction was refused to respect a PodDisruptionBudget, or the API server is throttling us.
    TooManyRequests {
        source: Box<dyn std::error::Error + Send + Sync>,
        pod: PodRef,
    },

    #[snafu(display("Unable to create Eviction for Pod '{}': '{}'", pod, source))]
    /// Any other failure to create the eviction.
    EvictionRejected {
        source: Box<dyn std::error::Error + Send + Sync>,
        pod: PodRef,
    },
}

impl EvictionError {
    pub fn pod(&self) -> &PodRef {
        match self {
            Self::PodNotFound { pod }
            | Self::TooManyRequests { pod, .. }
            | Self::EvictionRejected { pod, .. } => pod,
        }
    }
}
