use models::node::{ClusterClientError, EvictionError};

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Could not fetch Node '{}': '{}'", node_name, source))]
    FetchNode {
        source: ClusterClientError,
        node_name: String,
    },

    #[snafu(display("Unable to determine which Nodes are already cordoned: '{}'", source))]
    FindCordonedNodes { source: ClusterClientError },

    #[snafu(display("Could not mark Node '{}' unschedulable: '{}'", node_name, source))]
    CordonNode {
        source: ClusterClientError,
        node_name: String,
    },

    #[snafu(display("Could not retrieve the Pod list: '{}'", source))]
    ListPods { source: ClusterClientError },

    #[snafu(display("Eviction of Pod '{}' was rate limited: '{}'", source.pod(), source))]
    EvictionRateLimited { source: EvictionError },
}
