/// Helper macro to avoid retyping the base domain-like name of our system when creating further
/// string constants from it. When given no parameters, this returns the base domain-like name of
/// the system. When given a string literal parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! ektopistis_domain {
    () => {
        "ektopistis.io"
    };
    ($s:literal) => {
        concat!(ektopistis_domain!(), "/", $s)
    };
}

/// The taint (or annotation) key which marks a node for draining unless configured otherwise.
pub const DEFAULT_DRAIN_MARKER: &str = ektopistis_domain!("drain");

// Kubernetes vocabulary
pub const TAINT_EFFECT_NO_SCHEDULE: &str = "NoSchedule";
pub const POD_PHASE_PENDING: &str = "Pending";
pub const DAEMONSET_KIND: &str = "DaemonSet";

/// Grace period handed to the eviction API for every pod we evict.
pub const EVICTION_GRACE_PERIOD_SECONDS: u32 = 45;

// controller constants
pub const CONTROLLER_INTERNAL_PORT: u16 = 8080; // The internal port on which prometheus metrics are vended.
