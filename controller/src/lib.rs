pub mod config;
pub mod cordon;
pub mod disposition;
pub mod error;
pub mod eviction;
pub mod metrics;
pub mod poller;
pub mod reconciler;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::disposition::Disposition;
pub use crate::reconciler::NodeDrainer;
