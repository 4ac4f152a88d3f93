//! Command line configuration for the drain controller.
use models::constants::{CONTROLLER_INTERNAL_PORT, DEFAULT_DRAIN_MARKER};
use models::node::DrainMarker;
use models::telemetry::LogFormat;

use argh::FromArgs;
use snafu::Snafu;

#[derive(FromArgs, Debug, PartialEq)]
/// Cordons and drains Kubernetes nodes that carry a drain marker, one node at a time.
pub struct Args {
    /// name of the taint (with effect NoSchedule) which marks nodes for draining [default: ektopistis.io/drain]
    #[argh(option)]
    pub drain_taint_name: Option<String>,

    /// name of the annotation which marks nodes for draining; replaces the taint-based marker
    #[argh(option)]
    pub drain_annotation_name: Option<String>,

    /// port on which prometheus metrics are served
    #[argh(option, default = "CONTROLLER_INTERNAL_PORT")]
    pub metrics_port: u16,

    /// log format: full, compact, pretty or json
    #[argh(option, default = "LogFormat::default()")]
    pub log_format: LogFormat,

    /// colour log output with ANSI escape codes
    #[argh(switch)]
    pub log_ansi: bool,
}

impl Args {
    /// Chooses the drain marker scheme. Taints are used unless an annotation name is given.
    pub fn drain_marker(&self) -> Result<DrainMarker, ConfigError> {
        match (&self.drain_taint_name, &self.drain_annotation_name) {
            (Some(_), Some(_)) => MutuallyExclusiveMarkersSnafu.fail(),
            (_, Some(annotation)) if annotation.is_empty() => EmptyMarkerSnafu {
                flag: "--drain-annotation-name",
            }
            .fail(),
            (Some(taint), _) if taint.is_empty() => EmptyMarkerSnafu {
                flag: "--drain-taint-name",
            }
            .fail(),
            (_, Some(annotation)) => Ok(DrainMarker::Annotation(annotation.clone())),
            (Some(taint), None) => Ok(DrainMarker::Taint(taint.clone())),
            (None, None) => Ok(DrainMarker::Taint(DEFAULT_DRAIN_MARKER.to_string())),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("--drain-taint-name and --drain-annotation-name cannot be used together"))]
    MutuallyExclusiveMarkers,

    #[snafu(display("{} must not be empty", flag))]
    EmptyMarker { flag: String },
}
