use controller::{
    config::Args,
    metrics::DrainerMetrics,
    poller::DrainCompletionPoller,
    reconciler::{error_policy, reconcile},
    telemetry::{metrics_bind_address, vending_metrics},
    NodeDrainer,
};
use models::{node::K8SClusterClient, telemetry};

use actix_web::{web::Data, App, HttpServer};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::Api,
    runtime::{watcher::Config, Controller},
};
use snafu::ResultExt;
use std::{env, sync::Arc};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{event, Level};

/// The module-wide result type.
type Result<T> = std::result::Result<T, controller_error::Error>;

#[actix_web::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    telemetry::init_logging(args.log_format, args.log_ansi)
        .context(controller_error::TelemetryInitSnafu)?;

    let drain_marker = args
        .drain_marker()
        .context(controller_error::ConfigurationSnafu)?;
    event!(Level::INFO, ?args, %drain_marker, "Starting with these flags");

    let k8s_client = kube::client::Client::try_default()
        .await
        .context(controller_error::ClientCreateSnafu)?;

    // The controller's own shutdown lets in-flight reconciliations finish. This channel also ends any wait for
    // evicted pods.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigterm =
        signal(SignalKind::terminate()).context(controller_error::SignalHandlerSnafu)?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        event!(Level::INFO, "Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let metrics = Arc::new(DrainerMetrics::new().context(controller_error::MetricsInitSnafu)?);
    let drainer = Arc::new(
        NodeDrainer::new(
            K8SClusterClient::new(k8s_client.clone()),
            drain_marker,
            metrics.clone(),
        )
        .with_poller(DrainCompletionPoller::default().with_shutdown(shutdown_rx)),
    );

    // Every change to any Node is delivered to the drain state machine. The controller never runs two
    // reconciliations for the same Node at once, but different Nodes are reconciled concurrently.
    event!(Level::INFO, "Setting up node watch");
    let nodes: Api<Node> = Api::all(k8s_client);
    let controller_runner = Controller::new(nodes, Config::default())
        .shutdown_on_signal()
        .run(
            reconcile::<K8SClusterClient>,
            error_policy::<K8SClusterClient>,
            drainer,
        )
        .for_each(|result| async move {
            match result {
                Ok((node, action)) => {
                    event!(Level::DEBUG, node = %node.name, ?action, "Node reconciliation completed")
                }
                Err(err) => {
                    event!(Level::WARN, error = %err, "Node reconciliation error")
                }
            }
        });

    let k8s_service_addr = env::var("KUBERNETES_SERVICE_HOST").ok();
    let bindaddress = metrics_bind_address(k8s_service_addr.as_deref());

    // Setup Http server to vend prometheus metrics
    let prometheus_server = HttpServer::new(move || {
        App::new()
            .app_data(Data::from(metrics.clone()))
            .service(vending_metrics)
    })
    .bind(format!("{}:{}", bindaddress, args.metrics_port))
    .context(controller_error::PrometheusServerSnafu)?
    .disable_signals()
    .run();

    tokio::select! {
        _ = controller_runner => {
            event!(Level::INFO, "controller exited");
        },
        server = prometheus_server => {
            event!(Level::ERROR, "metric server exited");
            server.context(controller_error::PrometheusServerSnafu)?
        }
    };
    Ok(())
}

pub mod controller_error {
    use controller::config::ConfigError;
    use models::telemetry;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Invalid configuration: '{}'", source))]
        Configuration { source: ConfigError },

        #[snafu(display("Unable to create Kubernetes client: '{}'", source))]
        ClientCreate { source: kube::Error },

        #[snafu(display("Unable to listen for shutdown signals: '{}'", source))]
        SignalHandler { source: std::io::Error },

        #[snafu(display("Unable to register prometheus metrics: '{}'", source))]
        MetricsInit { source: prometheus::Error },

        #[snafu(display("Error running prometheus HTTP server: '{}'", source))]
        PrometheusServer { source: std::io::Error },

        #[snafu(display("Error configuring telemetry: '{}'", source))]
        TelemetryInit {
            source: telemetry::TelemetryConfigError,
        },
    }
}
