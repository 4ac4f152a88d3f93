use crate::metrics::DrainerMetrics;

use actix_web::{get, http::header::CONTENT_TYPE, web::Data, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use tracing::{event, Level};

/// Picks the wildcard address for the metrics server from the address family of the cluster's API service.
///
/// Outside a cluster `KUBERNETES_SERVICE_HOST` is unset and IPv4 is used.
pub fn metrics_bind_address(k8s_service_host: Option<&str>) -> &'static str {
    match k8s_service_host {
        // IPv6 format
        Some(host) if host.contains(':') => "[::]",
        // IPv4 format
        _ => "0.0.0.0",
    }
}

#[get("/metrics")]
pub async fn vending_metrics(metrics: Data<DrainerMetrics>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();
    let mut buf = Vec::new();
    if let Err(err) = encoder.encode(&metric_families[..], &mut buf) {
        event!(Level::ERROR, error = %err, "Unable to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    let body = String::from_utf8(buf).unwrap_or_default();
    HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, prometheus::TEXT_FORMAT))
        .body(body)
}
