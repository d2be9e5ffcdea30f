//! Request logging and the Prometheus endpoint.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::api::AppState;

/// `GET /api/metrics`
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.prometheus_handle.as_ref() {
        Some(handle) => handle.render().into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "Metrics are disabled (observability.metrics_enabled = false)",
        )
            .into_response(),
    }
}

/// Which part of the API a path belongs to; used as a low-cardinality label.
fn endpoint_group(path: &str) -> &'static str {
    let Some(rest) = path.strip_prefix("/api/") else {
        return "other";
    };
    if rest.starts_with("db/") || rest == "remove-anime" {
        "stored"
    } else if rest == "health" || rest == "metrics" || rest.starts_with("system/") {
        "system"
    } else {
        "scrape"
    }
}

fn outcome(status: StatusCode) -> &'static str {
    match status.as_u16() {
        202 => "accepted",
        502 => "upstream_error",
        s if s >= 500 => "error",
        s if s >= 400 => "client_error",
        _ => "success",
    }
}

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let group = endpoint_group(&path);

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        group,
    );

    async move {
        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status();
        let outcome = outcome(status);

        let labels = [
            ("method", method),
            ("group", group.to_string()),
            ("status", status.as_u16().to_string()),
        ];
        metrics::counter!("http_requests_total", &labels).increment(1);
        metrics::histogram!("http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if status == StatusCode::BAD_GATEWAY {
            warn!(
                event = "http_request_finished",
                duration_ms,
                status_code = status.as_u16(),
                query = %query,
                outcome,
                "Scrape request failed upstream"
            );
        } else {
            info!(
                event = "http_request_finished",
                duration_ms,
                status_code = status.as_u16(),
                query = %query,
                outcome,
                "Request finished"
            );
        }

        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_groups() {
        assert_eq!(endpoint_group("/api/anime-list"), "scrape");
        assert_eq!(endpoint_group("/api/hianime-top10"), "scrape");
        assert_eq!(endpoint_group("/api/db/stats"), "stored");
        assert_eq!(endpoint_group("/api/remove-anime"), "stored");
        assert_eq!(endpoint_group("/api/health"), "system");
        assert_eq!(endpoint_group("/api/system/config"), "system");
        assert_eq!(endpoint_group("/favicon.ico"), "other");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome(StatusCode::ACCEPTED), "accepted");
        assert_eq!(outcome(StatusCode::BAD_GATEWAY), "upstream_error");
        assert_eq!(outcome(StatusCode::NOT_FOUND), "client_error");
        assert_eq!(outcome(StatusCode::OK), "success");
    }
}
