use crate::metrics::MetricCatalog;
use std::sync::Arc;
use tracing::error;
use warp::http::{header, Response, StatusCode};
use warp::Filter;

/// Creates the route for health checks.
///
/// This route listens for GET requests at the `/health` path and answers
/// `ok` as plain text. It does not look at scrape state: the process is
/// healthy as long as it can serve HTTP.
pub fn health_check_route() -> warp::filters::BoxedFilter<(impl warp::Reply,)> {
    warp::get()
        .and(warp::path!("health"))
        .map(|| {
            Response::builder()
                .header(header::CONTENT_TYPE, "text/plain")
                .header(header::CACHE_CONTROL, "no-cache,no-store")
                .header(header::SERVER, "prometheus")
                .body("ok\n")
        })
        .boxed()
}

/// Creates the route that renders the metric catalog.
///
/// This route listens for GET requests at the `/metrics` path and returns the
/// Prometheus text exposition of every registered series.
pub fn metrics_route(
    catalog: Arc<MetricCatalog>,
) -> warp::filters::BoxedFilter<(impl warp::Reply,)> {
    warp::get()
        .and(warp::path!("metrics"))
        .map(move || match catalog.render() {
            Ok(body) => Response::builder()
                .header(header::CONTENT_TYPE, catalog.content_type())
                .body(body),
            Err(e) => {
                error!("Failed to render metrics: {}", e);
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Vec::new())
            }
        })
        .boxed()
}
