//! Request counters and latency histograms per route

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::infrastructure::observability::record_http_request;

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = route_of(&request);

    let response = next.run(request).await;

    record_http_request(method.as_str(), &path, response.status().as_u16(), start.elapsed());

    response
}

/// Route template when matched, so label cardinality stays bounded
fn route_of(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}
