use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// HTTP header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that tags every request with a correlation id and stamps
/// JSON object responses with the measured handling time.
///
/// The id is taken from an incoming `x-request-id` header when it parses
/// as a UUID, otherwise freshly generated, and is echoed back on the
/// response. `response_time_s` is injected into top-level JSON objects
/// only; every other body passes through untouched. Because the stamp is
/// applied here, a cache hit reports its own serving time rather than the
/// handling time recorded when the payload was first computed.
pub async fn request_meta(request: Request, next: Next) -> Response {
    let started = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    );

    let response = next.run(request).instrument(span).await;
    let mut response = stamp_response_time(response, started.elapsed().as_secs_f64()).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Rewrites a JSON object body to carry `response_time_s`, rounded to
/// milliseconds.
async fn stamp_response_time(response: Response, elapsed_s: f64) -> Response {
    let is_json_object = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json_object {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(error = %error, "Failed to buffer response body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let stamped = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(mut map)) => {
            let rounded = (elapsed_s * 1000.0).round() / 1000.0;
            map.insert("response_time_s".to_string(), rounded.into());
            serde_json::to_vec(&map).ok()
        }
        _ => None,
    };

    match stamped {
        Some(body) => {
            // the body length changed; let the server recompute it
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}
