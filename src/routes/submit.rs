use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::state::SharedState;
use crate::submission::{metadata, pipeline};

pub const MSG_SUCCESS: &str = "Datos enviados exitosamente!";

pub async fn submit(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let client_ip = metadata::client_ip(&headers, addr.ip(), &state.config.trusted_proxies);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    tracing::debug!(
        "Submission from {client_ip} ({})",
        metadata::user_agent(&headers)
    );

    // Spam gets the same answer as a real submission
    pipeline::run(&state, client_ip, content_type, body).await?;

    // Plain browser form posts go to the confirmation page when configured
    if let Some(ref url) = state.config.success_redirect {
        if is_browser_form(content_type, &headers) {
            return Ok(Redirect::to(url).into_response());
        }
    }

    Ok((StatusCode::OK, Json(json!({ "message": MSG_SUCCESS }))).into_response())
}

/// A native form post (not fetch/XHR) that expects an HTML page back.
fn is_browser_form(content_type: Option<&str>, headers: &HeaderMap) -> bool {
    let is_form = content_type.is_some_and(|ct| {
        ct.contains("application/x-www-form-urlencoded") || ct.contains("multipart/form-data")
    });
    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    is_form && wants_html
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn only_html_form_posts_are_redirected() {
        let mut headers = HeaderMap::new();
        assert!(!is_browser_form(Some("application/x-www-form-urlencoded"), &headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        assert!(is_browser_form(Some("application/x-www-form-urlencoded"), &headers));
        assert!(is_browser_form(Some("multipart/form-data; boundary=x"), &headers));
        assert!(!is_browser_form(Some("application/json"), &headers));
        assert!(!is_browser_form(None, &headers));
    }
}
