pub mod captcha;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod outbound;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod submission;
pub mod views;
pub mod worker;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::SubmissionStore;
use crate::error::AppError;
use crate::outbound::OutboundClient;
use crate::state::{AppState, SharedState};

/// Resolve configured providers into capability objects and assemble the state.
pub fn build_state(config: Config, store: Arc<dyn SubmissionStore>) -> Result<SharedState, String> {
    let http = OutboundClient::new(&config.http)?;

    let captcha = captcha::from_config(&config.captcha, &http);
    match &captcha {
        Some(verifier) => tracing::info!("CAPTCHA enabled (token field {})", verifier.token_field()),
        None => tracing::info!("CAPTCHA disabled"),
    }

    let notifier = notify::from_config(&config.notify, &http)?;
    match &notifier {
        Some(n) => tracing::info!("Notifications via {}", n.channel()),
        None => tracing::info!("Notifications disabled"),
    }

    Ok(Arc::new(AppState::new(config, store, captcha, notifier)))
}

pub fn build_app(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_body_size = state.config.max_body_size;

    // Outermost first: tracing sees every request
    let stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(cors);

    // Router::layer wraps from the inside out
    Router::new()
        .merge(routes::form_routes())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(middleware::map_response(json_payload_too_large))
        .layer(stack)
        .with_state(state)
}

/// The body limit answers in plain text, both from the layer itself and from
/// extractors that hit the limit mid-stream. Give clients the usual error body.
async fn json_payload_too_large(response: Response) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge.into_response();
    }
    response
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin '{o}'");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(86_400))
}
