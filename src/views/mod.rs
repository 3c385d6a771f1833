use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::config::CaptchaConfig;
use crate::state::SharedState;

/// Services offered in the form's select box.
const SERVICES: [&str; 5] = [
    "Limpieza de alfombras",
    "Limpieza de tapices",
    "Limpieza de colchones",
    "Limpieza de cortinas",
    "Limpieza de oficinas",
];

pub struct CaptchaWidget {
    pub script_url: &'static str,
    pub class: &'static str,
    pub site_key: String,
}

#[derive(Template)]
#[template(path = "formulario.html")]
struct FormTemplate {
    services: &'static [&'static str],
    captcha: Option<CaptchaWidget>,
    honeypot_field: Option<String>,
}

pub async fn form_page(State(state): State<SharedState>) -> Response {
    let captcha = match &state.config.captcha {
        CaptchaConfig::Siteverify {
            kind,
            site_key: Some(site_key),
            ..
        } => Some(CaptchaWidget {
            script_url: kind.script_url(),
            class: kind.widget_class(),
            site_key: site_key.clone(),
        }),
        _ => None,
    };

    let template = FormTemplate {
        services: &SERVICES,
        captcha,
        honeypot_field: state.config.honeypot_field.clone(),
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render form: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
