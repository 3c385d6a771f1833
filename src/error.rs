use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const MSG_REQUIRED_FIELDS: &str = "Todos los campos obligatorios deben estar llenos";
pub const MSG_CAPTCHA_FAILED: &str = "La verificación CAPTCHA falló. Inténtalo de nuevo";
pub const MSG_INTERNAL: &str = "Error interno del servidor. Inténtalo más tarde";
pub const MSG_TOO_LARGE: &str = "La solicitud es demasiado grande";

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(ValidationError),
    Captcha(CaptchaError),
    RateLimited { retry_after: u64 },
    PayloadTooLarge,
    Database(sqlx::Error),
}

/// A submission that fails field checks. Nothing has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    TooLong { field: &'static str, max: usize },
}

/// CAPTCHA rejection. Every variant means the submission is refused.
#[derive(Debug)]
pub enum CaptchaError {
    MissingToken,
    Rejected(Vec<String>),
    Unavailable(String),
}

/// Failure delivering a notification. Only ever logged.
#[derive(Debug)]
pub enum NotifyError {
    Http(OutboundError),
    Provider(String),
    Mail(String),
}

/// Outbound HTTP failure after the retry policy is exhausted.
#[derive(Debug)]
pub enum OutboundError {
    Transport(reqwest::Error),
    Status { code: u16, attempts: u32 },
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Validation(err) => write!(f, "Validation: {err}"),
            AppError::Captcha(err) => write!(f, "Captcha: {err}"),
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate Limited: retry after {retry_after}s")
            }
            AppError::PayloadTooLarge => write!(f, "Payload Too Large"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "missing required field {field}"),
            ValidationError::TooLong { field, max } => {
                write!(f, "field {field} exceeds {max} characters")
            }
        }
    }
}

impl std::fmt::Display for CaptchaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptchaError::MissingToken => write!(f, "no token submitted"),
            CaptchaError::Rejected(codes) if codes.is_empty() => write!(f, "token rejected"),
            CaptchaError::Rejected(codes) => write!(f, "token rejected ({})", codes.join(", ")),
            CaptchaError::Unavailable(msg) => write!(f, "provider unavailable: {msg}"),
        }
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(err) => write!(f, "{err}"),
            NotifyError::Provider(msg) => write!(f, "provider error: {msg}"),
            NotifyError::Mail(msg) => write!(f, "mail error: {msg}"),
        }
    }
}

impl std::fmt::Display for OutboundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundError::Transport(err) => write!(f, "request failed: {err}"),
            OutboundError::Status { code, attempts } => {
                write!(f, "upstream returned {code} after {attempts} attempt(s)")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for CaptchaError {}
impl std::error::Error for NotifyError {}
impl std::error::Error for OutboundError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(ValidationError::MissingField(_)) => {
                (StatusCode::BAD_REQUEST, MSG_REQUIRED_FIELDS.to_string())
            }
            AppError::Validation(ValidationError::TooLong { field, max }) => (
                StatusCode::BAD_REQUEST,
                format!("El campo {field} no puede superar {max} caracteres"),
            ),
            AppError::Captcha(err) => {
                tracing::info!("CAPTCHA verification failed: {err}");
                (StatusCode::BAD_REQUEST, MSG_CAPTCHA_FAILED.to_string())
            }
            AppError::RateLimited { retry_after } => {
                let body = json!({
                    "error": format!("Demasiadas solicitudes. Inténtalo de nuevo en {retry_after} segundos"),
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after.to_string())],
                    axum::Json(body),
                )
                    .into_response();
            }
            AppError::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, MSG_TOO_LARGE.to_string())
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL.to_string())
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<CaptchaError> for AppError {
    fn from(err: CaptchaError) -> Self {
        AppError::Captcha(err)
    }
}

impl From<OutboundError> for NotifyError {
    fn from(err: OutboundError) -> Self {
        NotifyError::Http(err)
    }
}
