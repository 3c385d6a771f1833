use std::net::IpAddr;

use crate::error::AppError;
use crate::models::Submission;
use crate::state::AppState;

use super::{fields, honeypot, parser};

pub enum Outcome {
    Accepted(Submission),
    /// Honeypot tripped: answered like a success, nothing stored or sent.
    Discarded,
}

/// Rate check, CAPTCHA, validation, insert, notification, in that order.
/// Every step before the insert can reject without side effects.
pub async fn run(
    state: &AppState,
    client_ip: IpAddr,
    content_type: Option<&str>,
    body: bytes::Bytes,
) -> Result<Outcome, AppError> {
    state
        .submission_limiter
        .check(client_ip)
        .map_err(|retry_after| {
            tracing::info!("Rate limit exceeded for {client_ip}");
            AppError::RateLimited { retry_after }
        })?;

    let form = parser::parse_body(content_type, body)
        .await
        .map_err(|e| {
            tracing::debug!("Unparsable submission body: {e}");
            AppError::BadRequest("Formato de solicitud inválido".to_string())
        })?;

    if honeypot::is_spam(&form, state.config.honeypot_field.as_deref()) {
        tracing::info!("Honeypot filled, discarding submission from {client_ip}");
        return Ok(Outcome::Discarded);
    }

    if let Some(captcha) = &state.captcha {
        let token = form
            .get(captcha.token_field())
            .map(String::as_str)
            .unwrap_or_default();
        captcha.verify(token, Some(client_ip)).await?;
    }

    let new_submission = fields::validate(&form)?;

    let submission = state.store.insert(&new_submission).await?;
    tracing::info!("Stored submission {}", submission.id);

    if let Some(notifier) = &state.notifier {
        state
            .deliveries
            .dispatch(notifier.clone(), &state.template, submission.clone());
    }

    Ok(Outcome::Accepted(submission))
}
