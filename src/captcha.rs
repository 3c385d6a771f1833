use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{CaptchaConfig, CaptchaKind};
use crate::error::CaptchaError;
use crate::outbound::OutboundClient;

pub type CaptchaResult = Result<(), CaptchaError>;

/// Human-verification check run before a submission is accepted.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Form field carrying the token.
    fn token_field(&self) -> &str;

    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> CaptchaResult;
}

/// reCAPTCHA, hCaptcha and Turnstile all speak the same siteverify protocol.
pub struct SiteverifyVerifier {
    http: OutboundClient,
    kind: CaptchaKind,
    secret: String,
    verify_url: String,
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl SiteverifyVerifier {
    pub fn new(
        http: OutboundClient,
        kind: CaptchaKind,
        secret: String,
        verify_url: String,
    ) -> Self {
        Self {
            http,
            kind,
            secret,
            verify_url,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for SiteverifyVerifier {
    fn token_field(&self) -> &str {
        self.kind.token_field()
    }

    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> CaptchaResult {
        let token = token.trim();
        if token.is_empty() {
            return Err(CaptchaError::MissingToken);
        }

        let mut form = vec![("secret", self.secret.clone()), ("response", token.to_string())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let resp = self
            .http
            .send(self.http.client().post(&self.verify_url).form(&form))
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CaptchaError::Unavailable(format!(
                "siteverify returned {}",
                resp.status()
            )));
        }

        let verdict: SiteverifyResponse = resp
            .json()
            .await
            .map_err(|e| CaptchaError::Unavailable(format!("invalid siteverify reply: {e}")))?;

        if verdict.success {
            Ok(())
        } else {
            Err(CaptchaError::Rejected(verdict.error_codes))
        }
    }
}

/// Resolve the configured provider into a verifier, or `None` when disabled.
pub fn from_config(
    config: &CaptchaConfig,
    http: &OutboundClient,
) -> Option<Arc<dyn CaptchaVerifier>> {
    match config {
        CaptchaConfig::None => None,
        CaptchaConfig::Siteverify {
            kind,
            secret,
            verify_url,
            ..
        } => Some(Arc::new(SiteverifyVerifier::new(
            http.clone(),
            *kind,
            secret.clone(),
            verify_url.clone(),
        ))),
    }
}
