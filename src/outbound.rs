use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::HttpConfig;
use crate::error::OutboundError;

/// Statuses worth another attempt. Everything else is returned as-is.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP client with a per-request timeout and a bounded exponential retry.
#[derive(Clone)]
pub struct OutboundClient {
    client: Client,
    max_attempts: u32,
    backoff: Duration,
}

impl OutboundClient {
    pub fn new(config: &HttpConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ecolim/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send the request, retrying transport errors and [`RETRY_STATUSES`].
    /// Gives up after `max_attempts` and returns the last failure.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, OutboundError> {
        let mut attempt = 1;
        loop {
            // Streaming bodies cannot be cloned and get a single attempt.
            let Some(current) = request.try_clone() else {
                return request
                    .send()
                    .await
                    .map_err(|e| OutboundError::Transport(e.without_url()));
            };
            let last = attempt >= self.max_attempts;

            match current.send().await {
                Ok(resp) if is_retryable(resp.status()) => {
                    let code = resp.status().as_u16();
                    if last {
                        return Err(OutboundError::Status {
                            code,
                            attempts: attempt,
                        });
                    }
                    tracing::debug!(
                        "Upstream returned {code} (attempt {attempt}/{})",
                        self.max_attempts
                    );
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    // Provider URLs can embed credentials (Telegram bot tokens)
                    let e = e.without_url();
                    if last {
                        return Err(OutboundError::Transport(e));
                    }
                    tracing::debug!(
                        "Outbound request failed (attempt {attempt}/{}): {e}",
                        self.max_attempts
                    );
                }
            }

            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// Delay before the attempt following `attempt`: base, 2x base, 4x base...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
