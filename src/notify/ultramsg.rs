use async_trait::async_trait;
use serde_json::Value;

use super::{snippet, Notification, Notifier, NotifyResult};
use crate::error::NotifyError;
use crate::outbound::OutboundClient;

/// UltraMsg WhatsApp gateway `messages/chat` endpoint.
pub struct UltraMsgNotifier {
    http: OutboundClient,
    url: String,
    token: String,
    to: String,
}

impl UltraMsgNotifier {
    pub fn new(http: OutboundClient, api_base: &str, instance_id: &str, token: &str, to: &str) -> Self {
        Self {
            http,
            url: format!("{}/{instance_id}/messages/chat", api_base.trim_end_matches('/')),
            token: token.to_string(),
            to: to.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for UltraMsgNotifier {
    fn channel(&self) -> &str {
        "ultramsg"
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult {
        let form = [
            ("token", self.token.as_str()),
            ("to", self.to.as_str()),
            ("body", notification.text.as_str()),
        ];

        let resp = self
            .http
            .send(self.http.client().post(&self.url).form(&form))
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Provider(format!(
                "ultramsg {status}: {}",
                snippet(&text, 200)
            )));
        }

        // The gateway answers 200 with an `error` member on bad tokens/numbers
        let reply: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        match reply.get("error") {
            Some(err) if !err.is_null() => Err(NotifyError::Provider(format!("ultramsg: {err}"))),
            _ => Ok(()),
        }
    }
}
