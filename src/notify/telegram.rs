use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{snippet, Notification, Notifier, NotifyResult};
use crate::error::NotifyError;
use crate::outbound::OutboundClient;

/// Telegram Bot API `sendMessage` to a fixed chat.
pub struct TelegramNotifier {
    http: OutboundClient,
    url: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(http: OutboundClient, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            http,
            url: format!("{}/bot{bot_token}/sendMessage", api_base.trim_end_matches('/')),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn channel(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult {
        let body = json!({
            "chat_id": self.chat_id,
            "text": notification.text,
            "disable_web_page_preview": true,
        });

        let resp = self
            .http
            .send(self.http.client().post(&self.url).json(&body))
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        // Telegram reports errors with ok=false even on some 200 replies
        match serde_json::from_str::<TelegramReply>(&text) {
            Ok(reply) if reply.ok && status.is_success() => Ok(()),
            Ok(reply) => Err(NotifyError::Provider(format!(
                "telegram {status}: {}",
                reply.description.unwrap_or_default()
            ))),
            Err(_) => Err(NotifyError::Provider(format!(
                "telegram {status}: {}",
                snippet(&text, 200)
            ))),
        }
    }
}
