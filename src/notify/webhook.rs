use async_trait::async_trait;
use serde_json::json;

use super::{snippet, Notification, Notifier, NotifyResult};
use crate::error::NotifyError;
use crate::outbound::OutboundClient;

/// Generic JSON POST carrying the stored submission and the rendered text.
pub struct WebhookNotifier {
    http: OutboundClient,
    url: String,
}

impl WebhookNotifier {
    pub fn new(http: OutboundClient, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult {
        let s = &notification.submission;
        let body = json!({
            "event": "submission.created",
            "submission": {
                "id": s.id,
                "nombre": s.name,
                "telefono": s.phone,
                "correo": s.email,
                "descripcion": s.description,
                "servicio": s.service_type,
                "created_at": s.created_at,
            },
            "text": notification.text,
        });

        let resp = self
            .http
            .send(self.http.client().post(&self.url).json(&body))
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(NotifyError::Provider(format!(
                "webhook {status}: {}",
                snippet(&text, 200)
            )))
        }
    }
}
