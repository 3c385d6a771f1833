use async_trait::async_trait;

use super::{snippet, Notification, Notifier, NotifyResult};
use crate::error::NotifyError;
use crate::outbound::OutboundClient;

/// Twilio Messages API with WhatsApp sender and recipient.
pub struct TwilioWhatsappNotifier {
    http: OutboundClient,
    url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl TwilioWhatsappNotifier {
    pub fn new(
        http: OutboundClient,
        api_base: &str,
        account_sid: &str,
        auth_token: &str,
        from: &str,
        to: &str,
    ) -> Self {
        Self {
            http,
            url: format!(
                "{}/2010-04-01/Accounts/{account_sid}/Messages.json",
                api_base.trim_end_matches('/')
            ),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from: whatsapp_address(from),
            to: whatsapp_address(to),
        }
    }
}

/// Twilio needs the `whatsapp:` scheme on both numbers.
fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

#[async_trait]
impl Notifier for TwilioWhatsappNotifier {
    fn channel(&self) -> &str {
        "twilio_whatsapp"
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult {
        let form = [
            ("From", self.from.as_str()),
            ("To", self.to.as_str()),
            ("Body", notification.text.as_str()),
        ];

        let req = self
            .http
            .client()
            .post(&self.url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form);

        let resp = self.http.send(req).await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        Err(NotifyError::Provider(format!(
            "twilio {status}: {}",
            snippet(&text, 200)
        )))
    }
}
