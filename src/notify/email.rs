use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notification, Notifier, NotifyResult};
use crate::config::SmtpConfig;
use crate::error::NotifyError;

/// Plain-text e-mail to the operator mailbox over STARTTLS.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.user.clone(), config.pass.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: config
                .from
                .parse()
                .map_err(|e| format!("Invalid ECOLIM_SMTP_FROM: {e}"))?,
            to: config
                .to
                .parse()
                .map_err(|e| format!("Invalid ECOLIM_SMTP_TO: {e}"))?,
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let s = &notification.submission;
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("Nueva solicitud de {}: {}", s.service_type, s.name))
            .header(ContentType::TEXT_PLAIN);

        // Let the operator answer the customer directly when they left an address
        if let Some(reply_to) = s.email.as_deref().and_then(|e| e.parse::<Mailbox>().ok()) {
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(notification.text.clone())
            .map_err(|e| NotifyError::Mail(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &str {
        "email"
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult {
        let message = self.build_message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Mail(e.to_string()))?;
        Ok(())
    }
}
