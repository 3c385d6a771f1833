pub mod email;
pub mod telegram;
pub mod template;
pub mod twilio;
pub mod ultramsg;
pub mod webhook;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::models::Submission;
use crate::outbound::OutboundClient;

use template::MessageTemplate;

pub type NotifyResult = Result<(), NotifyError>;

/// Upper bound on a whole delivery, retries included.
const DELIVERY_DEADLINE: Duration = Duration::from_secs(60);

/// An accepted submission plus its rendered operator message.
#[derive(Debug, Clone)]
pub struct Notification {
    pub submission: Submission,
    pub text: String,
}

/// Outbound channel alerting the operator about a new submission.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &str;
    async fn notify(&self, notification: &Notification) -> NotifyResult;
}

/// Resolve the configured channel into a notifier, or `None` when disabled.
pub fn from_config(
    config: &NotifyConfig,
    http: &OutboundClient,
) -> Result<Option<Arc<dyn Notifier>>, String> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifyConfig::None => return Ok(None),
        NotifyConfig::Telegram {
            bot_token,
            chat_id,
            api_base,
        } => Arc::new(telegram::TelegramNotifier::new(
            http.clone(),
            api_base,
            bot_token,
            chat_id,
        )),
        NotifyConfig::TwilioWhatsapp {
            account_sid,
            auth_token,
            from,
            to,
            api_base,
        } => Arc::new(twilio::TwilioWhatsappNotifier::new(
            http.clone(),
            api_base,
            account_sid,
            auth_token,
            from,
            to,
        )),
        NotifyConfig::UltraMsg {
            instance_id,
            token,
            to,
            api_base,
        } => Arc::new(ultramsg::UltraMsgNotifier::new(
            http.clone(),
            api_base,
            instance_id,
            token,
            to,
        )),
        NotifyConfig::Webhook { url } => Arc::new(webhook::WebhookNotifier::new(http.clone(), url)),
        NotifyConfig::Email(smtp) => Arc::new(email::EmailNotifier::new(smtp)?),
    };
    Ok(Some(notifier))
}

/// Background deliveries still running. The submission is already stored
/// when one starts, so any failure is logged and dropped.
#[derive(Default)]
pub struct Deliveries {
    tasks: Mutex<JoinSet<()>>,
}

impl Deliveries {
    pub fn dispatch(
        &self,
        notifier: Arc<dyn Notifier>,
        template: &MessageTemplate,
        submission: Submission,
    ) {
        let notification = Notification {
            text: template.render(&submission),
            submission,
        };

        let mut tasks = self.lock();
        // Reap finished deliveries so the set only holds live ones
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            deliver(notifier.as_ref(), &notification).await;
        });
    }

    pub fn in_flight(&self) -> usize {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait up to `grace` for running deliveries, then abort the rest.
    /// Returns how many were abandoned.
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());
        if tasks.is_empty() {
            return 0;
        }

        tracing::info!("Waiting for {} notification(s) to finish", tasks.len());
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            return 0;
        }
        let abandoned = tasks.len();
        tracing::warn!("Abandoning {abandoned} notification(s) still in flight at shutdown");
        tasks.abort_all();
        abandoned
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run one delivery under the deadline, logging the outcome.
pub async fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    let id = notification.submission.id;
    match tokio::time::timeout(DELIVERY_DEADLINE, notifier.notify(notification)).await {
        Ok(Ok(())) => {
            tracing::info!("Submission {id} forwarded via {}", notifier.channel());
        }
        Ok(Err(e)) => {
            tracing::warn!("Notification via {} failed for submission {id}: {e}", notifier.channel());
        }
        Err(_) => {
            tracing::warn!(
                "Notification via {} timed out after {}s for submission {id}",
                notifier.channel(),
                DELIVERY_DEADLINE.as_secs()
            );
        }
    }
}

/// First `max` characters of a provider reply, for error messages.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
