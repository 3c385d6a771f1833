use std::sync::Arc;

use crate::captcha::CaptchaVerifier;
use crate::config::Config;
use crate::db::SubmissionStore;
use crate::notify::template::MessageTemplate;
use crate::notify::{Deliveries, Notifier};
use crate::rate_limit::SubmissionRateLimiter;

pub type SharedState = Arc<AppState>;

/// Everything a request needs, built once at startup and never mutated
/// apart from the limiter's counters and the running deliveries.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SubmissionStore>,
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub template: MessageTemplate,
    pub submission_limiter: SubmissionRateLimiter,
    pub deliveries: Deliveries,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SubmissionStore>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let template = MessageTemplate::new(config.notify_template.as_deref());
        let submission_limiter = SubmissionRateLimiter::new(config.rate_limits.clone());
        Self {
            config,
            store,
            captcha,
            notifier,
            template,
            submission_limiter,
            deliveries: Deliveries::default(),
        }
    }
}
