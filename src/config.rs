use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;

use crate::rate_limit::Quota;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    pub cors_origins: Vec<String>,
    pub db: PoolConfig,
    pub rate_limits: Vec<Quota>,
    pub success_redirect: Option<String>,
    pub honeypot_field: Option<String>,
    pub http: HttpConfig,
    pub captcha: CaptchaConfig,
    pub notify: NotifyConfig,
    pub notify_template: Option<String>,
    pub keepalive: Option<KeepAliveConfig>,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Connections older than this are closed and reopened.
    pub recycle: Duration,
}

/// Timeout and retry policy shared by every outbound HTTP call.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaKind {
    Recaptcha,
    Hcaptcha,
    Turnstile,
}

impl CaptchaKind {
    pub fn default_verify_url(self) -> &'static str {
        match self {
            CaptchaKind::Recaptcha => "https://www.google.com/recaptcha/api/siteverify",
            CaptchaKind::Hcaptcha => "https://api.hcaptcha.com/siteverify",
            CaptchaKind::Turnstile => "https://challenges.cloudflare.com/turnstile/v0/siteverify",
        }
    }

    pub fn script_url(self) -> &'static str {
        match self {
            CaptchaKind::Recaptcha => "https://www.google.com/recaptcha/api.js",
            CaptchaKind::Hcaptcha => "https://js.hcaptcha.com/1/api.js",
            CaptchaKind::Turnstile => "https://challenges.cloudflare.com/turnstile/v0/api.js",
        }
    }

    /// CSS class the provider's script turns into a widget.
    pub fn widget_class(self) -> &'static str {
        match self {
            CaptchaKind::Recaptcha => "g-recaptcha",
            CaptchaKind::Hcaptcha => "h-captcha",
            CaptchaKind::Turnstile => "cf-turnstile",
        }
    }

    /// Form field the provider's widget writes its token into.
    pub fn token_field(self) -> &'static str {
        match self {
            CaptchaKind::Recaptcha => "g-recaptcha-response",
            CaptchaKind::Hcaptcha => "h-captcha-response",
            CaptchaKind::Turnstile => "cf-turnstile-response",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptchaConfig {
    None,
    Siteverify {
        kind: CaptchaKind,
        secret: String,
        site_key: Option<String>,
        verify_url: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyConfig {
    None,
    Telegram {
        bot_token: String,
        chat_id: String,
        api_base: String,
    },
    TwilioWhatsapp {
        account_sid: String,
        auth_token: String,
        from: String,
        to: String,
        api_base: String,
    },
    UltraMsg {
        instance_id: String,
        token: String,
        to: String,
        api_base: String,
    },
    Webhook {
        url: String,
    },
    Email(SmtpConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeepAliveConfig {
    pub url: String,
    pub interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env.required("DATABASE_URL")?;

        let host: IpAddr = env
            .or("ECOLIM_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid ECOLIM_HOST: {e}"))?;

        let port: u16 = env
            .get("PORT")
            .or_else(|| env.get("ECOLIM_PORT"))
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map_err(|e| format!("Invalid PORT: {e}"))?;

        let log_level = env.or("ECOLIM_LOG_LEVEL", "info");

        let max_body_size: usize = env.parsed("ECOLIM_MAX_BODY_SIZE", 65_536)?;

        let trusted_proxies: Vec<IpNet> = split_list(&env.or("ECOLIM_TRUSTED_PROXIES", ""))
            .into_iter()
            .map(|s| {
                s.parse()
                    .map_err(|e| format!("Invalid ECOLIM_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cors_origins = split_list(&env.or("ECOLIM_CORS_ORIGINS", ""))
            .into_iter()
            .map(str::to_string)
            .collect();

        let db = PoolConfig {
            max_connections: env.parsed("ECOLIM_DB_MAX_CONNECTIONS", 5)?,
            recycle: env.positive_secs("ECOLIM_DB_RECYCLE_SECS", 280)?,
        };

        let rate_limits = split_list(&env.or("ECOLIM_RATE_LIMITS", "5/minute,50/hour,200/day"))
            .into_iter()
            .map(|s| {
                s.parse::<Quota>()
                    .map_err(|e| format!("Invalid ECOLIM_RATE_LIMITS entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let http = HttpConfig {
            timeout: env.positive_secs("ECOLIM_HTTP_TIMEOUT_SECS", 10)?,
            max_attempts: env.parsed::<u32>("ECOLIM_HTTP_MAX_ATTEMPTS", 3)?.max(1),
            backoff: Duration::from_millis(env.parsed("ECOLIM_HTTP_BACKOFF_MS", 500)?),
        };

        let captcha = captcha_from(&env)?;
        let notify = notify_from(&env)?;

        let keepalive = match env.get("ECOLIM_KEEPALIVE_URL").or_else(|| env.get("RENDER_EXTERNAL_URL")) {
            Some(url) => Some(KeepAliveConfig {
                url,
                interval: env.positive_secs("ECOLIM_KEEPALIVE_INTERVAL_SECS", 240)?,
            }),
            None => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            log_level,
            max_body_size,
            trusted_proxies,
            cors_origins,
            db,
            rate_limits,
            success_redirect: env.get("ECOLIM_SUCCESS_REDIRECT"),
            honeypot_field: env.get("ECOLIM_HONEYPOT_FIELD"),
            http,
            captcha,
            notify,
            notify_template: env.get("ECOLIM_NOTIFY_TEMPLATE"),
            keepalive,
        })
    }
}

fn captcha_from<F>(env: &Env<F>) -> Result<CaptchaConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    let kind = match env.or("ECOLIM_CAPTCHA_PROVIDER", "none").to_lowercase().as_str() {
        "none" | "" => return Ok(CaptchaConfig::None),
        "recaptcha" | "google_recaptcha" => CaptchaKind::Recaptcha,
        "hcaptcha" => CaptchaKind::Hcaptcha,
        "turnstile" => CaptchaKind::Turnstile,
        other => return Err(format!("Unknown ECOLIM_CAPTCHA_PROVIDER: {other}")),
    };

    let secret = env
        .get("ECOLIM_CAPTCHA_SECRET")
        .or_else(|| env.get("RECAPTCHA_SECRET_KEY"))
        .ok_or_else(|| "ECOLIM_CAPTCHA_SECRET is required when a CAPTCHA provider is set".to_string())?;

    Ok(CaptchaConfig::Siteverify {
        kind,
        secret,
        site_key: env.get("ECOLIM_CAPTCHA_SITE_KEY"),
        verify_url: env.or("ECOLIM_CAPTCHA_VERIFY_URL", kind.default_verify_url()),
    })
}

fn notify_from<F>(env: &Env<F>) -> Result<NotifyConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    let channel = env.or("ECOLIM_NOTIFY_CHANNEL", "none").to_lowercase();
    let config = match channel.as_str() {
        "none" | "" => NotifyConfig::None,
        "telegram" => NotifyConfig::Telegram {
            bot_token: env.required("TELEGRAM_BOT_TOKEN")?,
            chat_id: env.required("TELEGRAM_CHAT_ID")?,
            api_base: env.or("TELEGRAM_API_BASE", "https://api.telegram.org"),
        },
        "twilio_whatsapp" | "twilio" => NotifyConfig::TwilioWhatsapp {
            account_sid: env.required("TWILIO_ACCOUNT_SID")?,
            auth_token: env.required("TWILIO_AUTH_TOKEN")?,
            from: env.required("TWILIO_WHATSAPP_FROM")?,
            to: env.required("TWILIO_WHATSAPP_TO")?,
            api_base: env.or("TWILIO_API_BASE", "https://api.twilio.com"),
        },
        "ultramsg" => NotifyConfig::UltraMsg {
            instance_id: env.required("ULTRAMSG_INSTANCE_ID")?,
            token: env.required("ULTRAMSG_TOKEN")?,
            to: env.required("ULTRAMSG_TO")?,
            api_base: env.or("ULTRAMSG_API_BASE", "https://api.ultramsg.com"),
        },
        "webhook" | "generic_webhook" => NotifyConfig::Webhook {
            url: env.required("ECOLIM_NOTIFY_WEBHOOK_URL")?,
        },
        "email" | "smtp" => NotifyConfig::Email(SmtpConfig {
            host: env.required("ECOLIM_SMTP_HOST")?,
            port: env.parsed("ECOLIM_SMTP_PORT", 587)?,
            user: env.required("ECOLIM_SMTP_USER")?,
            pass: env.required("ECOLIM_SMTP_PASS")?,
            from: env.required("ECOLIM_SMTP_FROM")?,
            to: env.required("ECOLIM_SMTP_TO")?,
        }),
        other => return Err(format!("Unknown ECOLIM_NOTIFY_CHANNEL: {other}")),
    };
    Ok(config)
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, String> {
        self.get(key)
            .ok_or_else(|| format!("Missing required environment variable: {key}"))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(v) => v.trim().parse().map_err(|e| format!("Invalid {key}: {e}")),
            None => Ok(default),
        }
    }

    /// Whole seconds, zero rejected.
    fn positive_secs(&self, key: &str, default: u64) -> Result<Duration, String> {
        match self.parsed(key, default)? {
            0 => Err(format!("Invalid {key}: must be greater than zero")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/ecolim")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.captcha, CaptchaConfig::None);
        assert_eq!(config.notify, NotifyConfig::None);
        assert!(config.keepalive.is_none());
        assert_eq!(config.rate_limits.len(), 3);
        assert_eq!(config.http.timeout, Duration::from_secs(10));
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.db.recycle, Duration::from_secs(280));
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = load(&[]).unwrap_err();
        assert!(err.contains("DATABASE_URL"));
    }

    #[test]
    fn port_prefers_platform_variable() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("PORT", "8080"),
            ("ECOLIM_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn recaptcha_accepts_legacy_secret_name() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_CAPTCHA_PROVIDER", "recaptcha"),
            ("RECAPTCHA_SECRET_KEY", "s3cret"),
        ])
        .unwrap();
        match config.captcha {
            CaptchaConfig::Siteverify { kind, secret, verify_url, .. } => {
                assert_eq!(kind, CaptchaKind::Recaptcha);
                assert_eq!(secret, "s3cret");
                assert!(verify_url.contains("google.com/recaptcha"));
            }
            other => panic!("unexpected captcha config: {other:?}"),
        }
    }

    #[test]
    fn captcha_provider_without_secret_fails() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_CAPTCHA_PROVIDER", "turnstile"),
        ])
        .unwrap_err();
        assert!(err.contains("ECOLIM_CAPTCHA_SECRET"));
    }

    #[test]
    fn telegram_channel_requires_chat_id() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_NOTIFY_CHANNEL", "telegram"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ])
        .unwrap_err();
        assert!(err.contains("TELEGRAM_CHAT_ID"));
    }

    #[test]
    fn twilio_channel_resolves() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_NOTIFY_CHANNEL", "twilio_whatsapp"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_WHATSAPP_FROM", "whatsapp:+14155238886"),
            ("TWILIO_WHATSAPP_TO", "whatsapp:+56912345678"),
        ])
        .unwrap();
        assert!(matches!(config.notify, NotifyConfig::TwilioWhatsapp { ref api_base, .. } if api_base == "https://api.twilio.com"));
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_NOTIFY_CHANNEL", "pigeon"),
        ])
        .unwrap_err();
        assert!(err.contains("pigeon"));
    }

    #[test]
    fn keepalive_falls_back_to_render_url() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("RENDER_EXTERNAL_URL", "https://ecolim.onrender.com"),
            ("ECOLIM_KEEPALIVE_INTERVAL_SECS", "30"),
        ])
        .unwrap();
        let keepalive = config.keepalive.unwrap();
        assert_eq!(keepalive.url, "https://ecolim.onrender.com");
        assert_eq!(keepalive.interval, Duration::from_secs(30));
    }

    #[test]
    fn bad_trusted_proxy_is_reported() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_TRUSTED_PROXIES", "10.0.0.0/8, nonsense"),
        ])
        .unwrap_err();
        assert!(err.contains("nonsense"));
    }

    #[test]
    fn zero_keepalive_interval_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ECOLIM_KEEPALIVE_URL", "https://ecolim.onrender.com/healthz"),
            ("ECOLIM_KEEPALIVE_INTERVAL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(err.contains("ECOLIM_KEEPALIVE_INTERVAL_SECS"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for key in ["ECOLIM_HTTP_TIMEOUT_SECS", "ECOLIM_DB_RECYCLE_SECS"] {
            let err = load(&[("DATABASE_URL", "postgres://x/y"), (key, "0")]).unwrap_err();
            assert!(err.contains(key), "{key}: {err}");
        }
    }
}
