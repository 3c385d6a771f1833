#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode as AxumStatus, Uri};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use ecolim::config::Config;
use ecolim::db::{StoreResult, SubmissionStore};
use ecolim::models::{NewSubmission, Submission};

pub const ANA: [(&str, &str); 4] = [
    ("nombre", "Ana"),
    ("telefono", "912345678"),
    ("descripcion", "Limpieza de alfombras"),
    ("servicio", "limpieza"),
];

/// Store that keeps rows in memory, or fails every insert like a dropped
/// database connection.
#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<Submission>>,
    pub fail: bool,
    pub attempts: Mutex<u32>,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Submission> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, s: &NewSubmission) -> StoreResult<Submission> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "server closed the connection unexpectedly",
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = Submission {
            id: rows.len() as i64 + 1,
            name: s.name.clone(),
            phone: s.phone.clone(),
            email: s.email.clone(),
            description: s.description.clone(),
            service_type: s.service_type.clone(),
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }
}

/// One request seen by the mock provider server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub body: String,
    pub authorization: Option<String>,
}

/// Stand-in for CAPTCHA and messaging providers.
///
/// - `*/siteverify`: success only for the token `valid-token`
/// - `/down*`: always 503
/// - `/slow*`: answers only after 5 s
/// - `*/sendMessage`: Telegram, `chat_id` "fail" is rejected
/// - anything else: 200 `{"sent": "true"}`
pub struct MockProvider {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockProvider {
    pub async fn spawn() -> Self {
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();
        let recorder = requests.clone();

        let app = axum::Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: Bytes| {
            let recorder = recorder.clone();
            async move {
                let body = String::from_utf8_lossy(&body).into_owned();
                let path = uri.path().to_string();
                recorder.lock().unwrap().push(Recorded {
                    path: path.clone(),
                    body: body.clone(),
                    authorization: headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                });

                if path.starts_with("/slow") {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    return Json(json!({ "success": true })).into_response();
                }
                if path.starts_with("/down") {
                    return (AxumStatus::SERVICE_UNAVAILABLE, "unavailable").into_response();
                }
                if path.ends_with("/siteverify") {
                    let valid = form_urlencoded::parse(body.as_bytes())
                        .any(|(k, v)| k == "response" && v == "valid-token");
                    let reply = if valid {
                        json!({ "success": true })
                    } else {
                        json!({ "success": false, "error-codes": ["invalid-input-response"] })
                    };
                    return Json(reply).into_response();
                }
                if path.ends_with("/sendMessage") {
                    if body.contains(r#""chat_id":"fail""#) {
                        return (
                            AxumStatus::BAD_REQUEST,
                            Json(json!({ "ok": false, "description": "Bad Request: chat not found" })),
                        )
                            .into_response();
                    }
                    return Json(json!({ "ok": true, "result": {} })).into_response();
                }
                Json(json!({ "sent": "true", "message": "ok" })).into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn matching(&self, needle: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path.contains(needle))
            .cloned()
            .collect()
    }

    /// Poll until at least `count` requests hit a path containing `needle`.
    pub async fn wait_for(&self, needle: &str, count: usize) -> Vec<Recorded> {
        for _ in 0..200 {
            let seen = self.matching(needle);
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.matching(needle)
    }
}

/// A running app instance backed by an in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub mock: MockProvider,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Submit form-urlencoded data, return (body, status).
    pub async fn submit_form(&self, path: &str, data: &[(&str, &str)]) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .form(data)
            .send()
            .await
            .expect("submit form failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn submit(&self, data: &[(&str, &str)]) -> (Value, StatusCode) {
        self.submit_form("/submit", data).await
    }
}

/// Ana's form plus extra fields.
pub fn ana_with<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut form = ANA.to_vec();
    form.extend_from_slice(extra);
    form
}

/// Spawn the app with the given environment. `{mock}` in a value is replaced
/// by the mock provider's base URL.
pub async fn spawn_app(vars: &[(&str, &str)]) -> TestApp {
    spawn_app_with_store(MemoryStore::default(), vars).await
}

pub async fn spawn_app_with_store(store: MemoryStore, vars: &[(&str, &str)]) -> TestApp {
    let mock = MockProvider::spawn().await;
    let base = format!("http://{}", mock.addr);

    let mut env: Vec<(String, String)> = vec![
        ("DATABASE_URL".into(), "postgres://unused/ecolim".into()),
        ("ECOLIM_HTTP_BACKOFF_MS".into(), "5".into()),
        ("ECOLIM_HTTP_TIMEOUT_SECS".into(), "2".into()),
    ];
    for (k, v) in vars {
        env.retain(|(key, _)| key != k);
        env.push((k.to_string(), v.replace("{mock}", &base)));
    }

    let config = Config::from_lookup(|key| {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("invalid test configuration");

    let store = Arc::new(store);
    let state = ecolim::build_state(config, store.clone()).expect("failed to build state");
    let app = ecolim::build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        store,
        mock,
        client,
    }
}
