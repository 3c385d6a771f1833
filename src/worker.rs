use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::KeepAliveConfig;
use crate::state::SharedState;

/// How often stale rate-limiter windows are dropped.
const LIMITER_SWEEP: Duration = Duration::from_secs(10 * 60);

/// Start every background loop. Each stops when `shutdown` flips to true.
pub fn spawn_all(
    state: &SharedState,
    client: reqwest::Client,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = vec![spawn_limiter_sweep(state.clone(), shutdown.clone())];

    if let Some(keepalive) = state.config.keepalive.clone() {
        handles.push(spawn_keepalive(keepalive, client, shutdown));
    } else {
        tracing::debug!("Keep-alive disabled");
    }

    handles
}

/// Periodically GET our own public URL so the host does not idle us out.
/// Failures are logged and never reach request handling.
pub fn spawn_keepalive(
    config: KeepAliveConfig,
    client: reqwest::Client,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Keep-alive pinging {} every {}s",
            config.url,
            config.interval.as_secs()
        );

        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => ping(&client, &config.url).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Keep-alive stopped");
    })
}

async fn ping(client: &reqwest::Client, url: &str) {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("Keep-alive ping ok ({})", resp.status());
        }
        Ok(resp) => {
            tracing::warn!("Keep-alive ping to {url} returned {}", resp.status());
        }
        Err(e) => {
            tracing::warn!("Keep-alive ping to {url} failed: {e}");
        }
    }
}

fn spawn_limiter_sweep(state: SharedState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + LIMITER_SWEEP, LIMITER_SWEEP);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    state.submission_limiter.cleanup();
                    tracing::debug!(
                        "Rate limiter sweep done, {} windows tracked",
                        state.submission_limiter.tracked()
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::routing::get;
    use axum::Router;

    use super::*;

    #[tokio::test]
    async fn keepalive_pings_until_shutdown() {
        let hits = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route(
                "/healthz",
                get(|State(hits): State<Arc<AtomicU32>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "ok"
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (tx, rx) = watch::channel(false);
        let handle = spawn_keepalive(
            KeepAliveConfig {
                url: format!("http://{addr}/healthz"),
                interval: Duration::from_millis(20),
            },
            reqwest::Client::new(),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("keep-alive did not stop")
            .unwrap();

        let seen = hits.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected repeated pings, got {seen}");
    }

    #[tokio::test]
    async fn keepalive_survives_unreachable_target() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, rx) = watch::channel(false);
        let handle = spawn_keepalive(
            KeepAliveConfig {
                url: format!("http://{addr}/"),
                interval: Duration::from_millis(10),
            },
            reqwest::Client::new(),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!handle.is_finished());
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("keep-alive did not stop")
            .unwrap();
    }
}
