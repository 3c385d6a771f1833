pub mod submissions;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::PoolConfig;
use crate::models::{NewSubmission, Submission};

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Append-only sink for accepted submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert one submission atomically. On error nothing is left behind.
    async fn insert(&self, submission: &NewSubmission) -> StoreResult<Submission>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn insert(&self, submission: &NewSubmission) -> StoreResult<Submission> {
        let mut tx = self.pool.begin().await?;

        let row = match submissions::insert(&mut tx, submission).await {
            Ok(row) => row,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback after failed insert also failed: {rollback_err}");
                }
                return Err(e);
            }
        };

        // A failed commit leaves nothing applied; the server rolls the transaction back.
        tx.commit().await?;
        Ok(row)
    }
}

/// Pool that pings connections before handing them out and recycles them
/// before the server side drops them for idleness.
pub async fn connect(database_url: &str, config: &PoolConfig) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .test_before_acquire(true)
        .max_lifetime(config.recycle)
        .idle_timeout(config.recycle.min(Duration::from_secs(600)))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}
