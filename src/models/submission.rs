use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub description: String,
    pub service_type: String,
    pub created_at: DateTime<Utc>,
}

/// A validated submission ready to be inserted. Fields are already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSubmission {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub description: String,
    pub service_type: String,
}
