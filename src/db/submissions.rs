use sqlx::{PgConnection, PgPool};

use crate::models::{NewSubmission, Submission};

pub async fn insert(
    conn: &mut PgConnection,
    submission: &NewSubmission,
) -> Result<Submission, sqlx::Error> {
    sqlx::query_as::<_, Submission>(
        "INSERT INTO submissions (name, phone, email, description, service_type)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&submission.name)
    .bind(&submission.phone)
    .bind(&submission.email)
    .bind(&submission.description)
    .bind(&submission.service_type)
    .fetch_one(conn)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM submissions")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
