use anyhow::{Context, Result};
use sqlx::PgPool;

/// Look up or create the school row by name, returning its id.
///
/// The no-op `DO UPDATE` keeps `RETURNING` populated on the conflict path.
pub async fn ensure_school(pool: &PgPool, name: &str) -> Result<i32> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO schools (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .context("failed to ensure school")?;

    Ok(id)
}
