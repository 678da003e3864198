//! Professor rows: opportunistic creation, RMP link management, and cached
//! rating persistence.

use crate::ratings::MergedRatings;
use anyhow::{Context, Result};
use sqlx::PgPool;

/// Placeholder instructor name the source uses for unassigned sections.
/// Never gets a professor row.
pub const STAFF_PLACEHOLDER: &str = "Staff";

/// Create a professor row for an instructor name if one doesn't exist.
///
/// Returns `None` for the "Staff" placeholder. Names are stored exactly as
/// they appear in section instructor fields ("Last, First"); that string is
/// the sole natural key on the internal side.
pub async fn ensure_professor(pool: &PgPool, name: &str) -> Result<Option<i32>> {
    let name = name.trim();
    if name.is_empty() || name == STAFF_PLACEHOLDER {
        return Ok(None);
    }

    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO professors (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to ensure professor {name}"))?;

    Ok(Some(id))
}

#[derive(Debug, sqlx::FromRow)]
pub struct UnresolvedProfessor {
    pub id: i32,
    pub name: String,
    pub rmp_id: Option<String>,
}

/// Professors needing resolution: never linked, or "ghost" links whose
/// external identity has zero verified reviews (subject to forced retry).
/// Ordered by name for stable batch progress output.
pub async fn unresolved(pool: &PgPool) -> Result<Vec<UnresolvedProfessor>> {
    sqlx::query_as(
        r#"
        SELECT id, name, rmp_id FROM professors
        WHERE rmp_id IS NULL OR COALESCE(num_ratings, 0) = 0
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await
    .context("failed to list unresolved professors")
}

/// Professors with a committed external identity, for the ratings pass.
pub async fn resolved(pool: &PgPool) -> Result<Vec<(i32, String, String)>> {
    sqlx::query_as(
        "SELECT id, name, rmp_id FROM professors WHERE rmp_id IS NOT NULL ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("failed to list resolved professors")
}

/// Distinct course codes a professor teaches, via the section instructor
/// field. Feeds the resolver's subject and exact-course signals.
pub async fn taught_course_codes(pool: &PgPool, name: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT c.code
        FROM courses c
        JOIN sections s ON s.course_id = c.id
        WHERE s.instructor = $1
        ORDER BY c.code
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to fetch courses for {name}"))?;

    Ok(rows.into_iter().map(|(code,)| code).collect())
}

/// Commit an external identity link.
pub async fn set_rmp_link(pool: &PgPool, professor_id: i32, rmp_id: &str) -> Result<()> {
    sqlx::query("UPDATE professors SET rmp_id = $1 WHERE id = $2")
        .bind(rmp_id)
        .bind(professor_id)
        .execute(pool)
        .await
        .context("failed to set professor link")?;

    Ok(())
}

/// Persist merged ratings and replace the professor's review list.
///
/// Delete-and-reinsert in one transaction: reviews carry no stable external
/// ids, so a composite-key upsert has nothing to key on.
pub async fn save_ratings(
    pool: &PgPool,
    professor_id: i32,
    resolved_name: &str,
    merged: &MergedRatings,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE professors SET
            resolved_name = $1,
            avg_rating = $2,
            avg_difficulty = $3,
            num_ratings = $4,
            would_retake_pct = $5,
            ratings_updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(resolved_name)
    .bind(merged.rating)
    .bind(merged.difficulty)
    .bind(merged.count)
    .bind(merged.would_retake_pct)
    .bind(professor_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM professor_reviews WHERE professor_id = $1")
        .bind(professor_id)
        .execute(&mut *tx)
        .await?;

    for review in &merged.reviews {
        sqlx::query(
            r#"
            INSERT INTO professor_reviews (
                professor_id, comment, posted_at, course, grade,
                rating, difficulty, would_retake
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(professor_id)
        .bind(&review.comment)
        .bind(review.posted_at)
        .bind(&review.course)
        .bind(&review.grade)
        .bind(review.rating)
        .bind(review.difficulty)
        .bind(review.would_retake)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.context("failed to save ratings")?;
    Ok(())
}
