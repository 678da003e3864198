use anyhow::{Context, Result};
use sqlx::PgPool;

/// The alphabetic head of a course code: `"CSE 101"` -> `"CSE"`. Doubles
/// as the department a course belongs to and as the resolver's subject
/// signal.
pub fn subject_prefix(code: &str) -> String {
    code.chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_uppercase()
}

/// Mutable course fields overwritten on every catalog pass.
#[derive(Debug, Clone)]
pub struct CourseFields {
    pub code: String,
    pub title: String,
    pub department: String,
    pub credits: Option<i32>,
    pub ge: Option<String>,
    pub prerequisites: Option<String>,
    pub description: Option<String>,
    pub career: Option<String>,
    pub grading: Option<String>,
}

/// Upsert a course by its `(school_id, code)` natural key, returning the
/// row id. Existing rows are overwritten with the latest scrape; rows are
/// never deleted here.
pub async fn upsert_course(pool: &PgPool, school_id: i32, fields: &CourseFields) -> Result<i32> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO courses (
            school_id, code, title, department, credits, ge,
            prerequisites, description, career, grading, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        ON CONFLICT (school_id, code)
        DO UPDATE SET
            title = EXCLUDED.title,
            department = EXCLUDED.department,
            credits = EXCLUDED.credits,
            ge = EXCLUDED.ge,
            prerequisites = EXCLUDED.prerequisites,
            description = EXCLUDED.description,
            career = EXCLUDED.career,
            grading = EXCLUDED.grading,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(school_id)
    .bind(&fields.code)
    .bind(&fields.title)
    .bind(&fields.department)
    .bind(fields.credits)
    .bind(&fields.ge)
    .bind(&fields.prerequisites)
    .bind(&fields.description)
    .bind(&fields.career)
    .bind(&fields.grading)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert course {}", fields.code))?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_prefix() {
        assert_eq!(subject_prefix("CSE 101"), "CSE");
        assert_eq!(subject_prefix("Math 19A"), "MATH");
        assert_eq!(subject_prefix("101"), "");
    }
}
