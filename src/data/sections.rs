use anyhow::{Context, Result};
use sqlx::PgPool;

/// Mutable section fields overwritten on every catalog pass.
///
/// `section_code` is the globally unique natural key (course code plus
/// section number) and the sole idempotency key for upsert.
#[derive(Debug, Clone)]
pub struct SectionFields {
    pub section_code: String,
    pub section_number: String,
    pub kind: String,
    pub instructor: String,
    pub days: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: String,
    pub enrolled: i32,
    pub capacity: i32,
    pub status: String,
    pub class_number: Option<i32>,
    pub instruction_mode: Option<String>,
}

/// Upsert a section by `section_code`, returning the row id.
///
/// Discussion rows pass the owning lecture's id as `parent_id`; lectures
/// pass `None`. The lecture must already exist when its discussions are
/// written, which the catalog pass guarantees by persisting the lecture
/// first within each class unit.
pub async fn upsert_section(
    pool: &PgPool,
    course_id: i32,
    parent_id: Option<i32>,
    fields: &SectionFields,
) -> Result<i32> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO sections (
            course_id, parent_id, section_code, section_number, kind,
            instructor, days, start_time, end_time, location,
            enrolled, capacity, status, class_number, instruction_mode, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW())
        ON CONFLICT (section_code)
        DO UPDATE SET
            course_id = EXCLUDED.course_id,
            parent_id = EXCLUDED.parent_id,
            section_number = EXCLUDED.section_number,
            kind = EXCLUDED.kind,
            instructor = EXCLUDED.instructor,
            days = EXCLUDED.days,
            start_time = EXCLUDED.start_time,
            end_time = EXCLUDED.end_time,
            location = EXCLUDED.location,
            enrolled = EXCLUDED.enrolled,
            capacity = EXCLUDED.capacity,
            status = EXCLUDED.status,
            class_number = EXCLUDED.class_number,
            instruction_mode = EXCLUDED.instruction_mode,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(parent_id)
    .bind(&fields.section_code)
    .bind(&fields.section_number)
    .bind(&fields.kind)
    .bind(&fields.instructor)
    .bind(&fields.days)
    .bind(&fields.start_time)
    .bind(&fields.end_time)
    .bind(&fields.location)
    .bind(fields.enrolled)
    .bind(fields.capacity)
    .bind(&fields.status)
    .bind(fields.class_number)
    .bind(&fields.instruction_mode)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert section {}", fields.section_code))?;

    Ok(id)
}
