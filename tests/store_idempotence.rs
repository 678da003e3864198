//! Store-level behavior: natural-key upserts must be idempotent and
//! re-runnable, since every batch job reprocesses the full catalog.

use catalog::data::courses::{self, CourseFields};
use catalog::data::professors;
use catalog::data::schools;
use catalog::data::sections::{self, SectionFields};
use catalog::ratings::{MergedRatings, NormalizedReview};
use sqlx::PgPool;

fn course_fields(code: &str, title: &str) -> CourseFields {
    CourseFields {
        code: code.to_string(),
        title: title.to_string(),
        department: "CSE".to_string(),
        credits: Some(5),
        ge: None,
        prerequisites: Some("CSE 30".to_string()),
        description: Some("Introduction to data structures.".to_string()),
        career: Some("Undergraduate".to_string()),
        grading: Some("Graded".to_string()),
    }
}

fn section_fields(section_code: &str, kind: &str, enrolled: i32) -> SectionFields {
    SectionFields {
        section_code: section_code.to_string(),
        section_number: "01".to_string(),
        kind: kind.to_string(),
        instructor: "Tantalo, Patrick".to_string(),
        days: "MWF".to_string(),
        start_time: Some("9:20AM".to_string()),
        end_time: Some("10:25AM".to_string()),
        location: "Kresge Clrm 327".to_string(),
        enrolled,
        capacity: 120,
        status: "Open".to_string(),
        class_number: Some(40584),
        instruction_mode: Some("In Person".to_string()),
    }
}

#[sqlx::test]
async fn ensure_school_is_idempotent(pool: PgPool) -> anyhow::Result<()> {
    let first = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    let second = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    assert_eq!(first, second);

    let other = schools::ensure_school(&pool, "UC Berkeley").await?;
    assert_ne!(first, other);
    Ok(())
}

#[sqlx::test]
async fn course_upsert_reuses_row_and_refreshes_fields(pool: PgPool) -> anyhow::Result<()> {
    let school_id = schools::ensure_school(&pool, "UC Santa Cruz").await?;

    let first = courses::upsert_course(&pool, school_id, &course_fields("CSE 101", "Data Structs")).await?;
    let second =
        courses::upsert_course(&pool, school_id, &course_fields("CSE 101", "Data Structures & Algorithms")).await?;
    assert_eq!(first, second);

    let (title,): (String,) = sqlx::query_as("SELECT title FROM courses WHERE id = $1")
        .bind(first)
        .fetch_one(&pool)
        .await?;
    assert_eq!(title, "Data Structures & Algorithms");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[sqlx::test]
async fn course_code_is_scoped_to_school(pool: PgPool) -> anyhow::Result<()> {
    let ucsc = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    let ucb = schools::ensure_school(&pool, "UC Berkeley").await?;

    let a = courses::upsert_course(&pool, ucsc, &course_fields("CSE 101", "Data Structures")).await?;
    let b = courses::upsert_course(&pool, ucb, &course_fields("CSE 101", "Data Structures")).await?;
    assert_ne!(a, b);
    Ok(())
}

#[sqlx::test]
async fn section_upsert_is_idempotent_and_updates_enrollment(pool: PgPool) -> anyhow::Result<()> {
    let school_id = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    let course_id =
        courses::upsert_course(&pool, school_id, &course_fields("CSE 101", "Data Structures")).await?;

    let first = sections::upsert_section(
        &pool,
        course_id,
        None,
        &section_fields("CSE 101 01", "LEC", 80),
    )
    .await?;
    let second = sections::upsert_section(
        &pool,
        course_id,
        None,
        &section_fields("CSE 101 01", "LEC", 95),
    )
    .await?;
    assert_eq!(first, second);

    let (enrolled,): (i32,) = sqlx::query_as("SELECT enrolled FROM sections WHERE id = $1")
        .bind(first)
        .fetch_one(&pool)
        .await?;
    assert_eq!(enrolled, 95);
    Ok(())
}

#[sqlx::test]
async fn discussion_sections_resolve_parent_lecture(pool: PgPool) -> anyhow::Result<()> {
    let school_id = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    let course_id =
        courses::upsert_course(&pool, school_id, &course_fields("CSE 101", "Data Structures")).await?;

    let lecture_id = sections::upsert_section(
        &pool,
        course_id,
        None,
        &section_fields("CSE 101 01", "LEC", 80),
    )
    .await?;
    let discussion_id = sections::upsert_section(
        &pool,
        course_id,
        Some(lecture_id),
        &section_fields("CSE 101 01A", "DIS", 20),
    )
    .await?;

    let (parent_id,): (Option<i32>,) = sqlx::query_as("SELECT parent_id FROM sections WHERE id = $1")
        .bind(discussion_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(parent_id, Some(lecture_id));
    Ok(())
}

#[sqlx::test]
async fn staff_placeholder_gets_no_professor_row(pool: PgPool) -> anyhow::Result<()> {
    assert_eq!(professors::ensure_professor(&pool, "Staff").await?, None);
    assert_eq!(professors::ensure_professor(&pool, "  ").await?, None);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM professors")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[sqlx::test]
async fn professor_rows_are_keyed_by_name(pool: PgPool) -> anyhow::Result<()> {
    let first = professors::ensure_professor(&pool, "Tantalo, Patrick").await?;
    let second = professors::ensure_professor(&pool, "Tantalo, Patrick").await?;
    assert!(first.is_some());
    assert_eq!(first, second);
    Ok(())
}

#[sqlx::test]
async fn ghost_links_stay_in_the_unresolved_set(pool: PgPool) -> anyhow::Result<()> {
    let id = professors::ensure_professor(&pool, "Long, Darrell")
        .await?
        .unwrap();

    // Freshly created, no link: unresolved.
    let unresolved = professors::unresolved(&pool).await?;
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].rmp_id, None);

    // Linked but zero verified reviews: still retried, stored id visible.
    professors::set_rmp_link(&pool, id, "VGVhY2hlci0x").await?;
    let unresolved = professors::unresolved(&pool).await?;
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].rmp_id.as_deref(), Some("VGVhY2hlci0x"));

    // Reviews arrive: drops out of the unresolved set.
    sqlx::query("UPDATE professors SET num_ratings = 12 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    assert!(professors::unresolved(&pool).await?.is_empty());

    let resolved = professors::resolved(&pool).await?;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].2, "VGVhY2hlci0x");
    Ok(())
}

#[sqlx::test]
async fn taught_course_codes_follow_the_instructor_field(pool: PgPool) -> anyhow::Result<()> {
    let school_id = schools::ensure_school(&pool, "UC Santa Cruz").await?;
    let cse101 =
        courses::upsert_course(&pool, school_id, &course_fields("CSE 101", "Data Structures")).await?;
    let cse13s = courses::upsert_course(&pool, school_id, &course_fields("CSE 13S", "Systems")).await?;

    sections::upsert_section(&pool, cse101, None, &section_fields("CSE 101 01", "LEC", 80))
        .await?;
    sections::upsert_section(&pool, cse13s, None, &section_fields("CSE 13S 01", "LEC", 60))
        .await?;

    let codes = professors::taught_course_codes(&pool, "Tantalo, Patrick").await?;
    assert_eq!(codes, vec!["CSE 101".to_string(), "CSE 13S".to_string()]);

    assert!(professors::taught_course_codes(&pool, "Nobody, Else").await?.is_empty());
    Ok(())
}

#[sqlx::test]
async fn save_ratings_replaces_reviews_wholesale(pool: PgPool) -> anyhow::Result<()> {
    let id = professors::ensure_professor(&pool, "Tantalo, Patrick")
        .await?
        .unwrap();

    let review = |comment: &str| NormalizedReview {
        comment: comment.to_string(),
        posted_at: None,
        course: Some("CSE101".to_string()),
        grade: Some("A".to_string()),
        rating: 4.5,
        difficulty: 3.0,
        would_retake: Some(true),
    };

    let first = MergedRatings {
        rating: 4.2,
        difficulty: 3.1,
        count: 3,
        would_retake_pct: Some(85.7),
        reviews: vec![review("great"), review("tough but fair"), review("take it")],
    };
    professors::save_ratings(&pool, id, "Patrick Tantalo", &first).await?;

    let second = MergedRatings {
        rating: 4.0,
        difficulty: 3.3,
        count: 2,
        would_retake_pct: None,
        reviews: vec![review("solid"), review("good")],
    };
    professors::save_ratings(&pool, id, "Patrick Tantalo", &second).await?;

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM professor_reviews WHERE professor_id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(count, 2);

    let (rating, pct): (Option<f64>, Option<f64>) =
        sqlx::query_as("SELECT avg_rating, would_retake_pct FROM professors WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(rating, Some(4.0));
    assert_eq!(pct, None);
    Ok(())
}
