//! The catalog pass: fetch the term listing, parse every class panel, and
//! upsert courses, sections, and professor stubs.
//!
//! Panels are processed in small concurrent groups with a pause between
//! groups; the source is a shared university system and bursts get throttled.

use crate::catalog::client::CatalogClient;
use crate::catalog::detail::{self, DetailFields, DiscussionRow};
use crate::catalog::panels::{self, PanelSummary};
use crate::data::{courses, professors, schools, sections};
use crate::data::courses::{CourseFields, subject_prefix};
use crate::data::sections::SectionFields;
use anyhow::{Context, Result};
use futures::future::join_all;
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Panels fetched concurrently per group.
const PANEL_BATCH: usize = 8;
/// Pause between groups.
const BATCH_DELAY: Duration = Duration::from_millis(750);

/// Primary section kind; associated rows carry their own kind from the
/// detail page (DIS, LAB, SEC, STU).
const LECTURE_KIND: &str = "LEC";

#[derive(Debug, Default)]
pub struct ScrapeSummary {
    pub panels_seen: usize,
    pub classes_saved: usize,
    pub sections_saved: usize,
    pub detail_failures: usize,
    pub panel_failures: usize,
    pub professors_seen: usize,
}

struct PanelOutcome {
    sections_saved: usize,
    detail_failed: bool,
    professor: Option<String>,
}

/// Run one full catalog pass for a term.
///
/// School creation and the listing fetch are fatal; individual panels are
/// skip-and-continue so one broken class can't sink the pass.
pub async fn run(
    pool: &PgPool,
    client: &CatalogClient,
    school_name: &str,
    term: &str,
) -> Result<ScrapeSummary> {
    let school_id = schools::ensure_school(pool, school_name).await?;

    let body = client
        .search(term)
        .await
        .with_context(|| format!("listing fetch failed for term {term}"))?;
    let panels = panels::parse_listing(&body);
    info!(term, panels = panels.len(), "parsed term listing");

    let mut summary = ScrapeSummary {
        panels_seen: panels.len(),
        ..Default::default()
    };
    let mut professor_names: HashSet<String> = HashSet::new();

    for group in panels.chunks(PANEL_BATCH) {
        let results = join_all(
            group
                .iter()
                .map(|panel| process_panel(pool, client, school_id, panel)),
        )
        .await;

        for (panel, result) in group.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    summary.classes_saved += 1;
                    summary.sections_saved += outcome.sections_saved;
                    if outcome.detail_failed {
                        summary.detail_failures += 1;
                    }
                    if let Some(name) = outcome.professor {
                        professor_names.insert(name);
                    }
                }
                Err(e) => {
                    summary.panel_failures += 1;
                    warn!(
                        course = panel.course_code.as_str(),
                        section = panel.section_number.as_str(),
                        error = %e,
                        "panel failed, skipping"
                    );
                }
            }
        }

        sleep(BATCH_DELAY).await;
    }

    summary.professors_seen = professor_names.len();
    info!(
        panels = summary.panels_seen,
        classes = summary.classes_saved,
        sections = summary.sections_saved,
        detail_failures = summary.detail_failures,
        panel_failures = summary.panel_failures,
        professors = summary.professors_seen,
        "catalog pass complete"
    );

    Ok(summary)
}

/// Persist one class panel: course row, lecture section, professor stub,
/// and any associated discussion sections hanging off the lecture.
async fn process_panel(
    pool: &PgPool,
    client: &CatalogClient,
    school_id: i32,
    panel: &PanelSummary,
) -> Result<PanelOutcome> {
    // A missing or broken detail page degrades the record, never drops it.
    let (fields, discussions, detail_failed) = match &panel.detail_href {
        Some(href) => match client.detail_page(href).await {
            Ok(body) => (
                detail::parse_detail(&body, &panel.course_code),
                detail::parse_discussions(&body),
                false,
            ),
            Err(e) => {
                warn!(
                    course = panel.course_code.as_str(),
                    error = %e,
                    "detail fetch failed, falling back to listing data"
                );
                (DetailFields::default(), Vec::new(), true)
            }
        },
        None => {
            debug!(course = panel.course_code.as_str(), "panel has no detail link");
            (DetailFields::default(), Vec::new(), false)
        }
    };

    let course_id = courses::upsert_course(
        pool,
        school_id,
        &CourseFields {
            code: panel.course_code.clone(),
            title: fields.title.clone().unwrap_or_else(|| panel.title.clone()),
            department: subject_prefix(&panel.course_code),
            credits: fields.credits,
            ge: fields.ge.clone(),
            prerequisites: fields.prerequisites.clone(),
            description: fields.description.clone(),
            career: fields.career.clone(),
            grading: fields.grading.clone(),
        },
    )
    .await?;

    let instructor = htmlize::unescape(&panel.instructor).trim().to_string();
    let professor = professors::ensure_professor(pool, &instructor)
        .await?
        .map(|_| instructor.clone());

    let (days, start_time, end_time) = panels::parse_meeting(&panel.meeting);
    let lecture_code = section_code(&panel.course_code, &panel.section_number);
    let lecture_id = sections::upsert_section(
        pool,
        course_id,
        None,
        &SectionFields {
            section_code: lecture_code,
            section_number: panel.section_number.clone(),
            kind: LECTURE_KIND.to_string(),
            instructor: instructor.clone(),
            days,
            start_time,
            end_time,
            location: panel.location.clone(),
            enrolled: panel.enrolled,
            capacity: panel.capacity,
            status: panel.status.as_str().to_string(),
            class_number: fields.class_number,
            instruction_mode: fields.instruction_mode.clone(),
        },
    )
    .await?;

    let mut sections_saved = 1;
    for row in &discussions {
        save_discussion(pool, course_id, lecture_id, panel, &instructor, row).await?;
        sections_saved += 1;
    }

    Ok(PanelOutcome {
        sections_saved,
        detail_failed,
        professor,
    })
}

async fn save_discussion(
    pool: &PgPool,
    course_id: i32,
    lecture_id: i32,
    panel: &PanelSummary,
    instructor: &str,
    row: &DiscussionRow,
) -> Result<()> {
    sections::upsert_section(
        pool,
        course_id,
        Some(lecture_id),
        &SectionFields {
            section_code: section_code(&panel.course_code, &row.section_number),
            section_number: row.section_number.clone(),
            kind: row.kind.clone(),
            instructor: instructor.to_string(),
            days: row.days.clone(),
            start_time: row.start_time.clone(),
            end_time: row.end_time.clone(),
            location: row.location.clone(),
            enrolled: row.enrolled,
            capacity: row.capacity,
            status: row.status.as_str().to_string(),
            class_number: None,
            instruction_mode: None,
        },
    )
    .await?;

    Ok(())
}

/// Natural key for a section: course code plus section number. Term is
/// deliberately absent so a re-scrape under a new term updates the same
/// rows in place instead of accreting per-term copies.
fn section_code(course_code: &str, section_number: &str) -> String {
    format!("{course_code} {section_number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_code_is_code_plus_number() {
        assert_eq!(section_code("CSE 101", "01"), "CSE 101 01");
        // Discussion numbers carry their letter, so lecture and discussion
        // keys never collide within a course.
        assert_ne!(section_code("CSE 101", "01"), section_code("CSE 101", "01A"));
    }
}
