//! Ratings retrieval and merging for linked professors.
//!
//! RMP's cached aggregates drift: the summary object sometimes reports zero
//! ratings (or zeroed averages) while the review list has entries. Merging
//! reconciles the two, preferring recomputed means when the summary looks
//! stale.

use crate::data::professors;
use crate::rmp::{RmpClient, TeacherReview, TeacherSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Fixed pause between professors; same endpoint sensitivity as resolution.
const RATINGS_DELAY: Duration = Duration::from_millis(1500);

/// One review, flattened to storage shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReview {
    pub comment: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub course: Option<String>,
    pub grade: Option<String>,
    pub rating: f64,
    pub difficulty: f64,
    pub would_retake: Option<bool>,
}

/// Reconciled aggregates plus the normalized review list, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRatings {
    pub rating: f64,
    pub difficulty: f64,
    pub count: i32,
    pub would_retake_pct: Option<f64>,
    pub reviews: Vec<NormalizedReview>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Flatten a raw review. The overall rating is the mean of the helpfulness
/// and clarity axes; a missing axis falls back to the other.
pub fn normalize_review(review: &TeacherReview) -> NormalizedReview {
    let rating = match (review.helpful_rating, review.clarity_rating) {
        (Some(h), Some(c)) => (h + c) / 2.0,
        (Some(h), None) => h,
        (None, Some(c)) => c,
        (None, None) => 0.0,
    };

    NormalizedReview {
        comment: review
            .comment
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string(),
        posted_at: review.posted_at,
        course: review
            .class
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        grade: review
            .grade
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string),
        rating,
        difficulty: review.difficulty_rating.unwrap_or(0.0),
        would_retake: review.would_take_again.map(|v| v == 1),
    }
}

/// True when the summary's aggregates can't be trusted and should be
/// recomputed from the fetched reviews.
fn summary_is_stale(summary: &TeacherSummary, fetched: usize) -> bool {
    summary.num_ratings == 0
        || (summary.num_ratings as usize) < fetched
        || (summary.avg_rating == 0.0 && summary.avg_difficulty == 0.0)
}

/// Reconcile summary aggregates with the fetched review list.
///
/// Stale summaries are replaced by means over the normalized reviews; all
/// stored aggregates are rounded to one decimal place. A would-take-again
/// percentage below zero is the API's "no data" sentinel and maps to `None`.
pub fn merge(summary: &TeacherSummary, raw_reviews: &[TeacherReview]) -> MergedRatings {
    let reviews: Vec<NormalizedReview> = raw_reviews.iter().map(normalize_review).collect();

    let (rating, difficulty, count) = if summary_is_stale(summary, reviews.len()) && !reviews.is_empty()
    {
        (
            mean(reviews.iter().map(|r| r.rating)),
            mean(reviews.iter().map(|r| r.difficulty)),
            reviews.len() as i32,
        )
    } else {
        (summary.avg_rating, summary.avg_difficulty, summary.num_ratings)
    };

    let would_retake_pct = if summary.would_take_again_pct < 0.0 {
        None
    } else {
        Some(round1(summary.would_take_again_pct))
    };

    MergedRatings {
        rating: round1(rating),
        difficulty: round1(difficulty),
        count,
        would_retake_pct,
        reviews,
    }
}

#[derive(Debug, Default)]
pub struct RatingsSummary {
    pub processed: usize,
    pub saved: usize,
    pub failures: usize,
}

/// Run the ratings pass over every linked professor, sequentially with a
/// fixed delay. Per-professor failures are logged and skipped.
pub async fn run(pool: &PgPool, rmp: &RmpClient) -> Result<RatingsSummary> {
    let targets = professors::resolved(pool).await?;
    info!(count = targets.len(), "starting ratings refresh");

    let mut summary = RatingsSummary::default();

    for (professor_id, name, rmp_id) in &targets {
        summary.processed += 1;
        match refresh_one(pool, rmp, *professor_id, rmp_id).await {
            Ok(count) => {
                summary.saved += 1;
                info!(name = name.as_str(), reviews = count, "ratings saved");
            }
            Err(e) => {
                summary.failures += 1;
                warn!(name = name.as_str(), error = %e, "ratings refresh failed, skipping");
            }
        }
        sleep(RATINGS_DELAY).await;
    }

    info!(
        processed = summary.processed,
        saved = summary.saved,
        failures = summary.failures,
        "ratings refresh complete"
    );

    Ok(summary)
}

async fn refresh_one(
    pool: &PgPool,
    rmp: &RmpClient,
    professor_id: i32,
    rmp_id: &str,
) -> Result<usize> {
    let (teacher, reviews) = rmp.teacher_with_reviews(rmp_id).await?;

    let merged = merge(&teacher, &reviews);
    let resolved_name = format!("{} {}", teacher.first_name.trim(), teacher.last_name.trim());

    professors::save_ratings(pool, professor_id, &resolved_name, &merged).await?;

    Ok(merged.reviews.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(rating: f64, difficulty: f64, count: i32, wta: f64) -> TeacherSummary {
        TeacherSummary {
            first_name: "Patrick".to_string(),
            last_name: "Tantalo".to_string(),
            avg_rating: rating,
            avg_difficulty: difficulty,
            num_ratings: count,
            would_take_again_pct: wta,
        }
    }

    fn review(helpful: f64, clarity: f64, difficulty: f64) -> TeacherReview {
        TeacherReview {
            helpful_rating: Some(helpful),
            clarity_rating: Some(clarity),
            difficulty_rating: Some(difficulty),
            ..TeacherReview::default()
        }
    }

    #[test]
    fn test_normalize_rating_is_axis_mean() {
        let r = normalize_review(&review(4.0, 5.0, 3.0));
        assert_eq!(r.rating, 4.5);
        assert_eq!(r.difficulty, 3.0);
    }

    #[test]
    fn test_normalize_missing_axis_falls_back() {
        let raw = TeacherReview {
            helpful_rating: None,
            clarity_rating: Some(4.0),
            ..TeacherReview::default()
        };
        assert_eq!(normalize_review(&raw).rating, 4.0);
    }

    #[test]
    fn test_normalize_would_retake() {
        let yes = TeacherReview {
            would_take_again: Some(1),
            ..TeacherReview::default()
        };
        let no = TeacherReview {
            would_take_again: Some(0),
            ..TeacherReview::default()
        };
        let unknown = TeacherReview::default();
        assert_eq!(normalize_review(&yes).would_retake, Some(true));
        assert_eq!(normalize_review(&no).would_retake, Some(false));
        assert_eq!(normalize_review(&unknown).would_retake, None);
    }

    #[test]
    fn test_merge_recomputes_when_count_zero() {
        // Zeroed summary, but five reviews exist: recompute from reviews.
        let reviews = vec![
            review(3.0, 3.0, 2.0),
            review(4.0, 4.0, 3.0),
            review(5.0, 5.0, 4.0),
            review(3.0, 3.0, 2.0),
            review(5.0, 5.0, 4.0),
        ];
        let merged = merge(&summary(0.0, 0.0, 0, -1.0), &reviews);
        assert_eq!(merged.rating, 4.0);
        assert_eq!(merged.difficulty, 3.0);
        assert_eq!(merged.count, 5);
        assert_eq!(merged.would_retake_pct, None);
    }

    #[test]
    fn test_merge_recomputes_when_count_below_fetched() {
        let reviews = vec![review(2.0, 2.0, 1.0), review(4.0, 4.0, 5.0)];
        let merged = merge(&summary(5.0, 1.0, 1, 50.0), &reviews);
        assert_eq!(merged.rating, 3.0);
        assert_eq!(merged.difficulty, 3.0);
        assert_eq!(merged.count, 2);
    }

    #[test]
    fn test_merge_recomputes_when_averages_both_zero() {
        let reviews = vec![review(4.0, 4.0, 2.0)];
        let merged = merge(&summary(0.0, 0.0, 10, 80.0), &reviews);
        assert_eq!(merged.rating, 4.0);
        assert_eq!(merged.count, 1);
        assert_eq!(merged.would_retake_pct, Some(80.0));
    }

    #[test]
    fn test_merge_trusts_fresh_summary() {
        let reviews = vec![review(1.0, 1.0, 5.0)];
        let merged = merge(&summary(4.2, 2.8, 37, 85.71), &reviews);
        assert_eq!(merged.rating, 4.2);
        assert_eq!(merged.difficulty, 2.8);
        assert_eq!(merged.count, 37);
        assert_eq!(merged.would_retake_pct, Some(85.7));
    }

    #[test]
    fn test_merge_stale_with_no_reviews_keeps_summary() {
        let merged = merge(&summary(0.0, 0.0, 0, -1.0), &[]);
        assert_eq!(merged.rating, 0.0);
        assert_eq!(merged.count, 0);
        assert!(merged.reviews.is_empty());
    }

    #[test]
    fn test_merge_rounds_to_one_decimal() {
        let reviews = vec![review(3.0, 4.0, 2.0), review(4.0, 4.0, 3.0), review(5.0, 5.0, 3.0)];
        // ratings: 3.5, 4.0, 5.0 -> mean 4.1666 -> 4.2
        let merged = merge(&summary(0.0, 0.0, 0, -1.0), &reviews);
        assert_eq!(merged.rating, 4.2);
        // difficulties: 2, 3, 3 -> 2.6666 -> 2.7
        assert_eq!(merged.difficulty, 2.7);
    }
}
