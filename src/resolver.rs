//! Identity resolution: link internal professor names to RateMyProfessors
//! teacher nodes via multi-strategy search and a weighted scoring heuristic.
//!
//! This is best-effort linkage, not an authoritative identity system. False
//! positives below the confidence floor are accepted; the floor is the only
//! mitigation in scope.

use crate::data::courses::subject_prefix;
use crate::data::professors::{self, UnresolvedProfessor};
use crate::rmp::{RmpClient, TeacherCandidate};
use anyhow::Result;
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

// Scoring weights. A weighted-voting scheme: tune here, not inline.
/// Last-name mismatch: immediately disqualifying.
pub const SCORE_DISQUALIFIED: i32 = -100;
/// Last names match.
pub const SCORE_LAST_NAME: i32 = 2;
/// Candidate first name starts with the internal first initial.
pub const SCORE_FIRST_INITIAL: i32 = 2;
/// A reviewed course code shares a subject prefix with a taught subject.
pub const SCORE_SUBJECT_PREFIX: i32 = 5;
/// Candidate department text contains a department keyword hint.
pub const SCORE_DEPARTMENT_KEYWORD: i32 = 5;
/// A reviewed course code exactly equals a taught course code.
pub const SCORE_EXACT_COURSE: i32 = 10;
/// Candidate has at least one review.
pub const SCORE_HAS_REVIEWS: i32 = 20;
/// One extra point per review on top of [`SCORE_HAS_REVIEWS`], capped here.
pub const SCORE_REVIEW_BONUS_CAP: i32 = 5;
/// Minimum winning score for a link to be committed.
pub const MIN_LINK_SCORE: i32 = 5;

/// Last names at or below this length are ambiguous enough to always
/// trigger the broad last-name-only search.
const SHORT_LAST_NAME: usize = 3;

/// Fixed pause between professors; the search endpoint is rate-sensitive.
const RESOLVE_DELAY: Duration = Duration::from_millis(1500);

/// Subject-prefix to department-keyword hints, used both to build search
/// queries and to score candidate department text.
const DEPARTMENT_KEYWORDS: &[(&str, &[&str])] = &[
    ("AM", &["applied mathematics", "mathematics"]),
    ("ANTH", &["anthropology"]),
    ("ART", &["art", "fine arts"]),
    ("ASTR", &["astronomy", "physics"]),
    ("BIOC", &["biochemistry", "chemistry"]),
    ("BIOE", &["ecology", "biology"]),
    ("BIOL", &["biology"]),
    ("BME", &["biomolecular engineering", "engineering"]),
    ("CHEM", &["chemistry"]),
    ("CMPM", &["computational media", "computer science"]),
    ("CRWN", &["writing"]),
    ("CSE", &["computer science", "computer engineering"]),
    ("ECE", &["electrical engineering", "engineering"]),
    ("ECON", &["economics"]),
    ("EDUC", &["education"]),
    ("ENVS", &["environmental studies", "environmental science"]),
    ("FILM", &["film", "media"]),
    ("GAME", &["games", "computer science"]),
    ("HIS", &["history"]),
    ("LING", &["linguistics"]),
    ("LIT", &["literature", "english"]),
    ("MATH", &["mathematics"]),
    ("MUSC", &["music"]),
    ("OCEA", &["ocean sciences", "marine science"]),
    ("PHIL", &["philosophy"]),
    ("PHYS", &["physics"]),
    ("POLI", &["political science"]),
    ("PSYC", &["psychology"]),
    ("SOCY", &["sociology"]),
    ("STAT", &["statistics", "mathematics"]),
    ("THEA", &["theater", "fine arts"]),
    ("WRIT", &["writing", "english"]),
];

/// Split a stored `"Last, First Middle"` instructor name.
///
/// Returns the last name and the first-name token if present. Names without
/// a comma are treated as last-name-only. HTML entities are decoded first;
/// the source occasionally emits them inside names.
pub fn split_display_name(name: &str) -> Option<(String, Option<String>)> {
    let decoded = htmlize::unescape(name.trim()).to_string();
    if decoded.is_empty() {
        return None;
    }

    match decoded.split_once(',') {
        Some((last, first)) => {
            let last = last.trim();
            if last.is_empty() {
                return None;
            }
            let first_token = first
                .split_whitespace()
                .next()
                .map(|t| t.trim_end_matches('.').to_string())
                .filter(|t| !t.is_empty());
            Some((last.to_string(), first_token))
        }
        None => Some((decoded, None)),
    }
}

/// Department keywords for the subjects a professor teaches, first hint
/// first. Unknown prefixes contribute nothing.
pub fn department_hints(subjects: &[String]) -> Vec<&'static str> {
    let mut hints = Vec::new();
    for subject in subjects {
        for &(prefix, keywords) in DEPARTMENT_KEYWORDS {
            if subject == prefix {
                for &kw in keywords {
                    if !hints.contains(&kw) {
                        hints.push(kw);
                    }
                }
            }
        }
    }
    hints
}

/// Score one candidate against the internal professor's signals.
///
/// `course_codes` are internal codes like `"CSE 101"`; `subjects` their
/// prefixes. A last-name mismatch short-circuits to the disqualifying
/// sentinel regardless of other signals.
pub fn score_candidate(
    candidate: &TeacherCandidate,
    last_name: &str,
    first_initial: Option<char>,
    subjects: &[String],
    course_codes: &[String],
    hints: &[&str],
) -> i32 {
    if !candidate.last_name.trim().eq_ignore_ascii_case(last_name) {
        return SCORE_DISQUALIFIED;
    }

    let mut score = SCORE_LAST_NAME;

    if let Some(initial) = first_initial {
        let matches_initial = candidate
            .first_name
            .trim()
            .chars()
            .next()
            .is_some_and(|c| c.eq_ignore_ascii_case(&initial));
        if matches_initial {
            score += SCORE_FIRST_INITIAL;
        }
    }

    let candidate_prefixes: HashSet<String> = candidate
        .course_codes
        .iter()
        .map(|c| subject_prefix(c))
        .filter(|p| !p.is_empty())
        .collect();
    if subjects.iter().any(|s| candidate_prefixes.contains(s)) {
        score += SCORE_SUBJECT_PREFIX;
    }

    if let Some(dept) = candidate.department.as_deref() {
        let dept_lower = dept.to_lowercase();
        if hints.iter().any(|kw| dept_lower.contains(kw)) {
            score += SCORE_DEPARTMENT_KEYWORD;
        }
    }

    let internal_stripped: HashSet<String> = course_codes
        .iter()
        .map(|c| strip_whitespace_upper(c))
        .collect();
    if candidate
        .course_codes
        .iter()
        .any(|c| internal_stripped.contains(&strip_whitespace_upper(c)))
    {
        score += SCORE_EXACT_COURSE;
    }

    if candidate.num_ratings >= 1 {
        score += SCORE_HAS_REVIEWS + candidate.num_ratings.min(SCORE_REVIEW_BONUS_CAP);
    }

    score
}

fn strip_whitespace_upper(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Pick the winner: highest score, ties broken by encounter order (stable
/// sort). Returns `None` when the best score is below the commit floor.
pub fn select_best(scored: &[(TeacherCandidate, i32)]) -> Option<(&TeacherCandidate, i32)> {
    let mut ranked: Vec<&(TeacherCandidate, i32)> = scored.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let (candidate, score) = ranked.first()?;
    if *score >= MIN_LINK_SCORE {
        Some((candidate, *score))
    } else {
        None
    }
}

/// Outcome of weighing the scored candidates against the stored link.
#[derive(Debug)]
pub enum LinkDecision<'a> {
    /// Commit a new link to this candidate.
    Link(&'a TeacherCandidate, i32),
    /// The winner is already the stored link; suppress the redundant write.
    Unchanged(i32),
    /// No candidate at or above the commit floor.
    BelowFloor,
}

/// Decide whether the best-scoring candidate should be committed, given
/// the professor's currently stored external id.
pub fn decide_link<'a>(
    scored: &'a [(TeacherCandidate, i32)],
    stored_id: Option<&str>,
) -> LinkDecision<'a> {
    match select_best(scored) {
        Some((best, score)) if stored_id == Some(best.id.as_str()) => {
            LinkDecision::Unchanged(score)
        }
        Some((best, score)) => LinkDecision::Link(best, score),
        None => LinkDecision::BelowFloor,
    }
}

#[derive(Debug, Default)]
pub struct ResolveSummary {
    pub processed: usize,
    pub linked: usize,
    pub skipped_unparseable: usize,
    pub skipped_no_candidates: usize,
    pub skipped_low_score: usize,
    pub search_failures: usize,
}

/// Run the identity pass: one professor at a time, fixed delay between
/// them. Per-professor failures are logged and skipped.
pub async fn run(pool: &PgPool, rmp: &RmpClient) -> Result<ResolveSummary> {
    let targets = professors::unresolved(pool).await?;
    info!(count = targets.len(), "starting identity resolution");

    let mut summary = ResolveSummary::default();

    for professor in &targets {
        summary.processed += 1;
        if let Err(e) = resolve_one(pool, rmp, professor, &mut summary).await {
            summary.search_failures += 1;
            warn!(name = professor.name.as_str(), error = %e, "resolution failed, skipping");
        }
        sleep(RESOLVE_DELAY).await;
    }

    info!(
        processed = summary.processed,
        linked = summary.linked,
        skipped_unparseable = summary.skipped_unparseable,
        skipped_no_candidates = summary.skipped_no_candidates,
        skipped_low_score = summary.skipped_low_score,
        search_failures = summary.search_failures,
        "identity resolution complete"
    );

    Ok(summary)
}

async fn resolve_one(
    pool: &PgPool,
    rmp: &RmpClient,
    professor: &UnresolvedProfessor,
    summary: &mut ResolveSummary,
) -> Result<()> {
    let Some((last_name, first_token)) = split_display_name(&professor.name) else {
        summary.skipped_unparseable += 1;
        debug!(name = professor.name.as_str(), "unparseable name, skipping");
        return Ok(());
    };

    let course_codes = professors::taught_course_codes(pool, &professor.name).await?;
    let subjects: Vec<String> = {
        let mut seen = HashSet::new();
        course_codes
            .iter()
            .map(|c| subject_prefix(c))
            .filter(|p| !p.is_empty() && seen.insert(p.clone()))
            .collect()
    };
    let hints = department_hints(&subjects);

    let candidates =
        gather_candidates(rmp, &last_name, first_token.as_deref(), &hints).await?;

    if candidates.is_empty() {
        summary.skipped_no_candidates += 1;
        debug!(name = professor.name.as_str(), "no candidates found");
        return Ok(());
    }

    let first_initial = first_token.as_deref().and_then(|t| t.chars().next());
    let scored: Vec<(TeacherCandidate, i32)> = candidates
        .into_iter()
        .map(|c| {
            let score =
                score_candidate(&c, &last_name, first_initial, &subjects, &course_codes, &hints);
            (c, score)
        })
        .collect();

    match decide_link(&scored, professor.rmp_id.as_deref()) {
        LinkDecision::Link(best, score) => {
            professors::set_rmp_link(pool, professor.id, &best.id).await?;
            summary.linked += 1;
            info!(
                name = professor.name.as_str(),
                matched = format!("{} {}", best.first_name, best.last_name),
                score,
                "professor linked"
            );
        }
        LinkDecision::Unchanged(score) => {
            debug!(
                name = professor.name.as_str(),
                score, "already linked to best candidate"
            );
        }
        LinkDecision::BelowFloor => {
            summary.skipped_low_score += 1;
            debug!(name = professor.name.as_str(), "no candidate above score floor");
        }
    }

    Ok(())
}

/// Run the search strategies, deduplicating candidates by node id while
/// preserving encounter order (earlier strategies take precedence in
/// tie-breaks).
async fn gather_candidates(
    rmp: &RmpClient,
    last_name: &str,
    first_token: Option<&str>,
    hints: &[&str],
) -> Result<Vec<TeacherCandidate>> {
    let mut candidates: Vec<TeacherCandidate> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut targeted_missed = false;

    let mut merge = |found: Vec<TeacherCandidate>, candidates: &mut Vec<TeacherCandidate>| {
        for c in found {
            if seen.insert(c.id.clone()) {
                candidates.push(c);
            }
        }
    };

    if let Some(first) = first_token.filter(|t| t.chars().count() > 1) {
        let found = rmp.search_teachers(&format!("{first} {last_name}")).await?;
        targeted_missed |= strategy_missed(&found);
        merge(found, &mut candidates);
    }

    if let Some(keyword) = hints.first() {
        let found = rmp.search_teachers(&format!("{last_name} {keyword}")).await?;
        targeted_missed |= strategy_missed(&found);
        merge(found, &mut candidates);
    }

    if broad_search_needed(targeted_missed, &candidates, last_name) {
        let found = rmp.search_teachers(last_name).await?;
        merge(found, &mut candidates);
    }

    Ok(candidates)
}

/// A targeted strategy missed when it returned nothing, or nothing with at
/// least one review.
fn strategy_missed(found: &[TeacherCandidate]) -> bool {
    !found.iter().any(|c| c.num_ratings >= 1)
}

/// The broad last-name-only search runs when any targeted strategy missed,
/// when no candidates were accumulated at all, or when the last name is too
/// short to trust targeted matching.
fn broad_search_needed(
    targeted_missed: bool,
    candidates: &[TeacherCandidate],
    last_name: &str,
) -> bool {
    targeted_missed || candidates.is_empty() || last_name.chars().count() <= SHORT_LAST_NAME
}
