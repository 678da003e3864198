//! RateMyProfessors GraphQL client: candidate search for identity
//! resolution and per-teacher rating/review fetches.

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{trace, warn};

/// Basic auth header value (base64 of "test:test").
const AUTH_HEADER: &str = "Basic dGVzdDp0ZXN0";

/// GraphQL endpoint.
const GRAPHQL_URL: &str = "https://www.ratemyprofessors.com/graphql";

/// Candidate count requested per search query.
const SEARCH_PAGE_SIZE: u32 = 10;

/// Most-recent reviews fetched per teacher.
pub const REVIEW_FETCH_COUNT: u32 = 20;

/// Transient failures (connection reset, timeout) are retried this many
/// times with a fixed pause, then propagated. HTTP errors are not retried.
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// A teacher node returned by the search endpoint.
#[derive(Debug, Clone)]
pub struct TeacherCandidate {
    /// Opaque base64 node id; the key for all detail queries.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<String>,
    pub num_ratings: i32,
    /// Course codes students reviewed this teacher under, e.g. "CSE101".
    pub course_codes: Vec<String>,
}

/// Aggregate summary from a teacher node query.
#[derive(Debug, Clone)]
pub struct TeacherSummary {
    pub first_name: String,
    pub last_name: String,
    pub avg_rating: f64,
    pub avg_difficulty: f64,
    pub num_ratings: i32,
    /// Percentage 0-100, or the service's -1 sentinel for "not available".
    pub would_take_again_pct: f64,
}

/// One review edge from a teacher node query.
#[derive(Debug, Clone, Default)]
pub struct TeacherReview {
    pub comment: Option<String>,
    pub class: Option<String>,
    pub grade: Option<String>,
    pub helpful_rating: Option<f64>,
    pub clarity_rating: Option<f64>,
    pub difficulty_rating: Option<f64>,
    /// Sentinel integer; 1 means "would take again".
    pub would_take_again: Option<i64>,
    pub posted_at: Option<DateTime<Utc>>,
}

pub struct RmpClient {
    http: reqwest::Client,
    school_id: String,
}

impl RmpClient {
    pub fn new(school_id: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; catalog-sync/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(crate::catalog::client::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            school_id: school_id.to_string(),
        })
    }

    /// Send a GraphQL request, retrying transient network failures.
    async fn graphql_request(&self, query: &str, variables: Value) -> Result<Value, SourceError> {
        let mut attempt = 0;
        loop {
            match self.try_graphql(query, &variables).await {
                Ok(json) => return Ok(json),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(attempt, error = %e, "transient failure, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_graphql(&self, query: &str, variables: &Value) -> Result<Value, SourceError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let resp = self
            .http
            .post(GRAPHQL_URL)
            .header("Authorization", AUTH_HEADER)
            .json(&body)
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: GRAPHQL_URL.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: GRAPHQL_URL.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json().await.map_err(|source| SourceError::Request {
            url: GRAPHQL_URL.to_string(),
            source,
        })
    }

    /// Search teacher candidates at the configured school by free-text query.
    pub async fn search_teachers(&self, text: &str) -> Result<Vec<TeacherCandidate>, SourceError> {
        let query = r#"
            query TeacherSearchQuery($query: TeacherSearchQuery!, $count: Int!) {
              newSearch {
                teachers(query: $query, first: $count) {
                  edges {
                    node {
                      id
                      firstName
                      lastName
                      department
                      numRatings
                      courseCodes { courseName }
                    }
                  }
                }
              }
            }
        "#;

        let variables = serde_json::json!({
            "query": { "text": text, "schoolID": self.school_id },
            "count": SEARCH_PAGE_SIZE,
        });

        let json = self.graphql_request(query, variables).await?;

        let edges = json["data"]["newSearch"]["teachers"]["edges"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let candidates: Vec<TeacherCandidate> = edges
            .iter()
            .filter_map(|edge| {
                let node = &edge["node"];
                let course_codes = node["courseCodes"]
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|cc| cc["courseName"].as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();

                Some(TeacherCandidate {
                    id: node["id"].as_str()?.to_string(),
                    first_name: node["firstName"].as_str().unwrap_or_default().to_string(),
                    last_name: node["lastName"].as_str().unwrap_or_default().to_string(),
                    department: node["department"].as_str().map(|s| s.to_string()),
                    num_ratings: node["numRatings"].as_i64().unwrap_or(0) as i32,
                    course_codes,
                })
            })
            .collect();

        trace!(query = text, count = candidates.len(), "teacher search complete");
        Ok(candidates)
    }

    /// Fetch the aggregate summary and most recent reviews for a teacher
    /// node by its opaque id.
    pub async fn teacher_with_reviews(
        &self,
        node_id: &str,
    ) -> Result<(TeacherSummary, Vec<TeacherReview>), SourceError> {
        let query = r#"
            query TeacherRatingsQuery($id: ID!, $count: Int!) {
              node(id: $id) {
                ... on Teacher {
                  firstName lastName
                  avgRating avgDifficulty numRatings wouldTakeAgainPercent
                  ratings(first: $count) {
                    edges {
                      node {
                        comment date class grade
                        helpfulRating clarityRating difficultyRating
                        wouldTakeAgain
                      }
                    }
                  }
                }
              }
            }
        "#;

        let variables = serde_json::json!({
            "id": node_id,
            "count": REVIEW_FETCH_COUNT,
        });

        let json = self.graphql_request(query, variables).await?;
        let node = &json["data"]["node"];

        if node.is_null() {
            return Err(SourceError::Parse {
                url: GRAPHQL_URL.to_string(),
                source: anyhow::anyhow!("no teacher node for id {node_id}"),
            });
        }

        let summary = TeacherSummary {
            first_name: node["firstName"].as_str().unwrap_or_default().to_string(),
            last_name: node["lastName"].as_str().unwrap_or_default().to_string(),
            avg_rating: node["avgRating"].as_f64().unwrap_or(0.0),
            avg_difficulty: node["avgDifficulty"].as_f64().unwrap_or(0.0),
            num_ratings: node["numRatings"].as_i64().unwrap_or(0) as i32,
            would_take_again_pct: node["wouldTakeAgainPercent"].as_f64().unwrap_or(-1.0),
        };

        let reviews = node["ratings"]["edges"]
            .as_array()
            .map(|edges| {
                edges
                    .iter()
                    .map(|edge| {
                        let r = &edge["node"];
                        TeacherReview {
                            comment: r["comment"].as_str().map(|s| s.to_string()),
                            class: r["class"].as_str().map(|s| s.to_string()),
                            grade: r["grade"].as_str().map(|s| s.to_string()),
                            helpful_rating: r["helpfulRating"].as_f64(),
                            clarity_rating: r["clarityRating"].as_f64(),
                            difficulty_rating: r["difficultyRating"].as_f64(),
                            would_take_again: r["wouldTakeAgain"].as_i64(),
                            posted_at: r["date"]
                                .as_str()
                                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok((summary, reviews))
    }
}
