//! HTTP client for the class-search application.
//!
//! The listing is a form POST against the search endpoint; detail pages are
//! plain GETs on relative links embedded in each panel. One pooled client is
//! shared across the whole pass.

use crate::error::SourceError;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; catalog-sync/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Per-request timeout shared by every outbound call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    /// POST the class search form for a term and return the listing HTML.
    pub async fn search(&self, term: &str) -> Result<String, SourceError> {
        let params = [
            ("action", "results"),
            ("binds[:term]", term),
            ("binds[:reg_status]", "all"),
            ("rec_start", "0"),
            ("rec_dur", "2000"),
        ];

        let resp = self
            .http
            .post(self.base_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: self.base_url.to_string(),
                source,
            })?;

        self.read_body(resp).await
    }

    /// GET a detail page via the relative link discovered in a panel.
    pub async fn detail_page(&self, href: &str) -> Result<String, SourceError> {
        let url = self
            .base_url
            .join(href)
            .map_err(|e| SourceError::Parse {
                url: href.to_string(),
                source: anyhow::anyhow!(e),
            })?;

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.to_string(),
                source,
            })?;

        self.read_body(resp).await
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<String, SourceError> {
        let url = resp.url().to_string();
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|source| SourceError::Request { url, source })
    }
}
