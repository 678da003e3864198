//! Environment-backed configuration.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,

    /// Display name of the school row all courses hang off of.
    #[serde(default = "default_school_name")]
    pub school_name: String,

    /// Root URL of the class-search application.
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Term code submitted with the class search (e.g. "2260").
    #[serde(default = "default_term")]
    pub term: String,

    /// The school's opaque ID on RateMyProfessors (base64 "School-<n>").
    #[serde(default = "default_rmp_school_id")]
    pub rmp_school_id: String,

    /// Base log level for the crate's own modules.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_school_name() -> String {
    "UC Santa Cruz".to_string()
}

fn default_catalog_url() -> String {
    "https://pisa.ucsc.edu/class_search/index.php".to_string()
}

fn default_term() -> String {
    "2260".to_string()
}

fn default_rmp_school_id() -> String {
    "U2Nob29sLTEwNzg=".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from the process environment.
pub fn load() -> Result<Config> {
    Figment::new()
        .merge(Env::raw())
        .extract()
        .context("failed to load configuration from environment")
}
