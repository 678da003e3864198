//! Course catalog ingestion and professor identity resolution.
//!
//! Three batch jobs share this crate: `scrape` pulls the university
//! class-search site into Postgres, `resolve` links stored instructor names
//! to RateMyProfessors identities, and `ratings` refreshes cached ratings
//! and reviews for linked professors.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod ratings;
pub mod resolver;
pub mod rmp;
