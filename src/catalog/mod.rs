//! Class-search catalog source: HTTP client, HTML parsing, and the sync
//! pass that persists what it finds.

pub mod client;
pub mod detail;
pub mod panels;
pub mod sync;
