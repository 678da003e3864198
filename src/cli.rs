use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "catalog", about = "Course catalog ingestion and identity-resolution batch jobs")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the class-search site and reconcile courses, sections, and
    /// instructor names into the store.
    Scrape {
        /// Term code to scrape. Defaults to TERM from the environment.
        #[arg(long)]
        term: Option<String>,
    },
    /// Link unresolved professors to RateMyProfessors identities.
    Resolve,
    /// Refresh cached ratings and reviews for resolved professors.
    Ratings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}
