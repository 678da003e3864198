use catalog::catalog::client::CatalogClient;
use catalog::cli::{Args, Command};
use catalog::rmp::RmpClient;
use catalog::{config, data, logging, ratings, resolver};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::setup_logging(&config, args.tracing);

    let pool = match data::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("database setup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Command::Scrape { term } => {
            let term = term.as_deref().unwrap_or(&config.term);
            match CatalogClient::new(&config.catalog_url) {
                Ok(client) => {
                    catalog::catalog::sync::run(&pool, &client, &config.school_name, term)
                        .await
                        .map(|_| ())
                }
                Err(e) => Err(e),
            }
        }
        Command::Resolve => match RmpClient::new(&config.rmp_school_id) {
            Ok(rmp) => resolver::run(&pool, &rmp).await.map(|_| ()),
            Err(e) => Err(e),
        },
        Command::Ratings => match RmpClient::new(&config.rmp_school_id) {
            Ok(rmp) => ratings::run(&pool, &rmp).await.map(|_| ()),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("job failed: {e:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
