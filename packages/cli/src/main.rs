#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end.
//!
//! `la_crime aggregate` runs one aggregation and prints the neighborhood
//! ranking; `la_crime serve` starts the HTTP API.

mod output;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use la_crime_cache::service::AggregationService;
use la_crime_cache::settings::Settings;
use la_crime_server_models::{AggregationQueryParams, ApiAggregation, WindowRequest};
use la_crime_source::type_mapping::categorize;

#[derive(Parser)]
#[command(name = "la_crime", about = "LA neighborhood crime aggregation")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true, env = "LA_CRIME_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate incidents per neighborhood and print the ranking
    Aggregate {
        /// Trailing window length in days, ending today
        #[arg(long, conflicts_with_all = ["start", "end"])]
        days: Option<u32>,
        /// First day of an explicit range (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        /// Last day of an explicit range (YYYY-MM-DD), inclusive
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Neighborhood boundary `GeoJSON` (overrides `NEIGHBORHOODS_PATH`)
        #[arg(long)]
        neighborhoods: Option<PathBuf>,
        /// Print the full result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show which category an offense description maps to
    Categorize {
        /// Offense description, e.g. "BURGLARY FROM VEHICLE"
        description: String,
    },
    /// Start the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            days,
            start,
            end,
            neighborhoods,
            json,
        } => {
            let mut settings = Settings::load(cli.settings.as_deref())?;
            if let Some(path) = neighborhoods {
                settings.neighborhoods.path = path;
            }
            let request = AggregationQueryParams { days, start, end }.window()?;

            let service = AggregationService::from_settings(&settings)?;
            let served = match request {
                WindowRequest::Days(days) => service.get_aggregation_days(days).await?,
                WindowRequest::Range { start, end } => {
                    service.get_aggregation_range(start, end).await?
                }
            };

            if served.stale {
                log::warn!("Upstream unavailable; showing the last good result");
            }
            log::info!(
                "Aggregated {} incidents for {}",
                served.result.metadata.total_incidents,
                served.result.metadata.window
            );

            if json {
                let body = ApiAggregation {
                    stale: served.stale,
                    aggregation: &served.result,
                };
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!("{}", output::ranking_table(&served.result)?);
            }
        }
        Commands::Categorize { description } => match categorize(&description) {
            Some(category) => println!("{category}"),
            None => println!("(uncategorized)"),
        },
        Commands::Serve => {
            let settings = Settings::load(cli.settings.as_deref())?;
            log::info!(
                "Serving aggregations for {}",
                settings.neighborhoods.path.display()
            );
            // actix-web runs its own single-threaded runtime; keep it off
            // the tokio worker threads.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(la_crime_server::run_server(settings))
            })
            .await??;
        }
    }

    Ok(())
}
