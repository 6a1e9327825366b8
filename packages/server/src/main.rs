#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone server binary. Reads settings from the file named by
//! `LA_CRIME_SETTINGS`, if set, then from the environment.

use std::path::PathBuf;

use la_crime_cache::settings::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let settings_path = std::env::var_os("LA_CRIME_SETTINGS").map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    la_crime_server::run_server(settings).await
}
