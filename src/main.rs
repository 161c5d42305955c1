mod config;
mod database;
mod models;
mod ui;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Arg, Command};
use std::fs::OpenOptions;

use crate::config::settings::Settings;
use crate::database::connection::Database;
use crate::ui::app::App;
use crate::ui::tracker::SleepTracker;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Sleep Quality Tracker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track when you sleep and how well")
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("SQLite database URL (overrides DATABASE_URL)"),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .help("Print the sleep summary and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("export-json")
                .long("export-json")
                .help("Print all nights as JSON and exit")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("summary"),
        )
        .get_matches();

    let mut settings = Settings::new()?;
    if let Some(url) = matches.get_one::<String>("database-url") {
        settings.database_url = url.clone();
    }

    init_logging(&settings)?;

    log::info!("Starting Sleep Quality Tracker");
    log::info!("Database URL: {}", settings.database_url);
    let database = match Database::connect(&settings.database_url, settings.max_connections).await {
        Ok(db) => {
            log::info!("Database ready");
            db
        }
        Err(e) => {
            log::error!("Database connection failed: {:?}", e);
            eprintln!("❌ Failed to open the sleep database. Please check:");
            eprintln!("  - DATABASE_URL in .env points to a writable location");
            eprintln!("  - The file is a SQLite database");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if matches.get_flag("export-json") {
        let nights = database.get_all_nights().await?;
        println!("{}", serde_json::to_string_pretty(&nights)?);
        return Ok(());
    }

    let tracker = SleepTracker::new(database);

    if matches.get_flag("summary") {
        tracker.wait_idle().await;
        let mut summary = tracker.nights_string();
        // The derived summary is recomputed in the background; wait until it
        // reflects the current listing.
        let nights = tracker.nights().borrow().clone();
        let expected = ui::format::format_nights(&nights, &chrono::Local);
        let text = summary.wait_for(|text| *text == expected).await?.clone();
        print!("{}", text);
        return Ok(());
    }

    let mut app = App::new(tracker);
    app.run().await?;

    Ok(())
}

fn init_logging(settings: &Settings) -> Result<()> {
    if settings.debug_logs_enabled {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.log_file)?;

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("sleep_quality_tracker=debug"),
        )
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

        log::info!("=== DEBUG LOGGING ENABLED ===");
        log::info!("Writing logs to {}", settings.log_file.display());
    } else {
        // The TUI owns the terminal, so nothing is logged by default
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }
    Ok(())
}
