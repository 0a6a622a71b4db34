use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studio_events::config::AppConfig;
use studio_events::digest::schedule::{next_trigger, TRIGGER_PERIOD_MINUTES};
use studio_events::digest::DigestOptions;
use studio_events::feed::{AcuityPage, EventPage};
use studio_events::models::City;
use studio_events::App;

#[derive(Parser)]
#[command(name = "studio-events")]
#[command(about = "Studio class listings and the daily booking digest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upcoming classes from every provider, duplicates removed
    Events {
        /// Only this city (chicago, eugene, virtual, other)
        #[arg(long)]
        city: Option<City>,
        #[arg(long)]
        json: bool,
    },
    /// One event by its public slug
    Event {
        slug: String,
        /// Print schema.org markup instead of a summary
        #[arg(long = "json-ld")]
        json_ld: bool,
    },
    /// Public Acuity schedule grouped by category
    Acuity {
        #[arg(long)]
        json: bool,
    },
    /// Run the digest trigger once
    Digest {
        /// Send even if this is not a configured send time
        #[arg(long)]
        force: bool,
        /// Print the digest instead of mailing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the digest trigger every 15 minutes
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load().context("loading configuration")?;
    let app = App::new(config).context("initializing")?;

    match cli.command {
        Commands::Events { city, json } => {
            let feed = app.event_feed(Utc::now(), city).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&feed)?);
                return Ok(ExitCode::SUCCESS);
            }
            if feed.is_degraded() {
                for source in &feed.unavailable {
                    println!("! {source} schedule could not be loaded");
                }
            }
            if feed.events.is_empty() {
                println!("No upcoming classes");
            }
            for event in &feed.events {
                println!(
                    "{}  {:<8} {:<40} {}",
                    event.start_date.format("%Y-%m-%d %H:%M UTC"),
                    event.city,
                    event.title,
                    event.slug
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Event { slug, json_ld } => match app.event_page(Utc::now(), &slug).await {
            EventPage::Found { event, json_ld: markup } => {
                if json_ld {
                    println!("{}", serde_json::to_string_pretty(&markup)?);
                } else {
                    println!("{}", event.title);
                    println!("{} to {}", event.start_date.to_rfc3339(), event.end_date.to_rfc3339());
                    println!("{}, {} {}", event.venue_name, event.street_address, event.address_locality);
                    println!("{}", event.category);
                    println!("Book: {}", event.booking_url);
                }
                Ok(ExitCode::SUCCESS)
            }
            EventPage::NotFound => {
                println!("Event not found: {slug}");
                Ok(ExitCode::from(4))
            }
        },
        Commands::Acuity { json } => {
            let page = app.acuity_page(Utc::now()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
                return Ok(ExitCode::SUCCESS);
            }
            print_acuity_page(&page);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Digest { force, dry_run } => {
            let outcome = app.run_digest(Utc::now(), DigestOptions { force, dry_run }).await;
            println!("{}", serde_json::to_string_pretty(&outcome.body())?);
            Ok(if outcome.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Watch => {
            tracing::info!(every_minutes = TRIGGER_PERIOD_MINUTES, "digest watch started");
            loop {
                let now = Utc::now();
                let at = next_trigger(now);
                tokio::time::sleep((at - now).to_std().unwrap_or_default()).await;
                // Run as of the boundary so a late wakeup cannot slip into the next minute.
                let outcome = app.run_digest(at, DigestOptions::default()).await;
                tracing::info!(at = %at, status = outcome.status_code(), body = %outcome.body(), "digest tick");
            }
        }
    }
}

fn print_acuity_page(page: &AcuityPage) {
    match page {
        AcuityPage::NotConfigured => {
            println!("Online booking is not connected yet. Call the studio to reserve a spot.");
        }
        AcuityPage::Unavailable { message } => println!("{message}"),
        AcuityPage::Empty => println!("No upcoming classes"),
        AcuityPage::Listing { groups } => {
            for group in groups {
                println!("{}", group.category.to_uppercase());
                for series in &group.series {
                    println!("  {}", series.title);
                    for slot in &series.times {
                        let seats = slot
                            .remaining_seats
                            .map(|n| format!(" ({n} left)"))
                            .unwrap_or_default();
                        println!("    {}{}  {}", slot.start.format("%a %b %-d %-I:%M %p"), seats, slot.booking_url);
                    }
                }
                println!();
            }
        }
    }
}
