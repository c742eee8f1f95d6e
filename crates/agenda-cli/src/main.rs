//! `agenda` CLI: compute appointment availability from a clinic snapshot.
//!
//! A snapshot is a JSON document holding the engine configuration next to the
//! pre-fetched clinic data:
//!
//! ```json
//! {
//!   "config": { "timezone": "America/Argentina/Buenos_Aires", "holidays": ["2026-05-25"] },
//!   "resources": [...], "rooms": [...], "serviceTypes": [...], "bookings": [...]
//! }
//! ```
//!
//! ## Usage
//!
//! ```sh
//! # Free slots for service 3, any doctor, from now until the configured horizon
//! agenda slots -i clinic.json --service 3
//!
//! # One doctor, fixed start, JSON output
//! agenda slots -i clinic.json --service 3 --resource 7 \
//!   --from 2026-03-16T08:00:00Z --limit 2026-03-20 --json
//!
//! # Would this booking conflict? (exit status 2 if it does)
//! agenda check -i clinic.json --room 1 --resource 7 \
//!   --start 2026-03-16T10:00:00Z --end 2026-03-16T10:30:00Z
//!
//! # Report schedule entries that break the invariants
//! agenda lint -i clinic.json
//!
//! # Expand holiday specs
//! agenda holidays 2026-12-24..2026-12-26 01/01/2027
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` (default `warn`) to see more.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::io::{self, Read};
use std::process;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agenda_engine::holiday::{expand_holidays, HolidaySet};
use agenda_engine::model::Clinic;
use agenda_engine::{
    check_booking, compute_availability, find_conflicts, validate_schedule, AgendaError, Availability,
    AvailabilityRequest, Candidate, ConflictScope, EngineConfig, PenaltyFlags, ResourceSelector,
};

#[derive(Parser)]
#[command(
    name = "agenda",
    version,
    about = "Clinic appointment availability from a JSON snapshot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List free slots for a service type
    Slots {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Service type id
        #[arg(long)]
        service: u32,
        /// Resource id, or "any"
        #[arg(long, default_value = "any")]
        resource: ResourceSelector,
        /// Search start as RFC 3339 (defaults to now)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Last date to search, YYYY-MM-DD (defaults to the configured horizon)
        #[arg(long)]
        limit: Option<NaiveDate>,
        /// Apply the ASA penalty offset
        #[arg(long)]
        asa: bool,
        /// Apply the CCR penalty offset
        #[arg(long)]
        ccr: bool,
        /// Override the snapshot's timezone (IANA name)
        #[arg(long)]
        tz: Option<String>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a proposed booking against existing ones
    Check {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        room: u32,
        #[arg(long)]
        resource: Option<u32>,
        /// Start as RFC 3339
        #[arg(long)]
        start: DateTime<Utc>,
        /// End as RFC 3339
        #[arg(long)]
        end: DateTime<Utc>,
        /// Which bookings can block (defaults to the snapshot's setting)
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Validate every resource's schedule entries
    Lint {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Expand holiday specs into dates
    Holidays {
        /// Dates (YYYY-MM-DD or DD/MM/YYYY) or ranges joined by "..", " - " or "-"
        #[arg(required = true)]
        specs: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    ResourceInRoom,
    Room,
    ResourceOrRoom,
}

impl From<ScopeArg> for ConflictScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::ResourceInRoom => ConflictScope::ResourceInRoom,
            ScopeArg::Room => ConflictScope::Room,
            ScopeArg::ResourceOrRoom => ConflictScope::ResourceOrRoom,
        }
    }
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    config: EngineConfig,
    #[serde(flatten)]
    clinic: Clinic,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Slots {
            input,
            service,
            resource,
            from,
            limit,
            asa,
            ccr,
            tz,
            json,
        } => {
            let snapshot = load_snapshot(input.as_deref())?;
            let config = match tz {
                Some(name) => snapshot.config.with_timezone_name(&name)?,
                None => snapshot.config,
            };
            let request = AvailabilityRequest {
                resource,
                service_type_id: service,
                from: from.unwrap_or_else(Utc::now),
                limit_date: limit,
                penalties: PenaltyFlags { asa, ccr },
            };
            info!(service, %resource, "slots requested");

            let availability = match compute_availability(&snapshot.clinic, &config, &request) {
                Ok(availability) => availability,
                Err(AgendaError::NoResources) => {
                    eprintln!("No resource found for selector '{}'", resource);
                    process::exit(1);
                }
                Err(err) => return Err(err).context("Failed to compute availability"),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&availability)?);
            } else {
                print_availability(&snapshot.clinic, &availability);
            }
        }
        Commands::Check {
            input,
            room,
            resource,
            start,
            end,
            scope,
        } => {
            let snapshot = load_snapshot(input.as_deref())?;
            let scope = scope.map(ConflictScope::from).unwrap_or(snapshot.config.conflict_scope);
            let candidate = Candidate {
                start,
                end,
                room_id: room,
                resource_id: resource,
            };

            match check_booking(&candidate, &snapshot.clinic.bookings, scope) {
                Ok(()) => println!("free"),
                Err(AgendaError::Conflict { count }) => {
                    println!("conflict: {} booking(s)", count);
                    for b in find_conflicts(&candidate, &snapshot.clinic.bookings, scope) {
                        println!(
                            "  {} - {}  resource {}  room {}",
                            b.start.to_rfc3339(),
                            b.end.to_rfc3339(),
                            b.resource_id,
                            b.room_id
                        );
                    }
                    process::exit(2);
                }
                Err(err) => return Err(err).context("Invalid candidate interval"),
            }
        }
        Commands::Lint { input } => {
            let snapshot = load_snapshot(input.as_deref())?;
            let issues: Vec<_> = snapshot
                .clinic
                .resources
                .iter()
                .flat_map(validate_schedule)
                .collect();
            if issues.is_empty() {
                println!("No schedule issues");
            } else {
                for issue in &issues {
                    println!("{}", issue);
                }
                process::exit(1);
            }
        }
        Commands::Holidays { specs } => {
            let expansion = expand_holidays(&specs, HolidaySet::new());
            for err in &expansion.skipped {
                eprintln!("skipped: {}", err);
            }
            for date in expansion.set.iter() {
                println!("{}", date);
            }
        }
    }

    Ok(())
}

fn print_availability(clinic: &Clinic, availability: &Availability) {
    if availability.days.is_empty() {
        println!("No free slots");
        return;
    }
    for day in &availability.days {
        println!("{} ({})", day.date, day.weekday);
        for slot in &day.slots {
            let name = clinic
                .resource(slot.resource_id)
                .map(|r| r.name.as_str())
                .unwrap_or("?");
            println!(
                "  {:02}:{:02}  {}  room {}",
                slot.hour, slot.minute, name, slot.room_id
            );
        }
    }
}

fn load_snapshot(path: Option<&str>) -> Result<Snapshot> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Failed to parse clinic snapshot")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}
