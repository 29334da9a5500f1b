#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for citizen report storage.
//!
//! Resolves the storage backend from `--config` (TOML) or the `REPORTS_*`
//! and `FIRESTORE_*` environment variables, runs one operation, and prints
//! the result as pretty JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use citizen_map_report_models::{
    BoundingBox, ListOptions, NewReport, ReportCategory, ReportPatch, ReportStatus,
};
use citizen_map_repository::{RepositoryConfig, ReportRepository};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "citizen_map", about = "Citizen report storage tool")]
struct Cli {
    /// TOML configuration file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new report
    Create {
        /// Report category (e.g., "heat", "flooding")
        #[arg(long)]
        category: Option<String>,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
        /// Latitude (WGS84)
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude (WGS84)
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Link to an attached photo
        #[arg(long)]
        photo_url: Option<String>,
        /// Name of the reporter
        #[arg(long)]
        contact_name: Option<String>,
        /// Email of the reporter
        #[arg(long)]
        contact_email: Option<String>,
    },
    /// List reports, newest first
    List {
        /// Maximum number of reports (1 to 500, default 100)
        #[arg(long)]
        limit: Option<f64>,
        /// Bounding box as `west,south,east,north`
        #[arg(long, allow_hyphen_values = true, value_parser = parse_bbox)]
        bbox: Option<BoundingBox>,
        /// Only reports with this status
        #[arg(long)]
        status: Option<String>,
        /// Only reports in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one report
    Get {
        /// Report id
        id: String,
    },
    /// Change fields of an existing report
    Update {
        /// Report id
        id: String,
        /// New status (e.g., "validated", "resolved")
        #[arg(long)]
        status: Option<String>,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        /// New longitude
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,
        /// New photo link
        #[arg(long)]
        photo_url: Option<String>,
        /// New reporter name
        #[arg(long)]
        contact_name: Option<String>,
        /// New reporter email
        #[arg(long)]
        contact_email: Option<String>,
    },
}

fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    BoundingBox::parse(s).ok_or_else(|| format!("expected west,south,east,north but got '{s}'"))
}

fn warn_unknown<T: FromStr>(label: &str, value: Option<&str>) {
    if let Some(value) = value
        && T::from_str(value).is_err()
    {
        log::warn!("'{value}' is not a known {label}; storing it as-is");
    }
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RepositoryConfig::from_toml_file(path)?,
        None => RepositoryConfig::from_env()?,
    };
    let repository = ReportRepository::new(config);

    match cli.command {
        Commands::Create {
            category,
            description,
            lat,
            lng,
            photo_url,
            contact_name,
            contact_email,
        } => {
            warn_unknown::<ReportCategory>("category", category.as_deref());

            let mut payload = NewReport::new();
            if let Some(category) = category {
                payload = payload.category(category);
            }
            if let Some(description) = description {
                payload = payload.description(description);
            }
            if let Some(lat) = lat {
                payload = payload.latitude(lat);
            }
            if let Some(lng) = lng {
                payload = payload.longitude(lng);
            }
            if let Some(url) = photo_url {
                payload = payload.photo_url(url);
            }
            if let Some(name) = contact_name {
                payload = payload.contact_name(name);
            }
            if let Some(email) = contact_email {
                payload = payload.contact_email(email);
            }

            let Some(report) = repository.create_report(payload).await else {
                eprintln!("Report was not saved");
                return Ok(ExitCode::FAILURE);
            };
            print_json(&report)?;
        }
        Commands::List {
            limit,
            bbox,
            status,
            category,
        } => {
            let options = ListOptions {
                limit,
                bbox,
                status,
                category,
            };
            let reports = repository.list_reports(&options).await;
            log::info!("Found {} reports", reports.len());
            print_json(&reports)?;
        }
        Commands::Get { id } => {
            let Some(report) = repository.get_report(&id).await else {
                eprintln!("Report {id} not found");
                return Ok(ExitCode::FAILURE);
            };
            print_json(&report)?;
        }
        Commands::Update {
            id,
            status,
            category,
            description,
            lat,
            lng,
            photo_url,
            contact_name,
            contact_email,
        } => {
            warn_unknown::<ReportStatus>("status", status.as_deref());
            warn_unknown::<ReportCategory>("category", category.as_deref());

            let mut patch = ReportPatch::new();
            if let Some(status) = status {
                patch = patch.status(status);
            }
            if let Some(category) = category {
                patch = patch.category(category);
            }
            if let Some(description) = description {
                patch = patch.description(description);
            }
            if let Some(lat) = lat {
                patch = patch.latitude(lat);
            }
            if let Some(lng) = lng {
                patch = patch.longitude(lng);
            }
            if let Some(url) = photo_url {
                patch = patch.photo_url(url);
            }
            if let Some(name) = contact_name {
                patch = patch.contact_name(name);
            }
            if let Some(email) = contact_email {
                patch = patch.contact_email(email);
            }
            if patch.is_empty() {
                log::warn!("No fields given; only updatedAt will change");
            }

            let Some(report) = repository.update_report(&id, patch).await else {
                eprintln!("Report {id} was not updated (unknown id or backend failure)");
                return Ok(ExitCode::FAILURE);
            };
            print_json(&report)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
