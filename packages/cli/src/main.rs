#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the world map dashboard.
//!
//! Each subcommand applies its filter flags to the dashboard's filter
//! store and prints what the dashboard produces: layer markers, a city
//! comparison, or the path of an exported file. Without a subcommand an
//! interactive menu is started.
//!
//! Uses `indicatif-log-bridge` (via [`world_map_cli_utils::init_logger`])
//! so `RUST_LOG` output and request spinners share the terminal.

mod commands;
mod interactive;
mod render;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use world_map_client::{ApiClient, ClientConfig};
use world_map_dashboard::Dashboard;
use world_map_export::{DataType, ExportFormat};
use world_map_filter::{AqiRange, DateRange, FilterPatch};
use world_map_models::CityId;

/// Explore disasters and air quality from the world map backend.
#[derive(Parser)]
#[command(name = "world_map")]
#[command(about = "Explore disasters and air quality from the world map backend")]
struct Cli {
    /// API base URL (overrides `WORLD_MAP_API_URL`).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Subcommand to execute. Starts the interactive menu when omitted.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Refresh the map layers with the given filters and print markers.
    Map {
        #[command(flatten)]
        filters: FilterArgs,

        /// Which layers to print.
        #[arg(long, value_enum, default_value_t = LayerChoice::Both)]
        layer: LayerChoice,

        /// Print marker descriptors as JSON instead of a table.
        #[arg(long, conflicts_with = "geojson")]
        json: bool,

        /// Print each layer as a GeoJSON `FeatureCollection`.
        #[arg(long)]
        geojson: bool,
    },

    /// Compare the latest AQI of 2 to 5 cities.
    Compare {
        /// City IDs to compare.
        #[arg(required = true, num_args = 1..)]
        city_ids: Vec<i64>,

        /// Compare measurements from this day (`YYYY-MM-DD`).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Download filtered data as a file.
    Export {
        /// Data set: `disasters` or `aqi`.
        #[arg(value_parser = parse_data_type)]
        data_type: DataType,

        /// File format: `csv`, `json` or `geojson`.
        #[arg(long, default_value = "csv", value_parser = parse_format)]
        format: ExportFormat,

        /// Directory to write the file into.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List cities available for comparison.
    Cities {
        /// Maximum number of cities.
        #[arg(long, default_value_t = world_map_client::api::DEFAULT_CITY_LIMIT)]
        limit: u32,

        /// Match on city or country name.
        #[arg(long)]
        search: Option<String>,

        /// Match on country name.
        #[arg(long)]
        country: Option<String>,
    },

    /// List the disaster types present in the backend.
    Types,

    /// Check that the backend is reachable.
    Health,
}

/// Layers printed by the `map` subcommand.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayerChoice {
    Disasters,
    Aqi,
    Both,
}

/// Filter flags shared by `map` and `export`.
#[derive(Args)]
struct FilterArgs {
    /// Disaster type; repeat to select several (only the first is sent).
    #[arg(long = "type", value_name = "TYPE")]
    disaster_types: Vec<String>,

    /// First day of the disaster date window (`YYYY-MM-DD`).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the disaster date window (`YYYY-MM-DD`).
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Lowest AQI to include.
    #[arg(long)]
    min_aqi: Option<u32>,

    /// Highest AQI to include.
    #[arg(long)]
    max_aqi: Option<u32>,

    /// City name search.
    #[arg(long)]
    city: Option<String>,
}

impl FilterArgs {
    fn into_patch(self) -> FilterPatch {
        let mut patch = FilterPatch::new()
            .disaster_types(self.disaster_types)
            .date_range(DateRange {
                start: self.start,
                end: self.end,
            })
            .aqi_range(AqiRange {
                min: self.min_aqi,
                max: self.max_aqi,
            });
        if let Some(city) = self.city {
            patch = patch.city_search(city);
        }
        patch
    }
}

fn parse_data_type(raw: &str) -> Result<DataType, String> {
    raw.parse()
        .map_err(|_| format!("unknown data type '{raw}' (expected disasters or aqi)"))
}

fn parse_format(raw: &str) -> Result<ExportFormat, String> {
    raw.to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("unknown format '{raw}' (expected csv, json or geojson)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = world_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    log::debug!("Using API at {}", config.base_url);

    let client = ApiClient::from_config(&config)?;
    let dashboard = Dashboard::new(client.clone());

    let Some(command) = cli.command else {
        return interactive::run(&multi, &client, &dashboard).await;
    };

    match command {
        Commands::Map {
            filters,
            layer,
            json,
            geojson,
        } => {
            dashboard.store().merge(filters.into_patch());
            commands::map(&multi, &dashboard, layer, json, geojson).await
        }
        Commands::Compare { city_ids, date } => {
            let ids: Vec<CityId> = city_ids.into_iter().map(CityId).collect();
            commands::compare(&multi, &dashboard, &ids, date).await
        }
        Commands::Export {
            data_type,
            format,
            out,
            filters,
        } => {
            dashboard.store().merge(filters.into_patch());
            commands::export(&multi, &dashboard, data_type, format, &out).await
        }
        Commands::Cities {
            limit,
            search,
            country,
        } => {
            let query = world_map_client::CityQuery {
                limit,
                search,
                country,
            };
            commands::cities(&multi, &client, &query).await
        }
        Commands::Types => commands::types(&multi, &client).await,
        Commands::Health => commands::health(&multi, &client).await,
    }
}
