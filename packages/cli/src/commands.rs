//! Subcommand implementations.
//!
//! Each command runs one dashboard operation behind a spinner and prints
//! the result to stdout.

use std::path::Path;

use chrono::NaiveDate;
use world_map_cli_utils::{MultiProgress, Spinner};
use world_map_client::{ApiClient, CityQuery};
use world_map_dashboard::Dashboard;
use world_map_export::{DataType, ExportFormat};
use world_map_models::CityId;

use crate::LayerChoice;
use crate::render;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Refreshes the requested layers with the store's filters and prints them.
pub async fn map(
    multi: &MultiProgress,
    dashboard: &Dashboard,
    layer: LayerChoice,
    json: bool,
    geojson: bool,
) -> CommandResult {
    let spinner = Spinner::start(multi, "Loading map layers...");
    dashboard.refresh_all().await;
    drop(spinner);

    for notice in dashboard.take_notices() {
        eprintln!("{notice}");
    }

    let disasters = dashboard.disasters();
    let air_quality = dashboard.air_quality();
    let show_disasters = layer != LayerChoice::Aqi;
    let show_air_quality = layer != LayerChoice::Disasters;

    if geojson {
        if show_disasters {
            println!(
                "{}",
                serde_json::to_string_pretty(&disasters.to_feature_collection()?)?
            );
        }
        if show_air_quality {
            println!(
                "{}",
                serde_json::to_string_pretty(&air_quality.to_feature_collection()?)?
            );
        }
        return Ok(());
    }

    if json {
        let mut markers = Vec::new();
        if show_disasters {
            markers.extend(disasters.markers());
        }
        if show_air_quality {
            markers.extend(air_quality.markers());
        }
        println!("{}", serde_json::to_string_pretty(&markers)?);
        return Ok(());
    }

    if show_disasters {
        let records = disasters.records();
        println!("Disasters ({})", records.len());
        for record in records.iter() {
            println!("  {}", render::disaster_line(record));
        }
    }
    if show_air_quality {
        if show_disasters {
            println!();
        }
        let records = air_quality.records();
        println!("Air quality ({})", records.len());
        for record in records.iter() {
            println!("  {}", render::air_quality_line(record));
        }
    }
    Ok(())
}

/// Compares `city_ids`, optionally on `date`, and prints the table.
pub async fn compare(
    multi: &MultiProgress,
    dashboard: &Dashboard,
    city_ids: &[CityId],
    date: Option<NaiveDate>,
) -> CommandResult {
    let spinner = Spinner::start(multi, format!("Comparing {} cities...", city_ids.len()));
    let result = dashboard.comparison().compare_on(city_ids, date).await;
    drop(spinner);

    print!("{}", render::comparison_table(&result?));
    Ok(())
}

/// Exports `data_type` with the store's filters into `out`.
pub async fn export(
    multi: &MultiProgress,
    dashboard: &Dashboard,
    data_type: DataType,
    format: ExportFormat,
    out: &Path,
) -> CommandResult {
    if !dashboard.store().get().has_active_filters() {
        println!("No filters active - all data will be downloaded.");
    }

    let spinner = Spinner::start(multi, format!("Downloading {data_type} as {format}..."));
    let path = dashboard.export(data_type, format, out).await?;
    spinner.finish(format!("Saved {}", path.display()));
    Ok(())
}

/// Prints the city catalog.
pub async fn cities(multi: &MultiProgress, client: &ApiClient, query: &CityQuery) -> CommandResult {
    let spinner = Spinner::start(multi, "Loading cities...");
    let cities = client.cities(query).await;
    drop(spinner);

    let cities = cities?;
    println!("{} cities", cities.len());
    for city in &cities {
        println!("{}", render::city_line(city));
    }
    Ok(())
}

/// Prints the disaster types present in the backend, with their labels.
pub async fn types(multi: &MultiProgress, client: &ApiClient) -> CommandResult {
    let spinner = Spinner::start(multi, "Loading disaster types...");
    let types = client.disaster_types().await;
    drop(spinner);

    for raw in types? {
        println!(
            "{raw:<20} {:<20} {}",
            world_map_classify::disaster_label(&raw),
            world_map_classify::disaster_color(&raw)
        );
    }
    Ok(())
}

/// Prints the backend health status.
pub async fn health(multi: &MultiProgress, client: &ApiClient) -> CommandResult {
    let spinner = Spinner::start(multi, "Checking backend...");
    let status = client.health().await;
    drop(spinner);

    let status = status?;
    println!(
        "{}: {}",
        status.service.as_deref().unwrap_or("backend"),
        status.status.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
