//! Interactive menu for the world map dashboard.
//!
//! The dashboard is attached to its filter store for the whole session, so
//! every filter edit made here refreshes both map layers in the background.

use chrono::NaiveDate;
use dialoguer::{Input, MultiSelect, Select};
use tokio::runtime::Handle;
use world_map_cli_utils::{MultiProgress, Spinner};
use world_map_client::{ApiClient, CityQuery};
use world_map_dashboard::Dashboard;
use world_map_export::{DataType, ExportFormat};
use world_map_filter::{AqiRange, DateRange, SelectionChange};

use crate::render;

/// Runs the interactive menu loop until the user exits.
///
/// # Errors
///
/// Returns an error if a prompt fails. Backend failures are printed and
/// the loop continues.
pub async fn run(
    multi: &MultiProgress,
    client: &ApiClient,
    dashboard: &Dashboard,
) -> Result<(), Box<dyn std::error::Error>> {
    dashboard.attach(Handle::current());

    let spinner = Spinner::start(multi, "Loading map layers...");
    dashboard.refresh_all().await;
    drop(spinner);
    print_notices(dashboard);

    loop {
        println!();
        print_filters(dashboard);

        let items = &[
            "Show map data",
            "Edit date and AQI filters",
            "Toggle disaster types",
            "Reset filters",
            "Compare cities",
            "Export data",
            "Exit",
        ];

        let selection = Select::new()
            .with_prompt("World map")
            .items(items)
            .default(0)
            .interact()?;

        match selection {
            0 => show_map(multi, dashboard).await,
            1 => edit_filters(dashboard)?,
            2 => toggle_types(multi, client, dashboard).await?,
            3 => {
                dashboard.store().reset();
                println!("Filters reset.");
            }
            4 => compare(multi, client, dashboard).await?,
            5 => export(multi, dashboard).await?,
            6 => {
                dashboard.detach();
                println!("Goodbye.");
                return Ok(());
            }
            _ => unreachable!(),
        }
    }
}

fn print_notices(dashboard: &Dashboard) {
    for notice in dashboard.take_notices() {
        eprintln!("{notice}");
    }
}

fn print_filters(dashboard: &Dashboard) {
    let filters = dashboard.store().get();
    if !filters.has_active_filters() && filters.selected_cities.is_empty() {
        println!("Filters: none");
        return;
    }

    let mut parts = Vec::new();
    if !filters.disaster_types.is_empty() {
        parts.push(format!("types {}", filters.disaster_types.join(", ")));
    }
    if let Some(start) = filters.date_range.start {
        parts.push(format!("from {start}"));
    }
    if let Some(end) = filters.date_range.end {
        parts.push(format!("to {end}"));
    }
    if let Some(min) = filters.aqi_range.min {
        parts.push(format!("AQI >= {min}"));
    }
    if let Some(max) = filters.aqi_range.max {
        parts.push(format!("AQI <= {max}"));
    }
    if !filters.city_search.trim().is_empty() {
        parts.push(format!("city \"{}\"", filters.city_search));
    }
    if !filters.selected_cities.is_empty() {
        parts.push(format!("{} cities selected", filters.selected_cities.len()));
    }
    println!("Filters: {}", parts.join(" | "));
}

async fn show_map(multi: &MultiProgress, dashboard: &Dashboard) {
    let spinner = Spinner::start(multi, "Waiting for layer refreshes...");
    dashboard.settle().await;
    drop(spinner);
    print_notices(dashboard);

    let disasters = dashboard.disasters().records();
    println!("Disasters ({})", disasters.len());
    for record in disasters.iter() {
        println!("  {}", render::disaster_line(record));
    }

    let air_quality = dashboard.air_quality().records();
    println!("Air quality ({})", air_quality.len());
    for record in air_quality.iter() {
        println!("  {}", render::air_quality_line(record));
    }
}

/// Prompts for an optional date. Blank input clears the bound.
fn prompt_date(
    prompt: &str,
    current: Option<NaiveDate>,
) -> Result<Option<NaiveDate>, dialoguer::Error> {
    let raw: String = Input::new()
        .with_prompt(format!("{prompt} (YYYY-MM-DD, blank for none)"))
        .with_initial_text(current.map(|d| d.to_string()).unwrap_or_default())
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Ok(());
            }
            NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
}

/// Prompts for an optional AQI bound. Blank input clears the bound.
fn prompt_aqi(prompt: &str, current: Option<u32>) -> Result<Option<u32>, dialoguer::Error> {
    let raw: String = Input::new()
        .with_prompt(format!("{prompt} (blank for none)"))
        .with_initial_text(current.map(|v| v.to_string()).unwrap_or_default())
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Ok(());
            }
            input
                .trim()
                .parse::<u32>()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;

    Ok(raw.trim().parse().ok())
}

fn edit_filters(dashboard: &Dashboard) -> Result<(), Box<dyn std::error::Error>> {
    let store = dashboard.store();
    let current = store.get();

    let start = prompt_date("Start date", current.date_range.start)?;
    let end = prompt_date("End date", current.date_range.end)?;
    store.set_date_range(DateRange { start, end });

    let min = prompt_aqi("Minimum AQI", current.aqi_range.min)?;
    let max = prompt_aqi("Maximum AQI", current.aqi_range.max)?;
    store.set_aqi_range(AqiRange { min, max });

    let city: String = Input::new()
        .with_prompt("City search (blank for none)")
        .with_initial_text(current.city_search)
        .allow_empty(true)
        .interact_text()?;
    store.set_city_search(city.trim());

    Ok(())
}

async fn toggle_types(
    multi: &MultiProgress,
    client: &ApiClient,
    dashboard: &Dashboard,
) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = Spinner::start(multi, "Loading disaster types...");
    let types = client.disaster_types().await;
    drop(spinner);

    let types = match types {
        Ok(types) if !types.is_empty() => types,
        Ok(_) => {
            println!("The backend reports no disaster types.");
            return Ok(());
        }
        Err(e) => {
            eprintln!("Failed to load disaster types: {e}");
            return Ok(());
        }
    };

    let selected = dashboard.store().get().disaster_types;
    let labels: Vec<String> = types
        .iter()
        .map(|raw| format!("{} ({raw})", world_map_classify::disaster_label(raw)))
        .collect();
    let defaults: Vec<bool> = types.iter().map(|raw| selected.contains(raw)).collect();

    let chosen = MultiSelect::new()
        .with_prompt("Disaster types (only the first selected is sent to the backend)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    for (i, raw) in types.iter().enumerate() {
        if chosen.contains(&i) != selected.contains(raw) {
            dashboard.store().toggle_disaster_type(raw);
        }
    }
    Ok(())
}

async fn compare(
    multi: &MultiProgress,
    client: &ApiClient,
    dashboard: &Dashboard,
) -> Result<(), Box<dyn std::error::Error>> {
    let search: String = Input::new()
        .with_prompt("Search cities (blank for all)")
        .allow_empty(true)
        .interact_text()?;
    let query = CityQuery {
        search: Some(search.trim().to_string()).filter(|s| !s.is_empty()),
        ..CityQuery::default()
    };

    let spinner = Spinner::start(multi, "Loading cities...");
    let cities = client.cities(&query).await;
    drop(spinner);

    let cities = match cities {
        Ok(cities) if !cities.is_empty() => cities,
        Ok(_) => {
            println!("No cities match.");
            return Ok(());
        }
        Err(e) => {
            eprintln!("Failed to load cities: {e}");
            return Ok(());
        }
    };

    loop {
        let selected = dashboard.store().get().selected_cities;
        let mut items: Vec<String> = cities
            .iter()
            .map(|city| {
                let mark = if selected.contains(&city.id) { "[x]" } else { "[ ]" };
                format!("{mark} {}", render::city_line(city))
            })
            .collect();
        items.push(format!("Compare {} selected", selected.len()));
        items.push("Back".to_string());

        let selection = Select::new()
            .with_prompt("Select 2 to 5 cities")
            .items(&items)
            .default(0)
            .interact()?;

        if selection < cities.len() {
            let city = &cities[selection];
            if dashboard.store().toggle_city(city.id) == SelectionChange::Full {
                println!(
                    "At most {} cities can be compared.",
                    world_map_filter::MAX_SELECTED_CITIES
                );
            }
        } else if selection == cities.len() {
            let spinner = Spinner::start(multi, "Comparing cities...");
            let result = dashboard.compare_selected().await;
            drop(spinner);

            match result {
                Ok(result) => print!("{}", render::comparison_table(&result)),
                Err(_) => print_notices(dashboard),
            }
            return Ok(());
        } else {
            return Ok(());
        }
    }
}

async fn export(
    multi: &MultiProgress,
    dashboard: &Dashboard,
) -> Result<(), Box<dyn std::error::Error>> {
    let data_types = DataType::all();
    let data_type = Select::new()
        .with_prompt("Data set")
        .items(&["Disasters", "Air quality"])
        .default(0)
        .interact()?;

    let formats = ExportFormat::all();
    let format_names: Vec<String> = formats.iter().map(ToString::to_string).collect();
    let format = Select::new()
        .with_prompt("Format")
        .items(&format_names)
        .default(0)
        .interact()?;

    let dir: String = Input::new()
        .with_prompt("Output directory")
        .default(".".to_string())
        .interact_text()?;

    if !dashboard.store().get().has_active_filters() {
        println!("No filters active - all data will be downloaded.");
    }

    let spinner = Spinner::start(multi, "Downloading...");
    let result = dashboard
        .export(data_types[data_type], formats[format], std::path::Path::new(&dir))
        .await;
    drop(spinner);

    match result {
        Ok(path) => println!("Saved {}", path.display()),
        Err(_) => print_notices(dashboard),
    }
    Ok(())
}
