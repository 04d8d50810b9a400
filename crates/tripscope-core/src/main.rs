//! TripScope CLI
//!
//! Command-line access to the trip and ride-location analytics entry points.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use tripscope::api::handlers::{
    self, BulkValidateRequest, DateRangeRequest, LocationRangeRequest, LocationSearchRequest,
    RecentTripsRequest, SearchRequest,
};
use tripscope::api::{ApiResponse, AppState};
use tripscope::clock::SystemClock;
use tripscope::gateway::{ElasticsearchGateway, SearchGateway};
use tripscope::models::{
    FilterOptions, PaymentStatus, RideType, SortField, SortOrder, TripStatus,
};
use tripscope::service::{LocationOptions, RangeSelection};
use tripscope::time_window::TimeRangeToken;
use tripscope::Config;

/// TripScope - trip and ride telemetry analytics
#[derive(Parser)]
#[command(name = "tripscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TRIPSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// Compact single-line JSON
    Json,
    #[default]
    /// Indented JSON
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Search trips with filters and analytics
    Trips(TripArgs),

    /// Show one trip
    Trip {
        /// Trip id
        id: String,
    },

    /// Free-text search over names and ids
    Search {
        text: String,

        /// Maximum number of trips
        #[arg(long)]
        size: Option<u32>,
    },

    /// Performance summary for one driver
    Driver {
        /// Driver id
        id: String,

        #[command(flatten)]
        range: RangeArgs,

        /// Lower bound (epoch seconds)
        #[arg(long)]
        start: Option<i64>,

        /// Upper bound (epoch seconds)
        #[arg(long)]
        end: Option<i64>,
    },

    /// Route-geometry coverage statistics
    Polylines {
        #[command(flatten)]
        range: RangeArgs,

        #[arg(long)]
        driver: Option<String>,

        #[arg(long, value_parser = parse_wire::<TripStatus>)]
        status: Option<TripStatus>,

        #[arg(long, value_parser = parse_wire::<RideType>)]
        ride_type: Option<RideType>,
    },

    /// Check one trip's route geometry
    ValidatePolyline {
        /// Trip id
        id: String,
    },

    /// Check route geometry for many trips
    BulkValidate {
        /// Trip ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Location history for one driver
    Locations(LocationArgs),
}

#[derive(Args, Default)]
struct RangeArgs {
    /// Time range token (today, yesterday, last1h, last24h, last7d, last30d, last90d, custom)
    #[arg(long)]
    range: Option<TimeRangeToken>,

    /// Start of a custom range (ISO-8601)
    #[arg(long, requires = "custom_end")]
    custom_start: Option<String>,

    /// End of a custom range (ISO-8601)
    #[arg(long, requires = "custom_start")]
    custom_end: Option<String>,
}

#[derive(Args)]
struct TripArgs {
    #[command(flatten)]
    range: RangeArgs,

    /// Trips from the last DURATION (e.g. "6h", "3days")
    #[arg(long, value_parser = humantime::parse_duration, conflicts_with_all = ["range", "from"])]
    recent: Option<Duration>,

    /// Start date (ISO-8601); requires --to
    #[arg(long, requires = "to", conflicts_with = "range")]
    from: Option<String>,

    /// End date (ISO-8601)
    #[arg(long, requires = "from")]
    to: Option<String>,

    #[arg(long)]
    trip_id: Option<String>,

    #[arg(long)]
    ride_id: Option<String>,

    #[arg(long)]
    driver: Option<String>,

    #[arg(long)]
    rider: Option<String>,

    /// Partial rider or driver phone number
    #[arg(long)]
    phone: Option<String>,

    #[arg(long, value_parser = parse_wire::<TripStatus>)]
    status: Option<TripStatus>,

    #[arg(long, value_parser = parse_wire::<PaymentStatus>)]
    payment_status: Option<PaymentStatus>,

    #[arg(long, value_parser = parse_wire::<RideType>)]
    ride_type: Option<RideType>,

    #[arg(long)]
    min_price: Option<f64>,

    #[arg(long)]
    max_price: Option<f64>,

    /// Number of trips to return (0 for analytics only)
    #[arg(long)]
    size: Option<u32>,

    #[arg(long, value_parser = parse_wire::<SortField>)]
    sort_by: Option<SortField>,

    #[arg(long, value_parser = parse_wire::<SortOrder>)]
    sort_order: Option<SortOrder>,

    /// Skip the analytics aggregations
    #[arg(long)]
    no_analytics: bool,

    /// Only trips with route geometry
    #[arg(long, conflicts_with = "without_polyline")]
    with_polyline: bool,

    /// Only trips without route geometry
    #[arg(long)]
    without_polyline: bool,

    /// Require geometry to pass the structural length check
    #[arg(long)]
    validate_polyline: bool,
}

impl TripArgs {
    fn filter_options(&self) -> FilterOptions {
        let polyline_required = match (self.with_polyline, self.without_polyline) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        FilterOptions {
            trip_id: self.trip_id.clone(),
            ride_id: self.ride_id.clone(),
            driver_id: self.driver.clone(),
            rider_id: self.rider.clone(),
            rider_phone: self.phone.clone(),
            trip_status: self.status,
            payment_status: self.payment_status,
            ride_type: self.ride_type,
            time_range: self.range.range,
            custom_start: self.range.custom_start.clone(),
            custom_end: self.range.custom_end.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            size: self.size,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            include_analytics: self.no_analytics.then_some(false),
            polyline_required,
            validate_polyline: self.validate_polyline.then_some(true),
            ..Default::default()
        }
    }
}

#[derive(Args)]
struct LocationArgs {
    /// Driver id
    driver_id: String,

    #[command(flatten)]
    range: RangeArgs,

    /// Pings from the last DURATION (e.g. "6h"); rounded up to whole hours
    #[arg(long, value_parser = humantime::parse_duration, conflicts_with_all = ["range", "from"])]
    last: Option<Duration>,

    /// Start date (ISO-8601); requires --to
    #[arg(long, requires = "to", conflicts_with = "range")]
    from: Option<String>,

    /// End date (ISO-8601)
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Maximum number of pings
    #[arg(long)]
    size: Option<u32>,

    /// Skip the backend distance computation
    #[arg(long)]
    no_distance: bool,
}

/// Parse a value by its wire name, e.g. `completed` or `createdAt`
fn parse_wire<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unrecognized value '{value}'"))
}

fn whole_hours(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs().div_ceil(3_600)).unwrap_or(i64::MAX)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    match run(cli.command, cli.format, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run one command; `Ok(false)` when the entry point reported a failure
async fn run(command: Commands, format: OutputFormat, config: &Config) -> anyhow::Result<bool> {
    let gateway: Arc<dyn SearchGateway> = Arc::new(
        ElasticsearchGateway::new(&config.elasticsearch)
            .context("failed to set up the search backend client")?,
    );
    let state = AppState::new(gateway, Arc::new(SystemClock), config);
    debug!(trips = %config.indices.trips, locations = %config.indices.ride_locations, "Client ready");

    match command {
        Commands::Trips(args) => {
            let options = args.filter_options();
            let response = match (args.recent, args.from, args.to) {
                (Some(recent), _, _) => {
                    let req = RecentTripsRequest {
                        value: whole_hours(recent),
                        unit: Some("hours".to_string()),
                        options,
                    };
                    handlers::get_recent_trips(&state, req).await
                }
                (None, Some(start_date), Some(end_date)) => {
                    let req = DateRangeRequest {
                        start_date,
                        end_date,
                        options,
                    };
                    handlers::get_trips_by_date_range(&state, req).await
                }
                _ => handlers::fetch_trips(&state, options).await,
            };
            emit(&response, format)
        }
        Commands::Trip { id } => emit(&handlers::get_trip_by_id(&state, &id).await, format),
        Commands::Search { text, size } => emit(
            &handlers::search_trips(&state, SearchRequest { text, size }).await,
            format,
        ),
        Commands::Driver {
            id,
            range,
            start,
            end,
        } => {
            let selection = RangeSelection {
                time_range: range.range,
                custom_start: range.custom_start,
                custom_end: range.custom_end,
                start_time: start,
                end_time: end,
            };
            emit(
                &handlers::get_driver_analytics(&state, &id, selection).await,
                format,
            )
        }
        Commands::Polylines {
            range,
            driver,
            status,
            ride_type,
        } => {
            let options = FilterOptions {
                time_range: range.range,
                custom_start: range.custom_start,
                custom_end: range.custom_end,
                driver_id: driver,
                trip_status: status,
                ride_type,
                ..Default::default()
            };
            emit(
                &handlers::get_polyline_statistics(&state, options).await,
                format,
            )
        }
        Commands::ValidatePolyline { id } => emit(
            &handlers::validate_trip_polyline(&state, &id).await,
            format,
        ),
        Commands::BulkValidate { ids } => emit(
            &handlers::bulk_validate_polylines(&state, BulkValidateRequest { trip_ids: ids })
                .await,
            format,
        ),
        Commands::Locations(args) => {
            let options = LocationOptions {
                size: args.size,
                calculate_distance: args.no_distance.then_some(false),
                ..Default::default()
            };
            let driver_id = args.driver_id.as_str();
            let response = match (args.last, args.from, args.to, args.range.range) {
                (Some(last), ..) => {
                    handlers::get_recent_ride_location_history(
                        &state,
                        driver_id,
                        Some(whole_hours(last)),
                        options,
                    )
                    .await
                }
                (None, Some(start_date), Some(end_date), _) => {
                    let req = LocationRangeRequest {
                        start_date,
                        end_date,
                        options,
                    };
                    handlers::get_ride_location_history_by_time_range(&state, driver_id, req)
                        .await
                }
                (None, _, _, Some(token)) => {
                    let req = LocationSearchRequest {
                        time_range: Some(token.as_str().to_string()),
                        custom_start: args.range.custom_start,
                        custom_end: args.range.custom_end,
                        limit: args.size,
                    };
                    handlers::search_ride_locations(&state, driver_id, req).await
                }
                _ => handlers::fetch_ride_location_history(&state, driver_id, options).await,
            };
            emit(&response, format)
        }
    }
}

/// Print the envelope to stdout and report whether it carries a success
fn emit<T: Serialize>(response: &ApiResponse<T>, format: OutputFormat) -> anyhow::Result<bool> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(response)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(response)?,
    };
    println!("{rendered}");
    Ok(response.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_trip_flags_map_to_filter_options() {
        let cli = Cli::parse_from([
            "tripscope",
            "trips",
            "--status",
            "completed",
            "--range",
            "last7d",
            "--sort-by",
            "price",
            "--without-polyline",
            "--no-analytics",
        ]);
        let Commands::Trips(args) = cli.command else {
            panic!("expected trips command");
        };
        let options = args.filter_options();
        assert_eq!(options.trip_status, Some(TripStatus::Completed));
        assert_eq!(options.time_range, Some(TimeRangeToken::Last7d));
        assert_eq!(options.sort_by, Some(SortField::Price));
        assert_eq!(options.polyline_required, Some(false));
        assert_eq!(options.include_analytics, Some(false));
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Cli::try_parse_from(["tripscope", "trips", "--status", "lost"]).is_err());
    }

    #[test]
    fn test_whole_hours_rounds_up() {
        assert_eq!(whole_hours(Duration::from_secs(90 * 60)), 2);
        assert_eq!(whole_hours(Duration::from_secs(3 * 86_400)), 72);
    }
}
