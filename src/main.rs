//! CLI entry point for the transit punctuality tool.
//!
//! Provides subcommands for building stop-pair statistics, correlating delays
//! with weather, and proposing schedule adjustments.

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_punctuality::{
    config::{AnalysisConfig, WindowConfig},
    fetch::load_source,
    input::{read_stop_events, read_stop_pair_stats, read_weather_observations},
    optimizer::{ScheduleOptimizer, SolveStatus},
    output::{append_records, print_json, print_pretty, write_solution},
    pipeline::{self, StopEvent, StopEventNormalizer, StopPairAggregator, StopPairStat},
    weather::WeatherCorrelator,
};

const DEFAULT_WINDOW_MINUTES: u32 = 5;

#[derive(Parser)]
#[command(name = "transit_punctuality")]
#[command(about = "Delay dynamics and schedule adjustment for transit stop events", long_about = None)]
struct Cli {
    /// JSON analysis config; flags given on the command line take priority
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate stop events into per stop-pair statistics
    Segments {
        /// Path to file or URL with stop events
        #[arg(value_name = "EVENTS")]
        events: String,

        /// CSV file to append results to
        #[arg(short, long, default_value = "stop_pairs.csv")]
        output: String,

        /// Target time of day (HH:MM:SS); repeat for several bands
        #[arg(long = "target")]
        targets: Vec<NaiveTime>,

        /// Half-width of each band in minutes
        #[arg(long)]
        window_minutes: Option<u32>,

        /// Keep only pairs seen more often than this
        #[arg(long)]
        min_support: Option<usize>,
    },
    /// Correlate arrival delays with weather observations
    Correlate {
        /// Path to file or URL with stop events
        #[arg(value_name = "EVENTS")]
        events: String,

        /// Path to file or URL with long-form weather observations
        #[arg(value_name = "WEATHER")]
        weather: String,

        /// Weather element to correlate against; repeat for several
        #[arg(long = "element")]
        elements: Vec<String>,
    },
    /// Propose per-stop schedule adjustments
    Optimize {
        /// Path to file or URL with stop events
        #[arg(value_name = "EVENTS", required_unless_present = "stats")]
        events: Option<String>,

        /// Previously written stop-pair CSV, used instead of raw events
        #[arg(long, conflicts_with = "events")]
        stats: Option<String>,

        /// Largest shift in minutes for a single stop
        #[arg(long)]
        max_adjustment: Option<f64>,

        /// Optional: JSON file to write the solution to
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transit_punctuality.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_punctuality.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let normalizer = StopEventNormalizer::new(config.precedence.clone());

    match cli.command {
        Commands::Segments {
            events,
            output,
            targets,
            window_minutes,
            min_support,
        } => {
            let window = window_overrides(config.window.clone(), targets, window_minutes, min_support);
            let events = load_events(&events, &normalizer).await?;
            let stats = segment_stats(&events, window.as_ref())?;

            print_pretty(&stats);
            append_records(&output, &stats)
                .with_context(|| format!("failed to write '{output}'"))?;
            info!(pairs = stats.len(), output = %output, "Stop-pair statistics written");
        }
        Commands::Correlate {
            events,
            weather,
            elements,
        } => {
            let elements = if elements.is_empty() {
                config.weather_elements.clone()
            } else {
                elements
            };

            let events = load_events(&events, &normalizer).await?;
            let bytes = load_source(&weather).await?;
            let observations = read_weather_observations(bytes.as_slice())
                .with_context(|| format!("failed to read weather from '{weather}'"))?;

            let coefficients =
                WeatherCorrelator.correlate_elements(&events, &observations, &elements);
            for (element, coefficient) in &coefficients {
                if coefficient.is_none() {
                    warn!(element = %element, "Not enough matched rows for a coefficient");
                }
            }
            print_json(&coefficients)?;
        }
        Commands::Optimize {
            events,
            stats,
            max_adjustment,
            output,
        } => {
            let stats = match (stats, events) {
                (Some(path), _) => {
                    let bytes = load_source(&path).await?;
                    read_stop_pair_stats(bytes.as_slice())
                        .with_context(|| format!("failed to read stop pairs from '{path}'"))?
                }
                (None, Some(source)) => {
                    let events = load_events(&source, &normalizer).await?;
                    segment_stats(&events, config.window.as_ref())?
                }
                (None, None) => bail!("either EVENTS or --stats must be given"),
            };

            let mut settings = config.optimizer.clone();
            if let Some(max) = max_adjustment {
                settings.max_adjustment_per_stop = max;
            }
            let max_adjustment = settings.max_adjustment_per_stop;

            let mut optimizer = ScheduleOptimizer::new(settings);
            let model = optimizer.build(&stats, max_adjustment)?;
            info!(
                stops = model.stops().count(),
                constraints = model.program().constraints().len(),
                "Schedule model built"
            );
            let solution = optimizer.solve()?;

            if solution.status != SolveStatus::Optimal {
                warn!(status = ?solution.status, "No optimal schedule found");
            }
            print_json(&solution)?;
            if let Some(path) = output {
                write_solution(&path, &solution)?;
            }
        }
    }

    Ok(())
}

/// Loads raw stop events and runs them through the enrichment stages.
#[tracing::instrument(skip(normalizer))]
async fn load_events(source: &str, normalizer: &StopEventNormalizer) -> Result<Vec<StopEvent>> {
    let bytes = load_source(source).await?;
    let raw = read_stop_events(bytes.as_slice())
        .with_context(|| format!("failed to read stop events from '{source}'"))?;
    Ok(pipeline::enrich(normalizer, raw))
}

fn segment_stats(events: &[StopEvent], window: Option<&WindowConfig>) -> Result<Vec<StopPairStat>> {
    let stats = match window {
        Some(w) => StopPairAggregator.aggregate_windows(events, &w.windows()?, w.min_support),
        None => StopPairAggregator.aggregate(events),
    };
    Ok(stats)
}

/// Applies window flags on top of the configured window. Targets given on the
/// command line replace the configured ones.
fn window_overrides(
    configured: Option<WindowConfig>,
    targets: Vec<NaiveTime>,
    window_minutes: Option<u32>,
    min_support: Option<usize>,
) -> Option<WindowConfig> {
    let base = match (configured, targets.is_empty()) {
        (Some(mut w), false) => {
            w.targets = targets;
            w
        }
        (Some(w), true) => w,
        (None, false) => WindowConfig {
            targets,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            min_support: 0,
        },
        (None, true) => return None,
    };

    Some(WindowConfig {
        window_minutes: window_minutes.unwrap_or(base.window_minutes),
        min_support: min_support.unwrap_or(base.min_support),
        ..base
    })
}
