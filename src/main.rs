//! CLI entry point for the linkflow tool.
//!
//! Provides subcommands for aggregating a single simulation run's event
//! stream into per-link traffic statistics, batch-processing many runs,
//! and querying activities by zone and time interval.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use linkflow::events::{EventFilter, read_events};
use linkflow::export::{upload_gzipped_csv, write_json_to_s3};
use linkflow::fetch::{BasicClient, BearerToken, fetch_bytes};
use linkflow::network::{LinkTable, read_links};
use linkflow::output::{print_json, write_records};
use linkflow::simtime::SimTime;
use linkflow::traffic::{AnomalyKind, AnomalyLog, LinkFlowRecord, WindowMode, aggregate_events};
use linkflow::zones::{Interval, load_zones, read_activities, zone_activities};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "linkflow")]
#[command(about = "Per-link traffic statistics from simulation event streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate one run's event stream into per-link window statistics
    Aggregate {
        /// Path or URL of the events CSV export
        #[arg(value_name = "FILE_OR_URL")]
        events: String,

        /// Path to the links CSV export (link_id,length,freespeed)
        #[arg(short, long)]
        network: String,

        /// Aggregation window in simulation seconds
        #[arg(short, long, default_value_t = 3600.0)]
        window: f64,

        /// Keep aggregating window after window instead of stopping after
        /// the first one
        #[arg(long, default_value_t = false)]
        rolling: bool,

        /// CSV file to write results to
        #[arg(short, long, default_value = "link_stats.csv")]
        output: String,

        /// Also log the result set as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Optional: S3 bucket to upload the result set to as JSON
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: bearer token for fetching events over HTTP
        #[arg(long)]
        bearer_token: Option<String>,
    },
    /// Aggregate every run under a directory of run_id=* folders
    Batch {
        /// Directory containing run_id=* subdirectories with events.csv
        #[arg(short, long, default_value = "runs")]
        input_dir: String,

        /// Path to the links CSV export shared by all runs
        #[arg(short, long)]
        network: String,

        /// Aggregation window in simulation seconds
        #[arg(short, long, default_value_t = 3600.0)]
        window: f64,

        /// Keep aggregating window after window instead of stopping after
        /// the first one
        #[arg(long, default_value_t = false)]
        rolling: bool,

        /// Maximum number of runs processed concurrently
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Optional: S3 bucket to upload gzipped per-run CSVs to
        #[arg(long)]
        s3_bucket: Option<String>,
    },
    /// List activities performed inside zones during a time interval
    Zones {
        /// Path to the activities CSV export
        #[arg(short, long)]
        activities: String,

        /// GeoJSON file with zone polygons
        #[arg(short, long)]
        zones: String,

        /// Interval start on the simulation clock
        #[arg(long, default_value = "00:00:00")]
        start_time: String,

        /// Interval end on the simulation clock (may pass midnight)
        #[arg(long, default_value = "32:00:00")]
        end_time: String,

        /// Require activities to start and end inside the interval
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Field delimiter of the activities CSV
        #[arg(long, default_value_t = ';')]
        delimiter: char,

        /// CSV file to write matches to
        #[arg(short, long, default_value = "zone_activity.csv")]
        output: String,

        /// Also log the matches as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/linkflow.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("linkflow.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            events,
            network,
            window,
            rolling,
            output,
            json,
            s3_bucket,
            bearer_token,
        } => {
            run_aggregate(
                &events,
                &network,
                window,
                rolling,
                &output,
                json,
                s3_bucket,
                bearer_token,
            )
            .await?;
        }
        Commands::Batch {
            input_dir,
            network,
            window,
            rolling,
            concurrency,
            s3_bucket,
        } => {
            run_batch(&input_dir, &network, window, rolling, concurrency, s3_bucket).await?;
        }
        Commands::Zones {
            activities,
            zones,
            start_time,
            end_time,
            strict,
            delimiter,
            output,
            json,
        } => {
            run_zones(
                &activities,
                &zones,
                &start_time,
                &end_time,
                strict,
                delimiter,
                &output,
                json,
            )?;
        }
    }

    Ok(())
}

/// Loads an export from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(bearer_token), fields(source = %source))]
async fn fetcher(source: &str, bearer_token: Option<&str>) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        match bearer_token {
            Some(token) => {
                let client = BearerToken::new(BasicClient::new(), token);
                fetch_bytes(&client, source).await?
            }
            None => {
                let client = BasicClient::new();
                fetch_bytes(&client, source).await?
            }
        }
    } else {
        std::fs::read(source)?
    };
    Ok(bytes)
}

fn window_mode(rolling: bool) -> WindowMode {
    if rolling {
        WindowMode::Rolling
    } else {
        WindowMode::Single
    }
}

/// The JSON document uploaded for one aggregated run.
#[derive(Serialize)]
struct ResultDocument<'a> {
    generated_at: DateTime<Utc>,
    window_seconds: f64,
    rows: &'a [LinkFlowRecord],
}

async fn run_aggregate(
    events_source: &str,
    network: &str,
    window: f64,
    rolling: bool,
    output: &str,
    json: bool,
    s3_bucket: Option<String>,
    bearer_token: Option<String>,
) -> Result<()> {
    let links = read_links(File::open(network).context("opening links export")?)?;
    let event_bytes = fetcher(events_source, bearer_token.as_deref()).await?;

    let filter = EventFilter::default();
    let events = read_events(&event_bytes[..], &filter)?;
    if events.is_empty() {
        bail!("no aggregatable events in {events_source}");
    }

    let mut anomalies = AnomalyLog::new();
    let records = aggregate_events(&events, &links, window, window_mode(rolling), &mut anomalies)?;

    log_anomaly_summary(&anomalies);
    write_records(output, &records)?;
    info!(output, rows = records.len(), "Aggregation written");

    if json {
        print_json(&records)?;
    }

    if let Some(bucket) = s3_bucket {
        let config = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&config);
        let document = ResultDocument {
            generated_at: Utc::now(),
            window_seconds: window,
            rows: &records,
        };
        write_json_to_s3(&s3, &bucket, "aggregates/link_stats.json", &document).await?;
        info!(bucket = %bucket, "Result set uploaded");
    }

    Ok(())
}

async fn run_batch(
    input_dir: &str,
    network: &str,
    window: f64,
    rolling: bool,
    concurrency: usize,
    s3_bucket: Option<String>,
) -> Result<()> {
    let links = Arc::new(read_links(File::open(network).context("opening links export")?)?);

    let s3_client = if s3_bucket.is_some() {
        let config = aws_config::load_from_env().await;
        Some(aws_sdk_s3::Client::new(&config))
    } else {
        None
    };

    if let Some(ref bucket) = s3_bucket {
        info!(bucket = %bucket, "S3 upload enabled");
    }

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
    let mut tasks = vec![];

    for entry in std::fs::read_dir(input_dir)? {
        let entry = entry?;
        let dir_name = entry.file_name();
        let dir_name_str = dir_name.to_str().unwrap_or("");
        if !entry.path().is_dir() || !dir_name_str.starts_with("run_id=") {
            continue;
        }
        let run_id = dir_name_str["run_id=".len()..].to_string();

        let events_path = entry.path().join("events.csv");
        if !events_path.exists() {
            warn!(run_id = %run_id, "Run directory without events.csv skipped");
            continue;
        }
        let output_path = entry.path().join("link_stats.csv");

        let sem = semaphore.clone();
        let links = links.clone();
        let s3 = s3_client.clone();
        let bucket = s3_bucket.clone();

        let run_span = tracing::info_span!("process_run", run_id = %run_id);

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await.unwrap();

                let output = output_path.to_string_lossy().to_string();
                match process_run(&events_path, &links, window, rolling, &output) {
                    Ok(rows) => {
                        info!(rows, "Run aggregated");

                        if let (Some(s3), Some(bucket)) = (&s3, &bucket) {
                            let key = format!("run_id={run_id}/link_stats.csv");
                            if let Err(e) = upload_gzipped_csv(s3, bucket, &key, &output).await {
                                error!(error = %e, "Upload failed for run");
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Run aggregation failed");
                    }
                }
            }
            .instrument(run_span),
        );

        tasks.push(task);
    }

    if tasks.is_empty() {
        bail!("no run_id=* directories with events.csv under {input_dir}");
    }

    let total = tasks.len();
    for task in tasks {
        let _ = task.await;
    }

    info!(runs = total, input_dir, "Batch finished");
    Ok(())
}

/// Aggregates a single run's events into a per-run stats CSV.
fn process_run(
    events_path: &Path,
    links: &LinkTable,
    window: f64,
    rolling: bool,
    output: &str,
) -> Result<usize> {
    let filter = EventFilter::default();
    let events = read_events(File::open(events_path)?, &filter)?;
    if events.is_empty() {
        bail!("no aggregatable events in {}", events_path.display());
    }

    let mut anomalies = AnomalyLog::new();
    let records = aggregate_events(&events, links, window, window_mode(rolling), &mut anomalies)?;

    log_anomaly_summary(&anomalies);
    write_records(output, &records)?;
    Ok(records.len())
}

fn run_zones(
    activities_path: &str,
    zones_path: &str,
    start_time: &str,
    end_time: &str,
    strict: bool,
    delimiter: char,
    output: &str,
    json: bool,
) -> Result<()> {
    let interval = Interval {
        start: SimTime::parse(start_time)?,
        end: SimTime::parse(end_time)?,
    };
    if interval.end <= interval.start {
        bail!("interval end {end_time} is not after start {start_time}");
    }

    let zones = load_zones(File::open(zones_path).context("opening zones file")?)?;
    if zones.is_empty() {
        bail!("no usable zones in {zones_path}");
    }

    let activities = read_activities(
        File::open(activities_path).context("opening activities export")?,
        delimiter as u8,
    )?;

    let matches = zone_activities(&zones, &activities, &interval, strict);
    info!(
        zones = zones.len(),
        activities = activities.len(),
        matches = matches.len(),
        strict,
        "Zone query complete"
    );

    write_records(output, &matches)?;

    if json {
        print_json(&matches)?;
    }

    Ok(())
}

fn log_anomaly_summary(anomalies: &AnomalyLog) {
    if anomalies.is_empty() {
        return;
    }
    warn!(
        total = anomalies.len(),
        orphan_exits = anomalies.count_of(AnomalyKind::OrphanExit),
        zero_dwell = anomalies.count_of(AnomalyKind::NonPositiveDwell),
        "Event pairing anomalies during aggregation"
    );
}
