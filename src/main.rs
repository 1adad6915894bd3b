//! price-loadtest - randomized load and correctness test for a price API
//!
//! Virtual users repeatedly pick one of a fixed set of price queries at
//! random, call the price endpoint, and check the status, latency, body
//! and returned price. Results are aggregated into k6-compatible metrics,
//! gated by thresholds, and summarized at the end of the run.
//!
//! ## Usage
//!
//! ```bash
//! # Run the normal, spike and stress scenarios together
//! price-loadtest run --host localhost:8081
//!
//! # Run one scenario with a fixed seed
//! price-loadtest run --scenario spike --seed 42
//!
//! # Ad-hoc constant load
//! price-loadtest run --vus 20 --duration 1m
//!
//! # Re-print the summary of a previous run
//! price-loadtest summary --file performance-results.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod config;
mod harness;
mod http;
mod metrics;
mod models;
mod scheduler;
mod summary;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use harness::checks::check_names;
use harness::{build_url, Harness, RequestInvoker};
use http::HttpClient;
use metrics::threshold::{self, required_percentiles};
use metrics::{MetricsSink, MetricsSnapshot, Threshold};
use scheduler::{parse_duration, Runner, Scenario};
use utils::{init_logger, LogLevel};

/// Exit status when a threshold is crossed
const THRESHOLDS_FAILED_EXIT: i32 = 99;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    init_logger(LogLevel::resolve(verbose, args.log_level.as_deref()));

    match args.command {
        cli::Command::Run(run_args) => {
            let enforce = !run_args.no_thresholds;
            let passed = run_load(run_args, &env).await?;
            if enforce && !passed {
                std::io::stdout().flush()?;
                std::process::exit(THRESHOLDS_FAILED_EXIT);
            }
        }
        cli::Command::List(list_args) => {
            list_catalog(list_args, &env)?;
        }
        cli::Command::Summary(summary_args) => {
            show_summary(summary_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &env)?;
        }
    }

    Ok(())
}

/// File settings, then environment overrides
fn resolve_config(path: Option<&str>, env: &EnvConfig) -> Result<AppConfig> {
    let file = match path.or(env.config_file.as_deref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut app = file.app;
    app.apply_env(env);
    Ok(app)
}

/// Command-line overrides, the highest precedence
fn apply_run_args(config: &mut AppConfig, args: &cli::RunArgs) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(pacing) = args.pacing_ms {
        config.pacing_ms = pacing;
    }
    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
}

/// Scenarios a run uses: ad-hoc, selected by name, or all configured
fn select_scenarios(config: &AppConfig, args: &cli::RunArgs) -> Result<Vec<Scenario>> {
    if let (Some(vus), Some(duration)) = (args.vus, args.duration.as_deref()) {
        return Ok(vec![Scenario::constant(vus, parse_duration(duration)?)]);
    }
    if args.scenario.is_empty() {
        return Ok(config.scenarios.clone());
    }
    Ok(scheduler::scenario::select(&config.scenarios, &args.scenario)?)
}

/// Run scenarios and evaluate thresholds
///
/// Returns the snapshot and the thresholds that failed.
async fn execute(
    config: &AppConfig,
    scenarios: &[Scenario],
) -> Result<(MetricsSnapshot, Vec<Threshold>)> {
    let thresholds = config.parsed_thresholds()?;
    let catalog = config.catalog()?;
    let client =
        HttpClient::with_timeout(config.timeout()).context("Failed to create HTTP client")?;

    let sink = Arc::new(
        MetricsSink::new(check_names()).with_percentiles(required_percentiles(&thresholds)),
    );
    let harness = Arc::new(Harness::new(
        RequestInvoker::new(client, config.host.clone()),
        config.checks,
        config.pacer(),
        sink.clone(),
    ));

    let report = Runner::new(harness, catalog)
        .with_seed(config.seed)
        .run(scenarios)
        .await?;
    for (name, started) in &report.vus_started {
        info!("Scenario '{}': {} virtual user(s) started", name, started);
    }
    if report.aborted > 0 {
        warn!(
            "{} virtual user(s) aborted after graceful stop; in-flight iterations may have been dropped",
            report.aborted
        );
    }

    let mut snapshot = sink.snapshot_over(report.elapsed);
    let failed = threshold::apply(&mut snapshot, &thresholds);
    Ok((snapshot, failed))
}

async fn run_load(args: cli::RunArgs, env: &EnvConfig) -> Result<bool> {
    let mut config = resolve_config(args.config.as_deref(), env)?;
    apply_run_args(&mut config, &args);
    config.validate()?;

    let scenarios = select_scenarios(&config, &args)?;
    let planned = scenarios
        .iter()
        .map(Scenario::end_offset)
        .max()
        .unwrap_or_default();
    info!(
        "Testing http://{} with {} scenario(s), about {}",
        config.host,
        scenarios.len(),
        scheduler::scenario::format_duration(planned)
    );

    let (snapshot, failed) = execute(&config, &scenarios).await?;
    for threshold in &failed {
        warn!("Threshold crossed: {}", threshold);
    }

    publish(&snapshot, Path::new(&config.output), &mut std::io::stdout())?;
    Ok(snapshot.thresholds_ok())
}

/// Summary block followed by the checks and thresholds listings
fn render_report(snapshot: &MetricsSnapshot) -> String {
    let mut out = summary::render_summary(snapshot);
    out.push_str("\nChecks:\n");
    out.push_str(&summary::render_checks(snapshot, check_names()));

    let thresholds = summary::render_thresholds(snapshot);
    if !thresholds.is_empty() {
        out.push_str("\nThresholds:\n");
        out.push_str(&thresholds);
    }
    out
}

/// Print the report, then save the snapshot
///
/// The report is written even when saving fails.
fn publish(snapshot: &MetricsSnapshot, output: &Path, out: &mut impl Write) -> Result<()> {
    out.write_all(render_report(snapshot).as_bytes())?;
    out.flush()?;
    summary::save(output, snapshot)
}

fn list_catalog(args: cli::ListArgs, env: &EnvConfig) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), env)?;
    let catalog = config.catalog()?;

    println!("Test Cases:");
    println!("{:-<72}", "");
    for (i, case) in catalog.iter().enumerate() {
        if args.detailed {
            println!("  {}. {}", i + 1, case);
            println!("     {}", build_url(&config.host, &case.params));
        } else {
            println!("  {}. {:40} {:>8.2}", i + 1, case.name, case.expected_price);
        }
    }
    println!();

    println!("Scenarios:");
    println!("{:-<72}", "");
    for scenario in &config.scenarios {
        println!("  {scenario}, peak {} VUs", scenario.executor.max_vus());
    }
    println!();

    println!("Thresholds:");
    println!("{:-<72}", "");
    for (metric, exprs) in &config.thresholds {
        for expr in exprs {
            println!("  {metric}: {expr}");
        }
    }

    Ok(())
}

fn show_summary(args: cli::SummaryArgs) -> Result<()> {
    let snapshot = summary::load(Path::new(&args.file))?;

    print!("{}", render_report(&snapshot));
    if !snapshot.thresholds_ok() {
        warn!("Thresholds were crossed in {}", args.file);
    }
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env: show_env, format } => {
            if show_env {
                if !env.has_any() {
                    println!("No {}_* variables set", config::env::ENV_PREFIX);
                }
                env.print_summary();
            } else {
                let mut file = ConfigFile::load_default()?;
                file.app.apply_env(env);
                let output = if format == "json" {
                    serde_json::to_string_pretty(&file)?
                } else {
                    serde_yaml::to_string(&file)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./price-loadtest.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            config::env::print_env_help();
        }
    }

    Ok(())
}
