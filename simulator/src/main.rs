//! Fundsline Simulator
//!
//! Drives concurrent top-ups and transfers against an in-process ledger and
//! checks the balance and outbox invariants afterwards.

use clap::Parser;
use fundsline_ledger::{ConversionScope, LedgerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod metrics;
mod population;
mod scenario;

use controller::{SimulationController, SimulationSettings};
use scenario::Scenario;

/// Fundsline Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Fundsline ledger load and invariant simulator")]
struct Args {
    /// Number of simulated customers, each with a USD and a EUR account
    #[arg(short, long, default_value = "20")]
    customers: usize,

    /// Number of operations to run
    #[arg(short, long, default_value = "1000")]
    operations: usize,

    /// Maximum operations in flight
    #[arg(long, default_value = "16")]
    concurrency: usize,

    /// Workload shape
    #[arg(short, long, value_enum, default_value = "mixed")]
    scenario: Scenario,

    /// Conversion placement: before or inside the atomic unit
    #[arg(long)]
    scope: Option<ConversionScope>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env();
    let args = Args::parse();
    let log_json = args.log_json || config.log_json;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!log_json).then(tracing_subscriber::fmt::layer))
        .init();

    config
        .dispatcher
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let settings = SimulationSettings {
        customers: args.customers,
        operations: args.operations,
        concurrency: args.concurrency,
        scenario: args.scenario,
        scope: args.scope.unwrap_or(config.conversion_scope),
        seed: args.seed,
        request_timeout: config.gateway.request_timeout,
        dispatcher: config.dispatcher.clone(),
        ..SimulationSettings::default()
    };

    info!("Starting Fundsline Simulator");
    info!("Customers: {}", settings.customers);
    info!("Scenario: {:?}, scope: {}", settings.scenario, settings.scope);

    let mut controller = SimulationController::start(settings).await?;
    controller.initialize().await?;
    controller.run().await?;
    let report = controller.finish().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("Simulation complete");
        info!("Total operations: {}", report.metrics.total_operations);
        info!("Successful: {}", report.metrics.successful_operations);
        info!("Failed: {}", report.metrics.failed_operations());
        for (code, count) in &report.metrics.failures {
            info!("Failed ({}): {}", code, count);
        }
        info!("Average latency: {}us", report.average_latency_us);
        info!("p99 latency: {}us", report.p99_latency_us);
        info!("Throughput: {:.1} ops/s", report.throughput);
        info!(
            "Outbox: {} written, {} expected, {} published",
            report.invariants.outbox_entries,
            report.invariants.expected_outbox_entries,
            report.published
        );
    }

    if !report.invariants.holds() {
        anyhow::bail!("Invariant violation: {:?}", report.invariants);
    }

    Ok(())
}
