use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tickline_algo::library::RebalanceAlgorithm;
use tickline_algo::TradingAlgorithm;
use tickline_risk::RiskEngine;
use tracing::info;

mod config;
mod data;

use config::Config;

#[derive(Parser, Debug)]
#[clap(name = "tickline-bench", about = "Portfolio rebalancing benchmark")]
struct Args {
    #[clap(short, long, default_value = "bench/config.yaml")]
    config: PathBuf,

    /// Write daily stats as JSON
    #[clap(short, long)]
    output: Option<PathBuf>,
}

fn format_metric(value: tickline_risk::RiskResult<f64>) -> String {
    match value {
        Ok(v) => v.to_string(),
        Err(e) => format!("n/a ({})", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Loading configuration from {:?}", args.config);
    let config = Config::load(&args.config)?;

    let data = data::load_data(&config.data)?;

    let algo = RebalanceAlgorithm::new(config.portfolio.clone())?;
    let mut runner = TradingAlgorithm::new(algo);
    runner
        .set_capital_base(config.backtest.capital_base)
        .set_risk_free_rate(config.backtest.risk_free_rate)
        .set_slippage(config.backtest.slippage.build())
        .set_commission(config.backtest.commission)
        .set_benchmark(config.backtest.benchmark.clone());

    if let Some(policy_file) = &config.backtest.risk_policy {
        info!("Loading risk policies from {:?}", policy_file);
        let policy_yaml = std::fs::read_to_string(policy_file)
            .with_context(|| format!("Failed to read {}", policy_file.display()))?;
        let risk_engine = RiskEngine::from_yaml(&policy_yaml)
            .map_err(|e| anyhow::anyhow!("Failed to load risk policy: {}", e))?;
        runner.set_risk_engine(risk_engine);
    }

    for (tag, spec) in &config.backtest.transforms {
        runner.add_transform_spec(tag.clone(), spec)?;
    }

    // Run algorithm
    let start_time = Instant::now();
    let stats = runner.run(&data).await?;
    let elapsed = start_time.elapsed();

    let tracker = runner
        .perf_tracker()
        .context("Simulation did not produce a performance tracker")?;
    let risk = tracker.cumulative_risk_metrics();
    let cumulative = tracker.cumulative_performance();

    println!("Risk Metrics");
    println!("Trading days: {}", risk.trading_days());
    println!("Max Draw Down: {}", risk.calculate_max_drawdown());
    println!("Return: {}", tracker.returns());
    println!(
        "Return: {}",
        cumulative.returns(tracker.cash(), tracker.positions_value())
    );
    println!("Sharpe: {}", format_metric(risk.calculate_sharpe()));
    println!("Sortino: {}", format_metric(risk.calculate_sortino()));
    println!("--- {:.3} seconds ---", elapsed.as_secs_f64());

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote daily stats to {:?}", output);
    }

    Ok(())
}
