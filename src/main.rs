use clap::Parser;
use duequote::core::execution::{ReplicationRunner, SimulationConfig};
use duequote::core::report::RunStatistics;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "duequote",
    about = "Single-machine due-date quoting simulator",
    long_about = "Simulates a machine that quotes due dates to arriving orders,\n\
                  sequences them with a dispatching rule and absorbs withdrawals."
)]
struct Cli {
    /// TOML configuration file; the reference parameters are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the number of replications
    #[arg(long)]
    replications: Option<usize>,
    /// Override the seed of the first replication
    #[arg(long)]
    seed: Option<u64>,
    /// Print full reports as JSON instead of a summary table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(replications) = cli.replications {
        config = config.with_replications(replications);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    config.validate()?;

    let results = ReplicationRunner::new(config).run();
    let mut failed = 0;

    if cli.json {
        let mut reports = Vec::new();
        for result in &results {
            match &result.outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    failed += 1;
                    eprintln!("replication {} failed: {}", result.replication, e);
                }
            }
        }
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!(
            "{:>4} {:>8} {:>7} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "rep", "seed", "orders", "rejected", "w.reject", "tardy", "w.tardy", "canceled", "util"
        );
        for result in &results {
            match &result.outcome {
                Ok(report) => print_row(result.replication, result.seed, &report.statistics),
                Err(e) => {
                    failed += 1;
                    println!("{:>4} {:>8} failed: {}", result.replication, result.seed, e);
                }
            }
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_row(replication: usize, seed: u64, stats: &RunStatistics) {
    println!(
        "{:>4} {:>8} {:>7} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
        replication,
        seed,
        stats.orders,
        stats.rejection_proportion,
        stats.weighted_rejection_proportion,
        stats.tardiness_proportion,
        stats.weighted_tardiness_proportion,
        stats.cancellation_proportion,
        stats.utilization
    );
}
