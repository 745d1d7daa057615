//! CLI entrypoint for the priority-inversion condvar stress harness.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use picv_harness::{Harness, RunConfig, SchedMode};

/// Provoke and observe priority inversion around a bounded buffer.
#[derive(Debug, Parser)]
#[command(name = "picv-stress")]
#[command(about = "Priority-inversion stress harness for PI-aware condition variables")]
struct Cli {
    /// Number of producer threads.
    #[arg(short = 'p', long, default_value_t = 1)]
    producers: usize,

    /// Number of consumer threads.
    #[arg(short = 'c', long, default_value_t = 1)]
    consumers: usize,

    /// Number of annoyer (interference) threads.
    #[arg(short = 'a', long, default_value_t = 1)]
    annoyers: usize,

    /// Register roles as condvar priority-inheritance helpers.
    #[arg(short = 'P', long = "pi-helpers")]
    pi_helpers: bool,

    /// Bracket the run with ftrace marker annotations.
    #[arg(short = 'f', long)]
    ftrace: bool,

    /// Run duration in seconds.
    #[arg(short = 'd', long, default_value_t = 10)]
    duration: u64,

    /// Buffer capacity.
    #[arg(short = 'b', long, default_value_t = picv_harness::config::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Skip CPU pinning and SCHED_FIFO setup (no inversion, but runs
    /// unprivileged).
    #[arg(long)]
    best_effort: bool,

    /// Print the summary as JSON instead of a text line.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RunConfig {
        producers: cli.producers,
        consumers: cli.consumers,
        annoyers: cli.annoyers,
        pi_helpers: cli.pi_helpers,
        ftrace: cli.ftrace,
        duration: Duration::from_secs(cli.duration),
        capacity: cli.capacity,
        sched: if cli.best_effort {
            SchedMode::BestEffort
        } else {
            SchedMode::RealTime
        },
        ..Default::default()
    };

    let summary = Harness::new(config)
        .context("invalid configuration")?
        .run()
        .context("harness run failed")?;

    if cli.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("{summary}");
    }
    Ok(())
}
