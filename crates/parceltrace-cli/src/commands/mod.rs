mod batch;
mod carriers;
mod detect;
mod track;

use std::time::{Duration, Instant};

use parceltrace_core::{Tracker, TrackerBuilder, TrackerConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub total: usize,
    pub failed: usize,
    pub latency_ms: u64,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            total: 0,
            failed: 0,
            latency_ms: 0,
        }
    }

    pub fn with_counts(mut self, total: usize, failed: usize) -> Self {
        self.total = total;
        self.failed = failed;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let mut result = match &cli.command {
        Command::Track(args) => track::run(args, &build_tracker(cli)?).await?,
        Command::Batch(args) => batch::run(args, &build_tracker(cli)?).await?,
        Command::Carriers => carriers::run()?,
        Command::Detect(args) => detect::run(args)?,
    };

    result.latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Ok(result)
}

fn build_tracker(cli: &Cli) -> Result<Tracker, CliError> {
    let tracker = TrackerBuilder::new()
        .with_env_config()
        .with_config(TrackerConfig {
            max_concurrency: cli.concurrency,
            request_timeout: Duration::from_millis(cli.timeout_ms),
            ..TrackerConfig::default()
        })
        .build()?;

    if !tracker.has_aggregator() {
        tracing::debug!("kuaidi100 fallback is not configured");
    }
    Ok(tracker)
}
