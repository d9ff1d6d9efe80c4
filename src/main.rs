// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dbfanout::config::{self, RunSettings};
use dbfanout::export::{persist_run, ArtifactFormat, FileSink};
use dbfanout::fanout::{AggregationMode, FanoutRunner, DEFAULT_MAX_CONCURRENCY};
use dbfanout::observability::{init_tracing, LogSettings};
use dbfanout::SqlxConnector;

/// Run one read query against every database behind a connection profile.
#[derive(Parser, Debug)]
#[command(name = "dbfanout", version, about)]
struct Args {
    /// Profile name in the profiles file
    #[arg(long, short = 'p')]
    profile: String,

    /// Query file, relative to the SQL directory
    #[arg(long, short = 'q')]
    query_file: String,

    /// `unified` merges every row into one artifact; `separate` writes one per database
    #[arg(long, short = 'm', default_value = "unified")]
    mode: AggregationMode,

    /// YAML file holding the `databases:` profiles
    #[arg(long, env = "DBFANOUT_PROFILES", default_value = config::DEFAULT_PROFILES_FILE)]
    profiles_file: PathBuf,

    #[arg(long, default_value = config::DEFAULT_SQL_DIR)]
    sql_dir: PathBuf,

    #[arg(long, default_value = config::DEFAULT_OUTPUT_DIR)]
    out_dir: PathBuf,

    #[arg(long, default_value = "xlsx")]
    format: ArtifactFormat,

    /// Databases queried at the same time
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Per-database deadline in seconds, counted once the query gets a slot
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory for the rolling JSON log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut log_settings = LogSettings::default();
    if let Some(dir) = &args.log_dir {
        log_settings.directory = dir.clone();
    }
    init_tracing(&log_settings);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run aborted: {:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let profile = config::load_profile(&args.profiles_file, &args.profile)
        .context("loading connection profile")?;
    let query = config::load_query(&args.sql_dir, &args.query_file).context("loading query")?;

    let settings = RunSettings {
        max_concurrency: args.max_concurrency,
        task_timeout: args.timeout_secs.map(Duration::from_secs),
        output_dir: args.out_dir,
        format: args.format,
        ..RunSettings::default()
    };
    let sink = FileSink::new(settings.output_dir.clone(), settings.format);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding targets");
            on_signal.cancel();
        }
    });

    let runner = FanoutRunner::new(Arc::new(SqlxConnector::new()), settings).with_cancel(cancel);
    let output = runner
        .run(
            profile.credentials,
            profile.discovery_query.as_deref(),
            &query,
            args.mode,
        )
        .await
        .context("running fan-out")?;

    info!(run_id = %output.run_id, targets = output.targets.len(), "Run complete");

    let summary = persist_run(&output.result, &sink).await;

    println!("{}", output.report);
    if output.result.artifacts().is_empty() {
        println!("No results found in any database");
    }
    for path in &summary.written {
        println!("  wrote   {}", path.display());
    }
    for failure in &summary.failed {
        println!("  unsaved {}: {}", failure.name, failure.message);
    }

    Ok(())
}
