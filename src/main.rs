use std::process;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use wots_vault::application::commands;
use wots_vault::application::config::cli_args;

pub fn main() -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("Could not create tokio runtime");

    let run_result = tokio_runtime.block_on(async {
        let args = cli_args::Args::parse();
        set_up_logger();
        commands::run(args).await
    });

    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(10));

    if let Err(e) = run_result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
    Ok(())
}

/// Configure logger to use ISO-8601, of which rfc3339 is a subset. Install
/// global collector configured based on RUST_LOG env var. Accepted `RUST_LOG`
/// values are `trace`, `debug`, `info`, `warn`, and `error`.
///
/// Logs go to stderr so command output on stdout stays parseable.
fn set_up_logger() {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .map_err(|_err| eprintln!("Unable to set global default subscriber"))
    .expect("Failed to set trace subscriber");
}
