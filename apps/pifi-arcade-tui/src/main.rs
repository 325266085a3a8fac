mod app;
mod args;
mod input;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::FmtSubscriber;

use crate::{app::App, args::Args};

/// The terminal owns stdout, so logs go to a file.
fn init_tracing(args: &Args) -> Result<WorkerGuard> {
    let dir = args
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ".".into());
    let file_name = args
        .log_file
        .file_name()
        .context("log file path has no file name")?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_ansi(false)
        .with_writer(writer)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&args)?;
    let mut app = App::new(args)?;
    app.run()
}
