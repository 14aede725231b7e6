use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use domainlog::{DomainLogModule, HostCapabilities, LogBus, PlainRenderer, config, logging};

/// Route stdin lines into per-domain log files.
///
/// Each line becomes one log event. Lines are routed by a `domain_name=` or `domain=` token in
/// the text, or by `--domain` for all of them.
#[derive(Parser)]
#[command(name = "domainlog", version)]
struct Cli {
    /// Override `DOMAINLOG_DIR`.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Attach every line to a session for this domain.
    #[arg(long)]
    domain: Option<String>,
    /// Level the lines are emitted at.
    #[arg(long, value_enum, default_value_t = EmitLevel::Info)]
    level: EmitLevel,
}

/// Levels a stdin line can be emitted at. Each one routes under the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EmitLevel {
    #[value(alias = "error")]
    Err,
    #[value(alias = "warn")]
    Warning,
    Info,
    Debug,
}

impl EmitLevel {
    fn tracing_level(self) -> tracing::Level {
        match self {
            Self::Err => tracing::Level::ERROR,
            Self::Warning => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let bus = Arc::new(LogBus::new());
    logging::init_tracing(Arc::clone(&bus));

    let mut config = config::load_config().context("failed to load configuration")?;
    if let Some(log_dir) = cli.log_dir {
        config.log_dir = log_dir;
    }

    let module = DomainLogModule::load(
        &config,
        bus,
        &HostCapabilities::with_renderer(PlainRenderer),
    )
    .context("failed to load domain logging")?;

    let session = match &cli.domain {
        Some(domain) => tracing::info_span!(
            target: "stdin",
            "session",
            domain_name = %domain,
            uuid = %uuid::Uuid::new_v4()
        ),
        None => tracing::Span::none(),
    };

    session.in_scope(|| -> Result<()> {
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read stdin")?;
            emit(cli.level, &line);
        }
        Ok(())
    })?;

    let report = module.shutdown();
    println!(
        "{}",
        serde_json::to_string_pretty(&report.metrics).context("failed to encode metrics")?
    );
    Ok(())
}

fn emit(level: EmitLevel, line: &str) {
    match level.tracing_level() {
        tracing::Level::ERROR => tracing::error!(target: "stdin", "{line}"),
        tracing::Level::WARN => tracing::warn!(target: "stdin", "{line}"),
        tracing::Level::INFO => tracing::info!(target: "stdin", "{line}"),
        _ => tracing::debug!(target: "stdin", "{line}"),
    }
}
