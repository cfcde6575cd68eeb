use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Crates whose events `--log-level` controls. Everything else, such as
/// tokio internals, stays at `warn`.
const BRICKWIRE_TARGETS: [&str; 4] = [
    "brickwire",
    "brickwire_connection",
    "brickwire_frame",
    "brickwire_transport",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Filter directives for `level`, e.g. `warn,brickwire_connection=debug,...`.
fn directives(level: LogLevel) -> String {
    let level = LevelFilter::from(level);
    let mut directives = vec![LevelFilter::WARN.min(level).to_string()];
    directives.extend(BRICKWIRE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Log to stderr. `RUST_LOG`, when set, replaces the `--log-level` directives.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(level)))
        .unwrap_or_else(|_| EnvFilter::new(LevelFilter::WARN.to_string()));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
