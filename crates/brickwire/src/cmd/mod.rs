use std::time::Duration;

use brickwire_connection::{ConnectionConfig, IpConnection, Secret};
use brickwire_transport::DEFAULT_PORT;
use clap::{ArgGroup, Args, Subcommand};

use crate::exit::{connection_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod enumerate;
pub mod ping;
pub mod send;
pub mod uid;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List devices reachable through the daemon.
    Enumerate(EnumerateArgs),
    /// Send a single raw request.
    Send(SendArgs),
    /// Connect, authenticate and send a disconnect probe.
    Ping(PingArgs),
    /// Convert UIDs between base58 and numeric form.
    Uid(UidArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Enumerate(args) => enumerate::run(args, format).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Ping(args) => ping::run(args, format).await,
        Command::Uid(args) => uid::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to reach the daemon.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Daemon host name or address.
    #[arg(long, env = "BRICKWIRE_HOST", default_value = "localhost")]
    pub host: String,
    /// Daemon port.
    #[arg(long, env = "BRICKWIRE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Authentication secret.
    #[arg(long, env = "BRICKWIRE_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
    /// Connect and response timeout (e.g. 2s, 2500ms).
    #[arg(long, default_value = "2500ms")]
    pub timeout: String,
}

impl ConnectArgs {
    pub fn config(&self) -> CliResult<ConnectionConfig> {
        let mut config = ConnectionConfig::new(self.host.clone(), self.port)
            .with_timeout(parse_duration(&self.timeout)?);
        if let Some(secret) = &self.secret {
            let secret = Secret::new(secret).map_err(|err| connection_error("--secret", err))?;
            config = config.with_secret(secret);
        }
        Ok(config)
    }

    pub async fn connect(&self) -> CliResult<IpConnection> {
        let connection = IpConnection::new(self.config()?);
        connection
            .connect()
            .await
            .map_err(|err| connection_error("connect failed", err))?;
        Ok(connection)
    }
}

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Stop after N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long to collect events (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s")]
    pub wait: String,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["uid", "uid_number"])))]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Target device UID in base58.
    #[arg(long)]
    pub uid: Option<String>,
    /// Target device UID as a decimal number.
    #[arg(long)]
    pub uid_number: Option<u32>,
    /// Function ID to call.
    #[arg(long)]
    pub function_id: u8,
    /// Hex-encoded request payload.
    #[arg(long, default_value = "")]
    pub data: String,
    /// Wait for a reply and print it.
    #[arg(long)]
    pub response_expected: bool,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct UidArgs {
    /// UIDs to convert.
    #[arg(required = true)]
    pub uids: Vec<String>,
    /// Treat inputs as decimal numbers and print their base58 form.
    #[arg(long)]
    pub number: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
