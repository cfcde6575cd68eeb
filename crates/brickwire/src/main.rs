mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "brickwire", version, about = "Brick daemon protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Overridden by RUST_LOG.
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format).await;

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "brickwire",
            "send",
            "--uid",
            "Dq3",
            "--function-id",
            "5",
            "--data",
            "0a0b",
            "--response-expected",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.function_id, 5);
        assert!(args.response_expected);
        assert_eq!(args.connect.port, 4223);
    }

    #[test]
    fn rejects_conflicting_uid_args() {
        let err = Cli::try_parse_from([
            "brickwire",
            "send",
            "--uid",
            "Dq3",
            "--uid-number",
            "12345",
            "--function-id",
            "1",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn send_requires_a_uid() {
        let err = Cli::try_parse_from(["brickwire", "send", "--function-id", "1"])
            .expect_err("missing uid should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "brickwire",
            "enumerate",
            "--host",
            "192.168.0.7",
            "--wait",
            "3s",
            "--format",
            "json",
        ])
        .expect("enumerate args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Enumerate(args) = cli.command else {
            panic!("expected enumerate");
        };
        assert_eq!(args.connect.host, "192.168.0.7");
        assert_eq!(args.wait, "3s");
    }
}
