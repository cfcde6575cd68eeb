use std::time::Instant;

use brickwire_connection::AuthState;

use crate::cmd::PingArgs;
use crate::exit::{connection_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

pub async fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let started = Instant::now();
    let connection = args.connect.connect().await?;
    let connected_after = started.elapsed();

    let result = connection.ping().await;
    let auth = connection.auth_state();
    connection.disconnect().await;
    result.map_err(|err| connection_error("ping failed", err))?;

    let auth = match auth {
        AuthState::Authenticated => "authenticated",
        AuthState::Idle => "none",
    };
    print_fields(
        &[
            ("addr", connection.config().addr()),
            ("status", "reachable".to_string()),
            ("authentication", auth.to_string()),
            ("connect_ms", connected_after.as_millis().to_string()),
        ],
        format,
    );

    Ok(SUCCESS)
}
