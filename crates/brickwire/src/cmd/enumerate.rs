use tokio::time::Instant;

use crate::cmd::{parse_duration, EnumerateArgs};
use crate::exit::{connection_error, CliResult, SUCCESS};
use crate::output::{print_enumeration, print_enumeration_table, OutputFormat};

pub async fn run(args: EnumerateArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let connection = args.connect.connect().await?;
    let queue = connection
        .enumerations()
        .map_err(|err| connection_error("enumerate failed", err))?;
    connection
        .enumerate()
        .await
        .map_err(|err| connection_error("enumerate failed", err))?;

    let deadline = Instant::now() + wait;
    let mut events = Vec::new();

    loop {
        if args.count.is_some_and(|count| events.len() >= count) {
            break;
        }
        let event = tokio::select! {
            event = tokio::time::timeout_at(deadline, queue.recv()) => match event {
                Ok(Some(event)) => event,
                // Deadline reached or the session ended.
                Ok(None) | Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };
        print_enumeration(&event, format);
        events.push(event);
    }

    if matches!(format, OutputFormat::Table) {
        print_enumeration_table(&events);
    }

    connection.disconnect().await;
    Ok(SUCCESS)
}
