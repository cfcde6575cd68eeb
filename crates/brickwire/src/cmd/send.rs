use brickwire_frame::parse_uid;

use crate::cmd::SendArgs;
use crate::exit::{connection_error, uid_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_fields, print_reply, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let uid = target_uid(&args)?;
    let payload = decode_payload(&args.data)?;
    let connection = args.connect.connect().await?;

    let result = connection
        .send_request(uid, args.function_id, &payload, args.response_expected)
        .await;
    connection.disconnect().await;
    let reply = result.map_err(|err| connection_error("request failed", err))?;

    match reply {
        Some(reply) => print_reply(&reply, format),
        None => print_fields(
            &[
                ("uid", uid.to_string()),
                ("function_id", args.function_id.to_string()),
                ("payload_size", payload.len().to_string()),
                ("status", "sent".to_string()),
            ],
            format,
        ),
    }

    Ok(SUCCESS)
}

fn target_uid(args: &SendArgs) -> CliResult<u32> {
    match (&args.uid, args.uid_number) {
        (Some(text), _) => parse_uid(text).map_err(|err| uid_error(text, err)),
        (None, Some(number)) => Ok(number),
        (None, None) => Err(CliError::new(USAGE, "one of --uid or --uid-number is required")),
    }
}

fn decode_payload(data: &str) -> CliResult<Vec<u8>> {
    let data = data.trim();
    let data = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .unwrap_or(data);
    hex::decode(data).map_err(|err| CliError::new(USAGE, format!("--data is not valid hex: {err}")))
}
