use brickwire_frame::{base58_decode, base58_encode, uid64_to_uid32};

use crate::cmd::UidArgs;
use crate::exit::{uid_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_fields, OutputFormat};

#[derive(Debug, PartialEq, Eq)]
struct Conversion {
    input: String,
    base58: String,
    number: u32,
    /// Set when a 64-bit UID was folded to its wire form.
    folded: bool,
}

pub fn run(args: UidArgs, format: OutputFormat) -> CliResult<i32> {
    for input in &args.uids {
        let conversion = if args.number {
            from_number(input)?
        } else {
            from_base58(input)?
        };
        print_fields(
            &[
                ("input", conversion.input),
                ("base58", conversion.base58),
                ("number", conversion.number.to_string()),
                ("folded", conversion.folded.to_string()),
            ],
            format,
        );
    }
    Ok(SUCCESS)
}

fn from_base58(input: &str) -> CliResult<Conversion> {
    let wide = base58_decode(input.trim()).map_err(|err| uid_error(input, err))?;
    Ok(conversion(input, wide))
}

fn from_number(input: &str) -> CliResult<Conversion> {
    let wide: u64 = input
        .trim()
        .parse()
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid uid '{input}': {err}")))?;
    Ok(conversion(input, wide))
}

fn conversion(input: &str, wide: u64) -> Conversion {
    let (number, folded) = match u32::try_from(wide) {
        Ok(number) => (number, false),
        Err(_) => (uid64_to_uid32(wide), true),
    };
    Conversion {
        input: input.to_string(),
        base58: base58_encode(u64::from(number)),
        number,
        folded,
    }
}
