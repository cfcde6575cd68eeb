use brickwire_transport::DEFAULT_PORT;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

/// Values exported by the build script, or "unknown" when it could not
/// determine them.
const BUILD_TARGET: Option<&str> = option_env!("BRICKWIRE_BUILD_TARGET");
const BUILD_PROFILE: Option<&str> = option_env!("BRICKWIRE_BUILD_PROFILE");
const RUSTC_VERSION: Option<&str> = option_env!("BRICKWIRE_RUSTC_VERSION");

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("brickwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    for (key, value) in provenance() {
        println!("{key}: {value}");
    }
    Ok(SUCCESS)
}

fn provenance() -> Vec<(&'static str, String)> {
    vec![
        ("name", "brickwire".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        ("target", BUILD_TARGET.unwrap_or("unknown").to_string()),
        ("profile", BUILD_PROFILE.unwrap_or("unknown").to_string()),
        ("target_os", std::env::consts::OS.to_string()),
        ("target_arch", std::env::consts::ARCH.to_string()),
        ("rustc", RUSTC_VERSION.unwrap_or("unknown").to_string()),
        (
            "protocol",
            format!("brick daemon TCP/IP v2, default port {DEFAULT_PORT}"),
        ),
    ]
}
