use std::process::Command;

/// Build facts surfaced by `brickwire version --extended`.
const EXPORTS: [(&str, &str); 2] = [
    ("TARGET", "BRICKWIRE_BUILD_TARGET"),
    ("PROFILE", "BRICKWIRE_BUILD_PROFILE"),
];

fn main() {
    for (source, exported) in EXPORTS {
        if let Ok(value) = std::env::var(source) {
            println!("cargo:rustc-env={exported}={value}");
        }
        println!("cargo:rerun-if-env-changed={source}");
    }

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = rustc_version(&rustc) {
        println!("cargo:rustc-env=BRICKWIRE_RUSTC_VERSION={version}");
    }
    println!("cargo:rerun-if-env-changed=RUSTC");
}

fn rustc_version(rustc: &str) -> Option<String> {
    let output = Command::new(rustc).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8(output.stdout).ok()?;
    let version = version.trim();
    (!version.is_empty()).then(|| version.to_string())
}
