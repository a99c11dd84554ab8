use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const VERSION_FILE: &str = "VERSION";

fn main() {
    let version_path = match version_file() {
        Ok(path) => path,
        Err(message) => fail(&message),
    };
    println!("cargo:rerun-if-changed={}", version_path.display());

    match read_version(&version_path) {
        Ok(version) => println!("cargo:rustc-env=TIMEDROP_VERSION={version}"),
        Err(message) => fail(&message),
    }
}

/// `VERSION` at the workspace root, two levels above this crate.
fn version_file() -> Result<PathBuf, String> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")
        .map_err(|error| format!("CARGO_MANIFEST_DIR unavailable: {error}"))?;
    Path::new(&manifest_dir)
        .ancestors()
        .nth(2)
        .map(|root| root.join(VERSION_FILE))
        .ok_or_else(|| format!("{manifest_dir} is not inside crates/<name>"))
}

fn read_version(path: &Path) -> Result<String, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("cannot read {}: {error}", path.display()))?;
    let version = raw.trim();
    if version.is_empty() {
        return Err(format!("{} must contain a version", path.display()));
    }
    Ok(version.to_string())
}

fn fail(message: &str) -> ! {
    println!("cargo:warning={message}");
    panic!("{message}");
}
