use std::collections::BTreeMap;

use file_fetcher::DependencyFile;
use file_fetcher_github::{Manifest, Syntax};

use super::text;

pub fn manifest() -> Manifest {
    Manifest::new("cargo")
        .required("Cargo.toml", Syntax::Toml)
        .optional("Cargo.lock", Syntax::Toml)
        .optional("rust-toolchain.toml", Syntax::Toml)
        .with_version_detector(detect_versions)
}

fn detect_versions(files: &[DependencyFile]) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();

    if let Some(lockfile) = text(files, "Cargo.lock").and_then(|t| t.parse::<toml::Table>().ok()) {
        // Lockfiles before format 3 have no version key.
        let format = lockfile
            .get("version")
            .and_then(toml::Value::as_integer)
            .unwrap_or(1);
        versions.insert("cargo-lockfile".to_owned(), format.to_string());
    }

    let channel = text(files, "rust-toolchain.toml")
        .and_then(|t| t.parse::<toml::Table>().ok())
        .and_then(|toolchain| {
            toolchain
                .get("toolchain")?
                .get("channel")?
                .as_str()
                .map(str::to_owned)
        });
    if let Some(channel) = channel {
        versions.insert("rust".to_owned(), channel);
    }

    versions
}
