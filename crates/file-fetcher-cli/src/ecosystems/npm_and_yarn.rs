use std::collections::BTreeMap;

use file_fetcher::DependencyFile;
use file_fetcher_github::{Manifest, Syntax};
use serde_json::Value;

use super::{major, text};

pub fn manifest() -> Manifest {
    Manifest::new("npm_and_yarn")
        .required("package.json", Syntax::Json)
        .optional("package-lock.json", Syntax::Json)
        .optional("npm-shrinkwrap.json", Syntax::Json)
        .optional("yarn.lock", Syntax::Plain)
        .optional("pnpm-lock.yaml", Syntax::Yaml)
        .optional(".npmrc", Syntax::Plain)
        .optional(".yarnrc.yml", Syntax::Yaml)
        .with_version_detector(detect_versions)
}

/// The `packageManager` field wins; otherwise each lockfile implies a
/// major version of the tool that wrote it.
fn detect_versions(files: &[DependencyFile]) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();

    let declared = text(files, "package.json")
        .and_then(|t| serde_json::from_str::<Value>(t).ok())
        .and_then(|manifest| manifest.get("packageManager")?.as_str().map(str::to_owned));
    if let Some((name, version)) = declared.as_deref().and_then(|d| d.split_once('@'))
        && let Some(version) = major(version)
    {
        versions.insert(name.to_owned(), version.to_owned());
    }

    let npm_lockfile = text(files, "package-lock.json").or_else(|| text(files, "npm-shrinkwrap.json"));
    if let Some(lockfile_version) = npm_lockfile
        .and_then(|t| serde_json::from_str::<Value>(t).ok())
        .and_then(|lockfile| lockfile.get("lockfileVersion")?.as_u64())
    {
        let npm = if lockfile_version >= 2 { "8" } else { "6" };
        versions.entry("npm".to_owned()).or_insert_with(|| npm.to_owned());
    }

    if let Some(lockfile) = text(files, "yarn.lock") {
        let yarn = if lockfile.contains("__metadata:") { "3" } else { "1" };
        versions.entry("yarn".to_owned()).or_insert_with(|| yarn.to_owned());
    }

    if let Some(lockfile_version) = text(files, "pnpm-lock.yaml")
        .and_then(|t| serde_yaml_ng::from_str::<serde_yaml_ng::Value>(t).ok())
        .and_then(|lockfile| pnpm_lockfile_version(lockfile.get("lockfileVersion")?))
    {
        let pnpm = match major(&lockfile_version) {
            Some("5") => "7",
            Some("6") => "8",
            _ => "9",
        };
        versions.entry("pnpm".to_owned()).or_insert_with(|| pnpm.to_owned());
    }

    versions
}

/// pnpm writes the lockfile version as a number in older releases and a
/// string in newer ones.
fn pnpm_lockfile_version(value: &serde_yaml_ng::Value) -> Option<String> {
    match value {
        serde_yaml_ng::Value::String(s) => Some(s.clone()),
        serde_yaml_ng::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
