use std::collections::BTreeMap;

use file_fetcher::DependencyFile;
use file_fetcher_github::{Manifest, Syntax};

use super::text;

pub fn manifest() -> Manifest {
    Manifest::new("pub")
        .required("pubspec.yaml", Syntax::Yaml)
        .optional("pubspec.lock", Syntax::Yaml)
        .with_version_detector(detect_versions)
}

/// SDK constraints recorded in pubspec.lock.
fn detect_versions(files: &[DependencyFile]) -> BTreeMap<String, String> {
    let Some(lockfile) = text(files, "pubspec.lock")
        .and_then(|t| serde_yaml_ng::from_str::<serde_yaml_ng::Value>(t).ok())
    else {
        return BTreeMap::new();
    };

    let Some(sdks) = lockfile.get("sdks").and_then(|s| s.as_mapping()) else {
        return BTreeMap::new();
    };

    sdks.iter()
        .filter_map(|(sdk, constraint)| {
            Some((sdk.as_str()?.to_owned(), constraint.as_str()?.to_owned()))
        })
        .collect()
}
