use std::collections::BTreeMap;

use file_fetcher::DependencyFile;
use file_fetcher_github::{Manifest, Syntax};

use super::text;

pub fn manifest() -> Manifest {
    Manifest::new("go_modules")
        .required("go.mod", Syntax::Plain)
        .optional("go.sum", Syntax::Plain)
        .with_version_detector(detect_versions)
}

/// The `go` directive of go.mod.
fn detect_versions(files: &[DependencyFile]) -> BTreeMap<String, String> {
    text(files, "go.mod")
        .and_then(|gomod| {
            gomod
                .lines()
                .find_map(|line| line.trim().strip_prefix("go "))
                .map(|version| version.trim().to_owned())
        })
        .map(|version| BTreeMap::from([("go".to_owned(), version)]))
        .unwrap_or_default()
}
