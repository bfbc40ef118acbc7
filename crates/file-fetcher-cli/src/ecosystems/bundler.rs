use std::collections::BTreeMap;

use file_fetcher::DependencyFile;
use file_fetcher_github::{Manifest, Syntax};

use super::{major, text};

pub fn manifest() -> Manifest {
    Manifest::new("bundler")
        .required("Gemfile", Syntax::Plain)
        .optional("Gemfile.lock", Syntax::Plain)
        .optional(".ruby-version", Syntax::Plain)
        .with_version_detector(detect_versions)
}

/// The major bundler version from the lockfile's `BUNDLED WITH` section.
/// Lockfiles without one were written by bundler 1.
fn detect_versions(files: &[DependencyFile]) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();

    if let Some(lockfile) = text(files, "Gemfile.lock") {
        let bundled_with = lockfile
            .lines()
            .skip_while(|line| line.trim() != "BUNDLED WITH")
            .nth(1)
            .and_then(major);
        versions.insert("bundler".to_owned(), bundled_with.unwrap_or("1").to_owned());
    }

    if let Some(ruby) = text(files, ".ruby-version").and_then(|v| v.lines().next()) {
        let ruby = ruby.trim().trim_start_matches("ruby-");
        if !ruby.is_empty() {
            versions.insert("ruby".to_owned(), ruby.to_owned());
        }
    }

    versions
}
