//! Dependency-file manifests for each supported package manager.

mod bundler;
mod cargo;
mod go_modules;
mod npm_and_yarn;
mod pub_dart;

use std::sync::Arc;

use file_fetcher::{DependencyFile, FetcherRegistry};
use file_fetcher_github::{Manifest, RepoFetcher};

/// Every supported package manager, keyed by its job identifier.
pub fn registry() -> FetcherRegistry {
    let mut registry = FetcherRegistry::new();

    register(&mut registry, bundler::manifest(), false);
    register(&mut registry, cargo::manifest(), false);
    register(&mut registry, npm_and_yarn::manifest(), false);
    register(&mut registry, pub_dart::manifest(), false);
    // go_modules always reads from a checkout.
    register(&mut registry, go_modules::manifest(), true);

    registry
}

fn register(registry: &mut FetcherRegistry, manifest: Manifest, cloning: bool) {
    let ecosystem = manifest.ecosystem.clone();
    let manifest = Arc::new(manifest);
    let factory = move |args| {
        Box::new(RepoFetcher::new(Arc::clone(&manifest), args)) as Box<dyn file_fetcher::Fetcher>
    };

    if cloning {
        registry.register_cloning(ecosystem, factory);
    } else {
        registry.register(ecosystem, factory);
    }
}

/// Text of the fetched file called `name`, if there is one.
fn text<'a>(files: &'a [DependencyFile], name: &str) -> Option<&'a str> {
    files
        .iter()
        .find(|f| f.name == name)
        .and_then(|f| match &f.content {
            file_fetcher::FileContent::Text(text) => Some(text.as_str()),
            file_fetcher::FileContent::Binary(_) => None,
        })
}

/// Leading numeric component of a version string: `"2.4.10"` is `"2"`.
fn major(version: &str) -> Option<&str> {
    let version = version.trim().trim_start_matches(['v', '^', '~', '=']);
    let end = version
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(version.len());
    (end > 0).then(|| &version[..end])
}
