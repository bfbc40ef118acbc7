use std::collections::BTreeMap;

use crate::error::FetchError;
use crate::fetcher::{Fetcher, FetcherArgs};

type Factory = Box<dyn Fn(FetcherArgs) -> Box<dyn Fetcher> + Send + Sync>;

struct Registration {
    factory: Factory,
    always_clone: bool,
}

/// Maps package-manager identifiers to fetcher factories.
#[derive(Default)]
pub struct FetcherRegistry {
    entries: BTreeMap<String, Registration>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a package manager. A later registration for
    /// the same identifier replaces the earlier one.
    pub fn register<F>(&mut self, package_manager: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(FetcherArgs) -> Box<dyn Fetcher> + Send + Sync + 'static,
    {
        self.insert(package_manager.into(), Box::new(factory), false)
    }

    /// Register a factory for an ecosystem whose files can only be read from
    /// a full clone.
    pub fn register_cloning<F>(&mut self, package_manager: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(FetcherArgs) -> Box<dyn Fetcher> + Send + Sync + 'static,
    {
        self.insert(package_manager.into(), Box::new(factory), true)
    }

    fn insert(&mut self, package_manager: String, factory: Factory, always_clone: bool) -> &mut Self {
        self.entries.insert(
            package_manager,
            Registration {
                factory,
                always_clone,
            },
        );
        self
    }

    /// True if the package manager was registered with `register_cloning`.
    pub fn always_clones(&self, package_manager: &str) -> bool {
        self.entries
            .get(package_manager)
            .is_some_and(|r| r.always_clone)
    }

    /// Registered identifiers in sorted order.
    pub fn package_managers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        package_manager: &str,
        args: FetcherArgs,
    ) -> Result<Box<dyn Fetcher>, FetchError> {
        let registration = self
            .entries
            .get(package_manager)
            .ok_or_else(|| FetchError::UnsupportedPackageManager(package_manager.to_owned()))?;

        Ok((registration.factory)(args))
    }
}
