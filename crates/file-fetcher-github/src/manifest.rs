use std::collections::BTreeMap;

use file_fetcher::DependencyFile;

/// How a dependency file must parse to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Plain,
    Json,
    Toml,
    Yaml,
}

impl Syntax {
    /// Check that `content` parses. Returns the parser's message on failure.
    pub fn check(self, content: &str) -> Result<(), String> {
        match self {
            Self::Plain => Ok(()),
            Self::Json => serde_json::from_str::<serde::de::IgnoredAny>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Self::Toml => toml::from_str::<toml::Table>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml_ng::from_str::<serde_yaml_ng::Value>(content)
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub name: String,
    pub required: bool,
    pub syntax: Syntax,
}

/// Detects package manager versions from fetched files.
pub type VersionDetector = fn(&[DependencyFile]) -> BTreeMap<String, String>;

fn no_versions(_: &[DependencyFile]) -> BTreeMap<String, String> {
    BTreeMap::new()
}

/// The dependency files one ecosystem needs.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub ecosystem: String,
    pub files: Vec<ManifestFile>,
    pub detect_versions: VersionDetector,
}

impl Manifest {
    pub fn new(ecosystem: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            files: Vec::new(),
            detect_versions: no_versions,
        }
    }

    /// A file that must exist. Its absence fails the fetch.
    pub fn required(mut self, name: impl Into<String>, syntax: Syntax) -> Self {
        self.files.push(ManifestFile {
            name: name.into(),
            required: true,
            syntax,
        });
        self
    }

    /// A file that is fetched when present.
    pub fn optional(mut self, name: impl Into<String>, syntax: Syntax) -> Self {
        self.files.push(ManifestFile {
            name: name.into(),
            required: false,
            syntax,
        });
        self
    }

    pub fn with_version_detector(mut self, detector: VersionDetector) -> Self {
        self.detect_versions = detector;
        self
    }
}
