//! Layered settings: built in defaults, then an optional `repeci.toml` (or the
//! file given on the command line), then `REPECI__` environment variables, for
//! example `REPECI__IMPORT__WORKERS=4`.

use std::path::Path;

use serde::Deserialize;

use crate::construct::PersistenceMode;
use crate::error::Result;
use crate::metrics::{DEFAULT_DAMPING, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, PageRankConfig};
use crate::record::ARTICLE_MARKER;

pub const DEFAULT_CONFIG_FILE: &str = "repeci";
pub const ENVIRONMENT_PREFIX: &str = "REPECI";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub import: ImportSettings,
    pub refs: RefsSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file; the database lives in memory when absent.
    pub path: Option<String>,
}
impl DatabaseSettings {
    pub fn mode(&self) -> PersistenceMode {
        match &self.path {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    pub extension: String,
    pub encoding: Encoding,
    pub article_marker: String,
    pub workers: usize,
    /// Zero means no limit.
    pub limit: usize,
}
impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            extension: String::from("rdf"),
            encoding: Encoding::Utf8,
            article_marker: String::from(ARTICLE_MARKER),
            workers: 1,
            limit: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefsSettings {
    pub limit: usize,
    pub separator: String,
}
impl Default for RefsSettings {
    fn default() -> Self {
        Self {
            limit: 0,
            separator: String::from("#"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub include_isolated: bool,
}
impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            include_isolated: false,
        }
    }
}
impl MetricsSettings {
    pub fn page_rank(&self) -> PageRankConfig {
        PageRankConfig {
            damping: self.damping,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

impl Settings {
    /// Reads the given file (which must then exist) or an optional
    /// `repeci.toml` in the working directory, overridden by the environment.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENVIRONMENT_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
