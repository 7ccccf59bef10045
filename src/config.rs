use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

pub const DEFAULT_CONFIG_FILE: &str = "pathway-index.json";
pub const PASSWORD_ENV: &str = "PATHWAY_INDEX_GRAPH_PASSWORD";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:7474";
pub const DEFAULT_DATABASE: &str = "neo4j";
pub const DEFAULT_SPECIES: &str = "Homo sapiens";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub graph: Option<GraphEntry>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub variant_dir: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GraphEntry {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    pub endpoint: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub graph: GraphSettings,
    pub species: String,
    pub variant_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub species: Option<String>,
    pub variant_dir: Option<String>,
    pub output_dir: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `pathway-index.json` in the working directory when no
    /// path is given. A missing default file is not an error.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, IndexError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| IndexError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content).map_err(|err| IndexError::ConfigParse(err.to_string()))?
        };

        let env_password = std::env::var(PASSWORD_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::resolve_config(config, overrides, env_password)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
        env_password: Option<String>,
    ) -> Result<ResolvedConfig, IndexError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let graph_entry = config.graph.unwrap_or_default();

        let graph = GraphSettings {
            endpoint: overrides
                .endpoint
                .or(graph_entry.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            database: overrides
                .database
                .or(graph_entry.database)
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            username: overrides.username.or(graph_entry.username),
            password: env_password.or(graph_entry.password),
        };

        let species = overrides
            .species
            .or(config.species)
            .unwrap_or_else(|| DEFAULT_SPECIES.to_string());
        let variant_dir = Utf8PathBuf::from(
            overrides
                .variant_dir
                .or(config.variant_dir)
                .unwrap_or_else(|| "vep".to_string()),
        );
        let output_dir = match overrides.output_dir.or(config.output_dir) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_output_dir()?,
        };

        Ok(ResolvedConfig {
            schema_version,
            graph,
            species,
            variant_dir,
            output_dir,
        })
    }
}

pub fn default_output_dir() -> Result<Utf8PathBuf, IndexError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.cache_dir().join("pathway-index")).ok()
        })
        .ok_or_else(|| IndexError::Filesystem("unable to resolve cache directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_file_values() {
        let config = Config {
            schema_version: None,
            graph: Some(GraphEntry {
                endpoint: Some("http://graph:7474".to_string()),
                database: None,
                username: Some("reader".to_string()),
                password: Some("from-file".to_string()),
            }),
            species: None,
            variant_dir: Some("tables".to_string()),
            output_dir: Some("out".to_string()),
        };
        let overrides = ConfigOverrides {
            endpoint: Some("http://other:7474".to_string()),
            ..ConfigOverrides::default()
        };

        let resolved =
            ConfigLoader::resolve_config(config, overrides, Some("from-env".to_string())).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.graph.endpoint, "http://other:7474");
        assert_eq!(resolved.graph.database, DEFAULT_DATABASE);
        assert_eq!(resolved.graph.username.as_deref(), Some("reader"));
        assert_eq!(resolved.graph.password.as_deref(), Some("from-env"));
        assert_eq!(resolved.species, DEFAULT_SPECIES);
        assert_eq!(resolved.variant_dir.as_str(), "tables");
        assert_eq!(resolved.output_dir.as_str(), "out");
    }
}
