use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Token;
use crate::client::core::{DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL, DEFAULT_TIMEOUT};
use crate::client::ClientConfig;

const CANDIDATES: [&str; 4] = [
    "buildkite-provider.toml",
    "buildkite-provider.json",
    "buildkite-provider.yaml",
    "buildkite-provider.yml",
];

/// Provider settings file.
///
/// Every field can be overridden from the command line or the
/// `BUILDKITE_ORGANIZATION` / `BUILDKITE_API_TOKEN` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Organization slug
    pub organization: Option<String>,

    /// Buildkite API access token
    pub api_token: Option<String>,

    /// REST API base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// GraphQL endpoint
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            organization: None,
            api_token: None,
            rest_url: default_rest_url(),
            graphql_url: default_graphql_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_rest_url() -> String {
    DEFAULT_REST_URL.to_string()
}

fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches in this order:
    /// 1. Specified path (must exist)
    /// 2. ./buildkite-provider.{toml,json,yaml,yml}
    /// 3. <user config dir>/buildkite-provider/buildkite-provider.{toml,json,yaml,yml}
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let mut search_dirs = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search_dirs.push(config_dir.join("buildkite-provider"));
        }

        Self::load_from_dirs(&search_dirs)
    }

    fn load_from_dirs(dirs: &[PathBuf]) -> Result<Self> {
        for dir in dirs {
            for candidate in &CANDIDATES {
                let path = dir.join(candidate);
                if path.exists() {
                    debug!("Using config file {}", path.display());
                    return Self::load_from_path(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Applies values given on the command line or through the environment.
    pub fn with_overrides(
        mut self,
        organization: Option<String>,
        api_token: Option<String>,
    ) -> Self {
        if organization.is_some() {
            self.organization = organization;
        }
        if api_token.is_some() {
            self.api_token = api_token;
        }
        self
    }

    /// Client settings, failing when the organization or token is missing.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let Some(organization) = self.organization.as_deref().filter(|o| !o.is_empty()) else {
            bail!("No organization configured; set BUILDKITE_ORGANIZATION or `organization`");
        };
        let Some(api_token) = self.api_token.as_deref().filter(|t| !t.is_empty()) else {
            bail!("No API token configured; set BUILDKITE_API_TOKEN or `api-token`");
        };

        if self.timeout_secs == 0 {
            bail!("`timeout-secs` must be at least 1");
        }

        let mut config = ClientConfig::new(organization, Token::from(api_token));
        config.rest_url = self.rest_url.clone();
        config.graphql_url = self.graphql_url.clone();
        config.timeout = Duration::from_secs(self.timeout_secs);
        Ok(config)
    }
}
