//! Configuration for paperflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PAPERFLOW_HOME, PAPERFLOW_CACHE_DIR,
//!    PAPERFLOW_SERVICE_URL, PAPERFLOW_SERVICE_TOKEN)
//! 2. Config file (.paperflow/config.yaml)
//! 3. Defaults (~/.paperflow)
//!
//! Config file discovery:
//! - Searches current directory and parents for .paperflow/config.yaml
//! - Paths in config file are relative to the .paperflow/ directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{StageTimeouts, TimeoutSettings};
use crate::domain::Stage;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".paperflow";
const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";
const DEFAULT_TOKEN_ENV: &str = "PAPERFLOW_SERVICE_TOKEN";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub service: Option<ServiceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .paperflow/)
    pub home: Option<String>,
    /// Stage cache directory (relative to .paperflow/)
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    /// Name of the environment variable holding the bearer token
    pub token_env: Option<String>,
    #[serde(default)]
    pub endpoints: HashMap<Stage, String>,
}

/// Analysis service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub endpoints: HashMap<Stage, String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            token: None,
            endpoints: HashMap::new(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to paperflow home (catalog, state)
    pub home: PathBuf,
    /// Absolute path to the stage cache
    pub cache_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Collaborator call bounds
    pub timeouts: StageTimeouts,
    /// Analysis service
    pub service: ServiceSettings,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Combine a parsed file (if any) with environment overrides
fn resolve(
    config: Option<ConfigFile>,
    config_file: Option<PathBuf>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let paths = config.as_ref().map(|c| &c.paths);
    let from_file = |value: Option<&String>| -> Option<PathBuf> {
        let dir = config_dir.as_ref()?;
        value.map(|p| resolve_path(dir, p))
    };

    let home = env_var("PAPERFLOW_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(paths.and_then(|p| p.home.as_ref())))
        .unwrap_or(default_home);

    let cache_dir = env_var("PAPERFLOW_CACHE_DIR")
        .map(PathBuf::from)
        .or_else(|| from_file(paths.and_then(|p| p.cache.as_ref())))
        .unwrap_or_else(|| home.join("cache"));

    let timeouts = config
        .as_ref()
        .map(|c| StageTimeouts::from(&c.timeouts))
        .unwrap_or_default();

    let service_file = config.as_ref().and_then(|c| c.service.clone());
    let token_env = service_file
        .as_ref()
        .and_then(|s| s.token_env.clone())
        .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());

    let service = ServiceSettings {
        base_url: env_var("PAPERFLOW_SERVICE_URL")
            .or_else(|| service_file.as_ref().and_then(|s| s.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
        token: env_var(&token_env),
        endpoints: service_file.map(|s| s.endpoints).unwrap_or_default(),
    };

    ResolvedConfig {
        home,
        cache_dir,
        config_file,
        timeouts,
        service,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file();
    let config = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(config, config_file, default_home))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the paperflow home directory
pub fn paperflow_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the stage cache directory
pub fn cache_dir() -> Result<PathBuf> {
    Ok(config()?.cache_dir.clone())
}

/// Get the document catalog path ($PAPERFLOW_HOME/documents.json)
pub fn catalog_path() -> Result<PathBuf> {
    Ok(config()?.home.join("documents.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
version: "1"
paths:
  home: ./
  cache: ./stage-cache
timeouts:
  default_seconds: 120
  stages:
    verifiedClaims: 600
service:
  base_url: http://analysis.internal:9000
  token_env: PAPERFLOW_TEST_UNSET_TOKEN
  endpoints:
    claims: /v1/claims
"#;

    #[test]
    fn test_config_file_parsing() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.version, "1");
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.timeouts.default_seconds, 120);
        assert_eq!(config.timeouts.stages.get(&Stage::VerifiedClaims), Some(&600));

        let service = config.service.unwrap();
        assert_eq!(
            service.endpoints.get(&Stage::Claims),
            Some(&"/v1/claims".to_string())
        );
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config = parse_config("version: \"1\"\n").unwrap();

        assert!(config.paths.home.is_none());
        assert!(config.service.is_none());
        assert_eq!(config.timeouts.default_seconds, 300);
    }

    #[test]
    fn test_resolve_relative_to_config_dir() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("config.yaml");

        let resolved = resolve(
            Some(parse_config(SAMPLE).unwrap()),
            Some(config_path.clone()),
            PathBuf::from("/unused"),
        );

        // Environment overrides are not set in the test environment
        if std::env::var("PAPERFLOW_HOME").is_err() {
            assert_eq!(resolved.home, config_dir.canonicalize().unwrap());
        }
        if std::env::var("PAPERFLOW_CACHE_DIR").is_err() {
            assert_eq!(resolved.cache_dir, config_dir.join("stage-cache"));
        }
        assert_eq!(resolved.config_file, Some(config_path));
        assert_eq!(resolved.timeouts.for_stage(Stage::Claims), Duration::from_secs(120));
        assert_eq!(
            resolved.timeouts.for_stage(Stage::VerifiedClaims),
            Duration::from_secs(600)
        );
        assert!(resolved.service.token.is_none());
    }

    #[test]
    fn test_defaults_without_file() {
        let resolved = resolve(None, None, PathBuf::from("/home/user/.paperflow"));

        if std::env::var("PAPERFLOW_HOME").is_err() {
            assert_eq!(resolved.home, PathBuf::from("/home/user/.paperflow"));
            if std::env::var("PAPERFLOW_CACHE_DIR").is_err() {
                assert_eq!(resolved.cache_dir, PathBuf::from("/home/user/.paperflow/cache"));
            }
        }
        assert_eq!(resolved.timeouts, StageTimeouts::default());
        assert!(resolved.config_file.is_none());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "../sibling"),
            PathBuf::from("/home/user/project/../sibling")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
