use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub aws: AwsConfig,
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub default_region: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct WorkspaceConfig {
    /// Root directory for per-session working directories and generated
    /// artifacts (definition files, diagrams).
    pub generated_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub generated_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    /// Skip the process-environment override step. Tests set this so
    /// ambient variables (for example a developer's `GOOGLE_API_KEY`)
    /// cannot change the outcome.
    pub ignore_env: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://terraloom.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: 60,
            },
            aws: AwsConfig { default_region: "us-east-1".to_string() },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            workspace: WorkspaceConfig { generated_dir: PathBuf::from("generated_files") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("terraloom.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        if !options.ignore_env {
            config.apply_env_overrides()?;
        }
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(aws) = patch.aws {
            if let Some(default_region) = aws.default_region {
                self.aws.default_region = default_region;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(workspace) = patch.workspace {
            if let Some(generated_dir) = workspace.generated_dir {
                self.workspace.generated_dir = generated_dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TERRALOOM_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TERRALOOM_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TERRALOOM_DATABASE_MAX_CONNECTIONS", &value)?;
        }

        // GOOGLE_API_KEY and AWS_DEFAULT_REGION are the conventional
        // variable names for these services; honored alongside the
        // TERRALOOM_* namespace.
        if let Some(value) = read_env("TERRALOOM_LLM_API_KEY").or_else(|| read_env("GOOGLE_API_KEY")) {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("TERRALOOM_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("TERRALOOM_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TERRALOOM_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TERRALOOM_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) =
            read_env("TERRALOOM_AWS_DEFAULT_REGION").or_else(|| read_env("AWS_DEFAULT_REGION"))
        {
            self.aws.default_region = value;
        }

        if let Some(value) = read_env("TERRALOOM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TERRALOOM_SERVER_PORT") {
            self.server.port = parse_u16("TERRALOOM_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("TERRALOOM_GENERATED_DIR") {
            self.workspace.generated_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("TERRALOOM_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("TERRALOOM_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(generated_dir) = overrides.generated_dir {
            self.workspace.generated_dir = generated_dir;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Missing credentials for the text-generation dependency are
        // startup-fatal; nothing in the pipeline works without them.
        if self.llm.api_key.is_none() {
            return Err(ConfigError::Validation(
                "llm.api_key is required (set TERRALOOM_LLM_API_KEY or GOOGLE_API_KEY)".to_string(),
            ));
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.llm.model.is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    aws: Option<AwsPatch>,
    server: Option<ServerPatch>,
    workspace: Option<WorkspacePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AwsPatch {
    default_region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct WorkspacePatch {
    generated_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("terraloom.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn options_with_key() -> LoadOptions {
        LoadOptions {
            ignore_env: true,
            overrides: ConfigOverrides {
                llm_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn defaults_fail_validation_without_api_key() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/terraloom.toml")),
            ignore_env: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn programmatic_override_supplies_api_key() {
        let config = AppConfig::load(options_with_key()).expect("load");
        assert_eq!(config.llm.api_key.expect("key").expose_secret(), "test-key");
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.aws.default_region, "us-east-1");
    }

    #[test]
    fn toml_file_patches_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
[llm]
model = "gemini-1.5-pro"
timeout_secs = 30

[server]
port = 9001

[logging]
format = "json"
"#
        )
        .expect("write");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ignore_env: true,
            overrides: ConfigOverrides {
                llm_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("load");

        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/terraloom.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn log_format_parses_known_values_only() {
        assert_eq!("pretty".parse::<LogFormat>().expect("parse"), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
