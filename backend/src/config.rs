//! Application configuration
//!
//! Layered: defaults, then an optional TOML file, then environment
//! variables, then command-line overrides.

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub analytics: AnalyticsConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8500 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/nuri.db".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

/// Hosted analytics data API connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8600".to_string(), api_key: None, timeout_seconds: 20 }
    }
}

/// OpenAI-compatible LLM endpoint for the relation/intent/insight calls
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub timeout_seconds: u64,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model_name: "qwen2.5:3b-instruct".to_string(),
            timeout_seconds: 6,
            temperature: 0.0,
        }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "nuri")]
#[command(version, about = "Nuri - Korean NLQ analytics assistant")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Analytics API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub analytics_base_url: Option<String>,

    /// LLM API base URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub llm_api_base: Option<String>,

    /// Enable the LLM port
    #[arg(long)]
    pub llm_enabled: bool,
}

impl Config {
    pub fn load(args: &CommandLineArgs) -> Self {
        let mut config = args
            .config
            .as_deref()
            .or(Some("conf/config.toml"))
            .filter(|path| Path::new(path).exists())
            .and_then(|path| match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                        None
                    },
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file {}: {}", path, e);
                    None
                },
            })
            .unwrap_or_default();

        config.apply_env();
        config.apply_args(args);
        config
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(base) = std::env::var("ANALYTICS_BASE_URL") {
            self.analytics.base_url = base;
        }
        if let Ok(key) = std::env::var("ANALYTICS_API_KEY") {
            self.analytics.api_key = Some(key);
        }
        if let Ok(base) = std::env::var("LLM_API_BASE") {
            self.llm.api_base = base;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model_name = model;
        }
        if std::env::var("LLM_ENABLED").map(|v| v == "1" || v == "true").unwrap_or(false) {
            self.llm.enabled = true;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    fn apply_args(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(url) = &args.database_url {
            self.database.url = url.clone();
        }
        if let Some(base) = &args.analytics_base_url {
            self.analytics.base_url = base.clone();
        }
        if let Some(base) = &args.llm_api_base {
            self.llm.api_base = base.clone();
        }
        if args.llm_enabled {
            self.llm.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8500);
        assert_eq!(config.analytics.timeout_seconds, 20);
        assert_eq!(config.llm.timeout_seconds, 6);
        assert!(!config.llm.enabled);
    }

    #[test]
    fn test_toml_section_parse() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [llm]
            enabled = true
            model_name = "test-model"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.model_name, "test-model");
        assert_eq!(config.analytics.timeout_seconds, 20);
    }
}
