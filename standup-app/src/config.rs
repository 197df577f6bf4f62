//! `config.toml` loading and validation.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; required.
    pub token: String,
    /// Worker count for the update processor pool.
    pub threads: usize,
    /// Path to the response template file.
    pub template: PathBuf,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            threads: 1,
            template: PathBuf::from("assets/telegram/strings.yaml"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Error,
    Fatal,
}

impl LogLevel {
    /// The `tracing` filter directive for this level. tracing has no fatal
    /// level, so `fatal` logs errors and above.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error | Self::Fatal => "error",
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.telegram.token.trim().is_empty() {
            anyhow::bail!("telegram.token must be a non-empty string");
        }
        if self.telegram.threads == 0 {
            anyhow::bail!("telegram.threads must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
                [telegram]
                token = "123:abc"
                threads = 10
                template = "strings.yaml"

                [logging]
                level = "debug"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.telegram.threads, 10);
        assert_eq!(config.telegram.template, PathBuf::from("strings.yaml"));
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn omitted_keys_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
                [telegram]
                token = "123:abc"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.telegram.threads, 1);
        assert_eq!(
            config.telegram.template,
            PathBuf::from("assets/telegram/strings.yaml")
        );
        assert_eq!(config.logging.level, LogLevel::Info);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_token_fails_validation() {
        let config: Config = toml::from_str("[telegram]\ntoken = \"  \"\n").expect("parses");

        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_threads_fail_validation() {
        let config: Config =
            toml::from_str("[telegram]\ntoken = \"123:abc\"\nthreads = 0\n").expect("parses");

        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[logging]\nlevel = \"loud\"\n");

        assert!(result.is_err());
    }

    #[test]
    fn fatal_maps_onto_the_error_filter() {
        assert_eq!(LogLevel::Fatal.as_filter(), "error");
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
    }
}
