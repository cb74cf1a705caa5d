use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_PROGRAM, DEFAULT_TIMEOUT};

const DEFAULT_MODELS: &str = "llama3.1:8b,deepseek-r1:8b,gpt-oss:20b,gemma3:12b";

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// JSON array file backing the analysis history.
    pub history_file: PathBuf,
    /// Executable used to run the local model (`<bin> run <model> --think=false`).
    pub evaluator_bin: String,
    pub evaluator_timeout: Duration,
    pub default_model: String,
    pub models: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let timeout_secs = std::env::var("EVALUATOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT.as_secs().to_string())
            .parse::<u64>()
            .context("EVALUATOR_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            history_file: std::env::var("HISTORY_FILE")
                .unwrap_or_else(|_| "results.json".to_string())
                .into(),
            evaluator_bin: std::env::var("EVALUATOR_BIN")
                .unwrap_or_else(|_| DEFAULT_PROGRAM.to_string()),
            evaluator_timeout: Duration::from_secs(timeout_secs),
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| "llama3.1:8b".to_string()),
            models: parse_model_list(
                &std::env::var("MODELS").unwrap_or_else(|_| DEFAULT_MODELS.to_string()),
            ),
        })
    }

    /// Picks the requested model, or the default when none (or a blank one) was given.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string()
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config(history_file: PathBuf) -> Config {
    Config {
        port: 0,
        rust_log: "debug".to_string(),
        history_file,
        evaluator_bin: DEFAULT_PROGRAM.to_string(),
        evaluator_timeout: Duration::from_secs(5),
        default_model: "llama3.1:8b".to_string(),
        models: parse_model_list(DEFAULT_MODELS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list_skips_blanks() {
        let models = parse_model_list(" llama3.1:8b, ,gemma3:12b,");
        assert_eq!(models, vec!["llama3.1:8b", "gemma3:12b"]);
    }

    #[test]
    fn test_resolve_model_falls_back_to_default() {
        let config = test_config("results.json".into());
        assert_eq!(config.resolve_model(None), "llama3.1:8b");
        assert_eq!(config.resolve_model(Some("   ")), "llama3.1:8b");
        assert_eq!(config.resolve_model(Some(" gemma3:12b ")), "gemma3:12b");
    }
}
