//! Chat configuration loaded from a YAML file, with CLI overrides applied once
//! at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::{
    Args, DEFAULT_API_BASE, DEFAULT_CONFIG_FILE, DEFAULT_HISTORY_FILE, DEFAULT_MODEL,
    DEFAULT_SESSION_DIR,
};
use crate::errors::ChatError;
use crate::pricing::{PricingEntry, PricingTable};

/// Resolved chat configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: String,
    pub temperature: f32,
    /// Render replies as markdown and ask the model to answer in markdown.
    pub markdown: bool,
    pub multiline: bool,
    pub max_tokens: Option<u32>,
    /// Base URL the `/chat/completions` path is appended to.
    pub api_base: String,
    /// Request timeout. `None` leaves the HTTP client default in place.
    pub timeout_secs: Option<u64>,
    pub session_dir: PathBuf,
    pub history_file: PathBuf,
    /// Extra or replacement entries for the built-in pricing table.
    pub pricing: HashMap<String, PricingEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            markdown: true,
            multiline: false,
            max_tokens: None,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: None,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            pricing: HashMap::new(),
        }
    }
}

impl Config {
    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ChatError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ChatError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading config");
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Load the config named on the command line, or `./config.yaml` if it
    /// exists, then apply the `--model` and `--multiline` overrides.
    pub fn load(args: &Args) -> Result<Self, ChatError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(model) = &args.model {
            self.model = model.clone();
        }
        if args.multiline {
            self.multiline = true;
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(ChatError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(ChatError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::with_overrides(&self.pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.temperature, 1.0);
        assert!(config.markdown);
        assert!(!config.multiline);
        assert!(config.max_tokens.is_none());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn recognized_keys() {
        let config = Config::from_yaml(
            "model: gpt-4\ntemperature: 0.2\nmarkdown: false\nmultiline: true\nmax_tokens: 512\ntimeout_secs: 30\n",
        )
        .unwrap();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.temperature, 0.2);
        assert!(!config.markdown);
        assert!(config.multiline);
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn pricing_overrides() {
        let config = Config::from_yaml(
            "model: local-llm\npricing:\n  local-llm:\n    prompt: 0.001\n    completion: 0.002\n",
        )
        .unwrap();
        let table = config.pricing_table();
        assert_eq!(
            table.get("local-llm").unwrap(),
            PricingEntry::new(0.001, 0.002)
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(matches!(
            Config::from_yaml("modle: gpt-4\n"),
            Err(ChatError::Yaml(_))
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Config::from_yaml("temperature: hot\n").is_err());
        assert!(matches!(
            Config::from_yaml("temperature: 3.5\n"),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            Config::from_yaml("max_tokens: 0\n"),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn cli_overrides() {
        let mut config = Config::default();
        let args = Args {
            model: Some("gpt-4o".to_string()),
            multiline: true,
            ..Args::default()
        };
        config.apply_overrides(&args);
        assert_eq!(config.model, "gpt-4o");
        assert!(config.multiline);
    }

    #[test]
    fn multiline_flag_does_not_clear_config() {
        let mut config = Config {
            multiline: true,
            ..Config::default()
        };
        config.apply_overrides(&Args::default());
        assert!(config.multiline);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/gptchat/config.yaml")),
            ..Args::default()
        };
        assert!(matches!(Config::load(&args), Err(ChatError::Config(_))));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "model: gpt-4\nmarkdown: false\n").unwrap();
        let args = Args {
            config: Some(path),
            model: Some("gpt-4-32k".to_string()),
            ..Args::default()
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.model, "gpt-4-32k");
        assert!(!config.markdown);
    }
}
