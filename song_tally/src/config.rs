//! Bot configuration: an optional JSON file, every field defaulted.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use revolt_api::{DEFAULT_AUTUMN_URL, DEFAULT_BASE_URL, DEFAULT_WS_URL};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON config in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config validation: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    pub base_url: String,
    pub ws_url: String,
    pub autumn_url: String,
    /// Channel whose uploads are counted and which `>scan` replays.
    pub monitored_channel: String,
    pub data_file: PathBuf,
    pub download_dir: PathBuf,
    /// Keep a local copy of every accepted upload.
    pub save_uploads: bool,
    /// Sender → label used for saved filenames.
    pub display_names: HashMap<String, String>,
    /// Reply "Not a song" to uploads that are too short.
    pub announce_rejections: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            autumn_url: DEFAULT_AUTUMN_URL.to_string(),
            monitored_channel: "wip-beats".to_string(),
            data_file: PathBuf::from("data.txt"),
            download_dir: PathBuf::from("downloads"),
            save_uploads: false,
            display_names: HashMap::new(),
            announce_rejections: true,
        }
    }
}

impl BotConfig {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: BotConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate `path`; `None` gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.monitored_channel.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid(
                "'monitored_channel' cannot be empty".into(),
            ));
        }
        if name.starts_with('#') {
            return Err(ConfigError::Invalid(format!(
                "'monitored_channel' is a bare name, drop the '#' from '{name}'"
            )));
        }
        for (field, url, schemes) in [
            ("base_url", &self.base_url, &["http://", "https://"][..]),
            ("autumn_url", &self.autumn_url, &["http://", "https://"][..]),
            ("ws_url", &self.ws_url, &["ws://", "wss://"][..]),
        ] {
            if !schemes.iter().any(|s| url.starts_with(s)) {
                return Err(ConfigError::Invalid(format!(
                    "'{field}' must start with {}, got '{url}'",
                    schemes.join(" or ")
                )));
            }
        }
        if self.data_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("'data_file' cannot be empty".into()));
        }
        if self.save_uploads && self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "'download_dir' cannot be empty when 'save_uploads' is on".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<BotConfig, ConfigError> {
        BotConfig::from_json(json, Path::new("bot.json"))
    }

    #[test]
    fn empty_object_is_all_defaults() {
        let config = parse("{}").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.monitored_channel, "wip-beats");
        assert!(config.announce_rejections);
        assert!(!config.save_uploads);
    }

    #[test]
    fn overrides_and_display_names() {
        let config = parse(
            r#"{"monitored_channel":"demos","save_uploads":true,
                "display_names":{"beatmaker#0420":"Marcus"}}"#,
        )
        .unwrap();
        assert_eq!(config.monitored_channel, "demos");
        assert_eq!(config.display_names["beatmaker#0420"], "Marcus");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(r#"{"monitored_channel":"  "}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse(r##"{"monitored_channel":"#wip-beats"}"##),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse(r#"{"ws_url":"https://ws.example"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(parse(r#"{"chanel":"x"}"#), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = BotConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(BotConfig::load(None).unwrap(), BotConfig::default());
    }
}
