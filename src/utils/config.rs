use std::path::{Path, PathBuf};
use std::sync::Arc;

use easy_config_store::ConfigStore;
use eyre::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::TailorError;

pub type Config = Arc<Settings>;

pub fn config(path: PathBuf) -> Result<Config> {
    let config_store = ConfigStore::<Settings>::read(path, "config".to_string())?;
    let inner = (*config_store).clone();

    info!("config parsing successful");
    debug!("loaded configuration:\n{}", toml::to_string_pretty(&inner.redacted())?);

    Ok(Arc::new(inner))
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    #[default]
    OpenAi,
    Generic,
}

impl std::str::FromStr for LlmMode {
    type Err = TailorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmMode::OpenAi),
            "generic" => Ok(LlmMode::Generic),
            other => Err(TailorError::InputValidation(format!(
                "unknown llm_mode '{other}', expected 'openai' or 'generic'"
            ))),
        }
    }
}

/// Process-wide settings, read once per command and passed down by value.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub exa_api_key: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_mode: LlmMode,
    pub llm_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exa_api_key: String::new(),
            llm_endpoint: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_mode: LlmMode::default(),
            llm_api_key: String::new(),
        }
    }
}

impl Settings {
    pub fn deep_extraction_enabled(&self) -> bool {
        !self.exa_api_key.trim().is_empty()
    }

    pub fn llm_configured(&self) -> bool {
        !self.llm_api_key.trim().is_empty() && !self.llm_endpoint.trim().is_empty()
    }

    /// Copy safe to print: keys reduced to their last four characters.
    pub fn redacted(&self) -> Settings {
        fn mask(key: &str) -> String {
            let chars: Vec<char> = key.chars().collect();
            match chars.len() {
                0 => String::new(),
                n if n <= 4 => "****".to_string(),
                n => format!("****{}", chars[n - 4..].iter().collect::<String>()),
            }
        }

        Settings {
            exa_api_key: mask(&self.exa_api_key),
            llm_api_key: mask(&self.llm_api_key),
            ..self.clone()
        }
    }
}

/// Partial update applied by `SettingsStore::set`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SettingsPatch {
    pub exa_api_key: Option<String>,
    pub llm_endpoint: Option<String>,
    pub llm_model: Option<String>,
    pub llm_mode: Option<LlmMode>,
    pub llm_api_key: Option<String>,
}

impl SettingsPatch {
    pub fn from_pair(key: &str, value: &str) -> Result<Self, TailorError> {
        let value = value.trim().to_string();
        let mut patch = SettingsPatch::default();
        match key {
            "exa_api_key" => patch.exa_api_key = Some(value),
            "llm_endpoint" => patch.llm_endpoint = Some(value),
            "llm_model" => patch.llm_model = Some(value),
            "llm_mode" => patch.llm_mode = Some(value.parse()?),
            "llm_api_key" => patch.llm_api_key = Some(value),
            other => {
                return Err(TailorError::InputValidation(format!(
                    "unknown setting '{other}'"
                )));
            }
        }
        Ok(patch)
    }

    pub fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.exa_api_key {
            settings.exa_api_key = v;
        }
        if let Some(v) = self.llm_endpoint {
            settings.llm_endpoint = v;
        }
        if let Some(v) = self.llm_model {
            settings.llm_model = v;
        }
        if let Some(v) = self.llm_mode {
            settings.llm_mode = v;
        }
        if let Some(v) = self.llm_api_key {
            settings.llm_api_key = v;
        }
    }
}

/// File-backed settings store behind the `settings` subcommand.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn get(&self) -> Result<Settings> {
        Ok((*config(self.path.clone())?).clone())
    }

    pub fn set(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut settings = self.get()?;
        patch.apply(&mut settings);

        std::fs::write(&self.path, toml::to_string_pretty(&settings)?)?;
        info!("settings written to {}", self.path.display());

        Ok(settings)
    }
}
