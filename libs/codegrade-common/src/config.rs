// Language configuration management (config/languages.json)
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A command line with `{source}`, `{workdir}` and `{entry}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// How to find the name a run command needs after compilation,
/// e.g. the class name javac produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointRule {
    pub artifact_extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub file_extension: String,
    /// Fixed source file name; defaults to `main<file_extension>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<EntryPointRule>,
}

fn default_version() -> String {
    "latest".to_string()
}

impl LanguageConfig {
    pub fn source_file_name(&self) -> String {
        match &self.source_file {
            Some(name) => name.clone(),
            None if self.file_extension.starts_with('.') => format!("main{}", self.file_extension),
            None => format!("main.{}", self.file_extension),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LanguagesJson {
    pub languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone, Default)]
pub struct LanguageConfigManager {
    configs: BTreeMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;
        Self::from_configs(languages_json.languages)
    }

    pub fn from_configs(languages: Vec<LanguageConfig>) -> Result<Self> {
        let mut configs = BTreeMap::new();
        for lang in languages {
            if lang.name.trim().is_empty() {
                bail!("Language entry with an empty name in languages.json");
            }
            if lang.run.command.trim().is_empty() {
                bail!("Language '{}' has an empty run command", lang.name);
            }
            if let Some(previous) = configs.insert(lang.name.clone(), lang) {
                bail!("Language '{}' is configured more than once", previous.name);
            }
        }
        Ok(Self { configs })
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &str) -> Option<&LanguageConfig> {
        self.configs.get(language)
    }

    pub fn configs(&self) -> impl Iterator<Item = &LanguageConfig> {
        self.configs.values()
    }

    /// List all supported languages
    pub fn list_languages(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }
}

/// Load languages.json for editing; a missing file is an empty config.
pub fn load_languages_json(config_path: &Path) -> Result<LanguagesJson> {
    if !config_path.exists() {
        return Ok(LanguagesJson::default());
    }

    let content = fs::read_to_string(config_path).context("Failed to read languages.json")?;
    serde_json::from_str(&content).context("Failed to parse languages.json")
}

/// Save languages configuration
pub fn save_languages_json(config_path: &Path, config: &LanguagesJson) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json_content =
        serde_json::to_string_pretty(config).context("Failed to serialize languages.json")?;

    fs::write(config_path, json_content).context("Failed to write languages.json")?;

    Ok(())
}
