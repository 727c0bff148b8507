//! Application configuration management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const MAX_RECENT: usize = 10;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder scanned for `.ipynb` files
    pub library_dir: Option<PathBuf>,
    /// Recently opened notebooks, most recent first
    pub recent_notebooks: Vec<PathBuf>,
    /// Notebook view settings
    pub viewer: ViewerConfig,
    /// UI settings
    pub ui: UiConfig,
    /// Generative suggestion settings
    pub suggestions: SuggestionConfig,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

/// Notebook view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Font size in pixels for code and outputs
    pub font_size: f32,
    /// Show `[n]` prompts next to code cells
    pub show_execution_counts: bool,
    /// Wrap long output lines
    pub wrap_outputs: bool,
}

/// UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Theme (light/dark)
    pub theme: String,
    /// Whether the suggestion panel is shown
    pub suggestions_visible: bool,
}

/// Generative text service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub endpoint: String,
    pub model: String,
    /// Without a key the suggestion panel stays empty
    pub api_key: Option<String>,
    /// Extra seed topics added to the library's tags
    pub seeds: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            recent_notebooks: Vec::new(),
            viewer: ViewerConfig::default(),
            ui: UiConfig::default(),
            suggestions: SuggestionConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            show_execution_counts: true,
            wrap_outputs: false,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            suggestions_visible: false,
        }
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            seeds: vec![
                "Remote Sensing".to_string(),
                "Machine Learning".to_string(),
                "Oceanography".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "nbview", "nbview")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Add a notebook to recent notebooks
    pub fn add_recent_notebook(&mut self, path: PathBuf) {
        // Remove if already exists
        self.recent_notebooks.retain(|p| p != &path);
        // Add to front
        self.recent_notebooks.insert(0, path);
        self.recent_notebooks.truncate(MAX_RECENT);
    }

    pub fn is_dark(&self) -> bool {
        self.ui.theme.eq_ignore_ascii_case("dark")
    }

    /// Parsed log level, `INFO` when unrecognized
    pub fn level_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        self.log_level
            .parse()
            .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_notebooks_dedup_and_cap() {
        let mut config = AppConfig::default();
        for i in 0..12 {
            config.add_recent_notebook(PathBuf::from(format!("/nb/{i}.ipynb")));
        }
        config.add_recent_notebook(PathBuf::from("/nb/5.ipynb"));

        assert_eq!(config.recent_notebooks.len(), MAX_RECENT);
        assert_eq!(config.recent_notebooks[0], PathBuf::from("/nb/5.ipynb"));
        assert_eq!(
            config
                .recent_notebooks
                .iter()
                .filter(|p| p.ends_with("5.ipynb"))
                .count(),
            1
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.ui.theme = "dark".to_string();
        config.suggestions.api_key = Some("k".to_string());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!(loaded.is_dark());
        assert_eq!(loaded.suggestions.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"viewer": {"font_size": 18.0}, "log_level": "debug"}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.viewer.font_size, 18.0);
        assert!(config.viewer.show_execution_counts);
        assert_eq!(config.suggestions.seeds.len(), 3);
        assert_eq!(
            config.level_filter(),
            tracing_subscriber::filter::LevelFilter::DEBUG
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.log_level, "info");
        assert!(!config.is_dark());
    }
}
