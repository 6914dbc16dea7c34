// src/config/mod.rs - Bot settings and response templates

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::UserId;

pub const DEFAULT_CONFIG_PATH: &str = "config/bot.yaml";
pub const CONFIG_PATH_ENV: &str = "SWEARJAR_CONFIG";
pub const DATABASE_PATH_ENV: &str = "SWEARJAR_DATABASE";

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfiguration {
    /// SQLite file holding the usage ledger
    pub database_path: PathBuf,
    pub command_prefix: String,
    pub word_cache_enabled: bool,
    /// Log at debug level
    pub extended_log: bool,
    /// Users treated as chat administrators by the console connection
    pub admin_user_ids: Vec<UserId>,
    pub responses: ResponseTemplates,
}

impl Default for BotConfiguration {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("swearjar-data.db"),
            command_prefix: "/".to_string(),
            word_cache_enabled: true,
            extended_log: false,
            admin_user_ids: Vec::new(),
            responses: ResponseTemplates::default(),
        }
    }
}

/// Every user-facing reply the bot sends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTemplates {
    pub no_authority: String,
    pub success: String,
    pub words_list_header: String,
    pub users_list_header: String,
    pub wrong_count: String,
    pub nothing_amnestied: String,
    /// Supports `$(user)` and `$(words)`
    pub amnestied_words: String,
    pub unknown_command: String,
    pub fine: String,
    pub total_score: String,
    pub storage_failure: String,
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self {
            no_authority: "Only chat administrators can do that".to_string(),
            success: "Done".to_string(),
            words_list_header: "Prohibited words:".to_string(),
            users_list_header: "Scores:".to_string(),
            wrong_count: "Amnesty needs a positive number of words".to_string(),
            nothing_amnestied: "Nothing to amnesty".to_string(),
            amnestied_words: "$(user) is forgiven for: $(words)".to_string(),
            unknown_command: "Unknown command".to_string(),
            fine: "Fined".to_string(),
            total_score: "Total score".to_string(),
            storage_failure: "Something went wrong, nothing was changed".to_string(),
        }
    }
}

impl ResponseTemplates {
    pub fn amnesty_report(&self, user: &str, words: &[String]) -> String {
        self.amnestied_words
            .replace("$(user)", user)
            .replace("$(words)", &words.join(", "))
    }
}

impl BotConfiguration {
    /// Resolve the configuration path from the environment, falling back to the default
    pub fn path_from_env() -> PathBuf {
        env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from `path`, writing a default file when none exists.
    /// `.toml` files are read as TOML, everything else as YAML.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No configuration at {}, creating defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        config.validate()?;
        info!("Loaded bot configuration from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(database_path) = env::var(DATABASE_PATH_ENV) {
            info!("Database path overridden by {}", DATABASE_PATH_ENV);
            self.database_path = PathBuf::from(database_path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() {
            anyhow::bail!("command_prefix must not be empty");
        }
        if self.database_path.as_os_str().is_empty() {
            anyhow::bail!("database_path must not be empty");
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config").join("bot.yaml");

        let config = BotConfiguration::load(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.command_prefix, "/");
        assert!(config.word_cache_enabled);
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bot.yaml");
        fs::write(
            &path,
            "database_path: chat.db\nadmin_user_ids: [1, 2]\nresponses:\n  success: Ok!\n",
        )
        .await
        .unwrap();

        let config = BotConfiguration::load(&path).await.unwrap();
        assert_eq!(config.database_path, PathBuf::from("chat.db"));
        assert_eq!(config.admin_user_ids, vec![1, 2]);
        assert_eq!(config.responses.success, "Ok!");
        assert_eq!(config.responses.unknown_command, "Unknown command");
    }

    #[tokio::test]
    async fn test_toml_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bot.toml");

        let mut config = BotConfiguration::default();
        config.word_cache_enabled = false;
        config.save(&path).await.unwrap();

        let loaded = BotConfiguration::load(&path).await.unwrap();
        assert!(!loaded.word_cache_enabled);
    }

    #[tokio::test]
    async fn test_empty_prefix_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bot.yaml");
        fs::write(&path, "command_prefix: \"\"\n").await.unwrap();

        assert!(BotConfiguration::load(&path).await.is_err());
    }

    #[test]
    fn test_amnesty_report_substitution() {
        let templates = ResponseTemplates::default();
        let report = templates.amnesty_report("bob", &["spam".to_string(), "ham".to_string()]);
        assert_eq!(report, "bob is forgiven for: spam, ham");
    }
}
