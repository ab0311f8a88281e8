//! Search configuration loading.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::search::DEFAULT_MAX_ID_VALUES;
use crate::target::TargetConfig;
use crate::{Result, VoteSearchError};

/// Vote search configuration.
///
/// ```toml
/// database_path = "/var/lib/votes/votes.db"
/// max_id_values = 100
/// log_dir = "/var/log/votes"
///
/// [[targets]]
/// name = "note"
/// vote_table = "note_votes"
/// target_table = "notes"
/// target_column = "note_id"
/// creator_column = "creator_id"
/// score_column = "score"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Cap on comma-separated id lists
    pub max_id_values: usize,
    /// Directory for daily log files; stderr when unset
    pub log_dir: Option<PathBuf>,
    /// Extra votable targets beyond `post` and `comment`
    pub targets: Vec<TargetConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("votes.db"),
            max_id_values: DEFAULT_MAX_ID_VALUES,
            log_dir: None,
            targets: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from a TOML file, or defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| VoteSearchError::Config(format!("Failed to parse config: {}", e)))?;
        if config.max_id_values == 0 {
            return Err(VoteSearchError::Config("max_id_values must be at least 1".to_string()));
        }
        for target in &config.targets {
            target.validate()?;
        }
        Ok(config)
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "votesearch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("votesearch.toml"))
    }

    /// Find a target by name: configured targets first, then built-ins.
    pub fn target(&self, name: &str) -> Option<TargetConfig> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .or_else(|| TargetConfig::builtin(name))
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "votesearch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_id_values, 100);
        assert!(config.log_dir.is_none());
        assert!(config.database_path.ends_with("votes.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SearchConfig::from_toml("max_id_values = 20").unwrap();
        assert_eq!(config.max_id_values, 20);
        assert!(config.database_path.ends_with("votes.db"));
    }

    #[test]
    fn test_custom_target() {
        let config = SearchConfig::from_toml(
            r#"
            [[targets]]
            name = "note"
            vote_table = "note_votes"
            target_table = "notes"
            target_column = "note_id"
            creator_column = "creator_id"
            score_column = "score"
            "#,
        )
        .unwrap();

        let note = config.target("note").unwrap();
        assert_eq!(note.vote_table, "note_votes");
        assert!(note.up_score_column.is_none());
        assert_eq!(config.target("post"), Some(TargetConfig::post()));
        assert!(config.target("wiki").is_none());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(
            SearchConfig::from_toml("max_id_values = 0"),
            Err(VoteSearchError::Config(_))
        ));
        assert!(matches!(
            SearchConfig::from_toml("max_id_values = \"many\""),
            Err(VoteSearchError::Config(_))
        ));
        assert!(SearchConfig::from_toml(
            r#"
            [[targets]]
            name = "note"
            vote_table = "note_votes; --"
            target_table = "notes"
            target_column = "note_id"
            creator_column = "creator_id"
            score_column = "score"
            "#,
        )
        .is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SearchConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_id_values, 100);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_path = \"/tmp/v.db\"\nlog_dir = \"/tmp/logs\"\n").unwrap();

        let config = SearchConfig::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/v.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }
}
