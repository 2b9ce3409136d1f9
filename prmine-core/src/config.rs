use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level prmine configuration, matching `prmine.toml`.
///
/// Every section has defaults, so an absent config file yields a usable
/// configuration (anonymous credential, conservative page sizes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrMineConfig {
    #[serde(default)]
    pub repository: RepositorySection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// Which repository to mine, and the label filter applied server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySection {
    pub owner: String,
    pub name: String,
    pub label: String,
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            owner: "llvm".to_string(),
            name: "llvm-project".to_string(),
            label: "clang".to_string(),
        }
    }
}

/// Paging and rate-budget parameters for the sync loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Pull requests fetched per page.
    pub prs_per_page: u32,
    /// Nested entities (commits, comments, reviews, ...) fetched per pull request.
    pub related_per_page: u32,
    /// Query cost budget per rolling 60-second window. GitHub's limit is 2000.
    pub cost_per_minute: u32,
    /// Fixed delay between pages, in milliseconds.
    pub page_delay_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            prs_per_page: 10,
            related_per_page: 5,
            cost_per_minute: 1900,
            page_delay_ms: 100,
        }
    }
}

/// Ordered pool of bearer tokens. An empty string is a valid entry and
/// means anonymous (low-quota) access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub tokens: Vec<String>,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            tokens: vec![String::new()],
        }
    }
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub db_path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("prmine.db"),
        }
    }
}

impl PrMineConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error; defaults apply. A present but
    /// unreadable or unparsable file is.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the sync engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.prs_per_page == 0 {
            return Err(ConfigError::Invalid("prs_per_page must be > 0".to_string()));
        }
        if self.sync.related_per_page == 0 {
            return Err(ConfigError::Invalid(
                "related_per_page must be > 0".to_string(),
            ));
        }
        if self.sync.cost_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "cost_per_minute must be > 0".to_string(),
            ));
        }
        if self.auth.tokens.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.tokens must contain at least one entry (\"\" for anonymous)".to_string(),
            ));
        }
        if self.repository.owner.is_empty() || self.repository.name.is_empty() {
            return Err(ConfigError::Invalid(
                "repository.owner and repository.name must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PrMineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.repository.owner, "llvm");
        assert_eq!(config.sync.prs_per_page, 10);
        assert_eq!(config.sync.cost_per_minute, 1900);
        assert_eq!(config.auth.tokens, vec![String::new()]);
    }

    #[test]
    fn parses_partial_toml() {
        let config: PrMineConfig = toml::from_str(
            r#"
            [repository]
            owner = "rust-lang"
            name = "rust"
            label = "A-diagnostics"

            [auth]
            tokens = ["ghp_aaa", "ghp_bbb"]
            "#,
        )
        .unwrap();
        assert_eq!(config.repository.owner, "rust-lang");
        assert_eq!(config.auth.tokens.len(), 2);
        // Unspecified sections fall back to defaults
        assert_eq!(config.sync.related_per_page, 5);
        assert_eq!(config.store.db_path, PathBuf::from("prmine.db"));
    }

    #[test]
    fn rejects_zero_page_size() {
        let mut config = PrMineConfig::default();
        config.sync.prs_per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_token_pool() {
        let mut config = PrMineConfig::default();
        config.auth.tokens.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = PrMineConfig::load(Path::new("/nonexistent/prmine.toml")).unwrap();
        assert_eq!(config.repository.name, "llvm-project");
    }
}
