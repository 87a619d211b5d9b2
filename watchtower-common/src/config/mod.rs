mod defaults;

use std::path::PathBuf;
use std::time::Duration;

pub use defaults::RECENT_ENTRIES_HARD_CEILING;
use defaults::*;
use serde::{Deserialize, Serialize};

use crate::{Secret, WatchtowerError};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    /// Entries returned when the caller does not ask for a count.
    #[serde(default = "_default_recent_entries")]
    pub default_recent_entries: u64,

    #[serde(default = "_default_max_recent_entries")]
    pub max_recent_entries: u64,

    /// How often a status change is re-attempted after losing a race.
    #[serde(default = "_default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_recent_entries: _default_recent_entries(),
            max_recent_entries: _default_max_recent_entries(),
            conflict_retries: _default_conflict_retries(),
        }
    }
}

impl LedgerConfig {
    /// The configured maximum, never above the hard ceiling.
    pub fn effective_max_entries(&self) -> u64 {
        self.max_recent_entries.min(RECENT_ENTRIES_HARD_CEILING)
    }

    /// Resolves a caller-supplied history limit. Oversized values are
    /// clamped rather than rejected.
    pub fn clamp_limit(&self, requested: Option<u64>) -> u64 {
        let max = self.effective_max_entries();
        requested
            .unwrap_or(self.default_recent_entries)
            .min(max)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// Lifetime applied when `issue` is called without one.
    #[serde(default, with = "humantime_serde")]
    pub default_ttl: Option<Duration>,

    #[serde(default = "_default_issue_attempts")]
    pub issue_attempts: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            issue_attempts: _default_issue_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchtowerConfigStore {
    #[serde(default = "_default_database_url")]
    pub database_url: Secret<String>,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub tokens: TokenConfig,
}

impl Default for WatchtowerConfigStore {
    fn default() -> Self {
        Self {
            database_url: _default_database_url(),
            ledger: LedgerConfig::default(),
            tokens: TokenConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchtowerConfig {
    pub store: WatchtowerConfigStore,
    pub paths_relative_to: PathBuf,
}

impl WatchtowerConfig {
    pub fn validate(&self) -> Result<(), WatchtowerError> {
        let ledger = &self.store.ledger;
        if ledger.max_recent_entries == 0 {
            return Err(WatchtowerError::invalid_argument(
                "ledger.max_recent_entries must be positive",
            ));
        }
        if ledger.default_recent_entries > ledger.effective_max_entries() {
            tracing::warn!(
                default = ledger.default_recent_entries,
                max = ledger.effective_max_entries(),
                "ledger.default_recent_entries exceeds the maximum and will be clamped"
            );
        }
        if self.store.tokens.issue_attempts == 0 {
            return Err(WatchtowerError::invalid_argument(
                "tokens.issue_attempts must be at least 1",
            ));
        }
        if self.store.tokens.default_ttl == Some(Duration::ZERO) {
            return Err(WatchtowerError::invalid_argument(
                "tokens.default_ttl must be a positive duration",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_and_clamp() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.clamp_limit(None), 50);
        assert_eq!(ledger.clamp_limit(Some(10)), 10);
        assert_eq!(ledger.clamp_limit(Some(0)), 0);
        assert_eq!(ledger.clamp_limit(Some(5000)), 200);
    }

    #[test]
    fn configured_maximum_cannot_exceed_ceiling() {
        let ledger = LedgerConfig {
            max_recent_entries: 1000,
            ..Default::default()
        };
        assert_eq!(ledger.effective_max_entries(), RECENT_ENTRIES_HARD_CEILING);

        let ledger = LedgerConfig {
            max_recent_entries: 20,
            ..Default::default()
        };
        assert_eq!(ledger.clamp_limit(None), 20);
    }

    #[test]
    fn store_deserializes_with_defaults() {
        let store: WatchtowerConfigStore = serde_yaml::from_str(
            "database_url: sqlite:/var/lib/watchtower/db\ntokens:\n  default_ttl: 24h\n",
        )
        .unwrap();
        assert_eq!(store.database_url.expose_secret(), "sqlite:/var/lib/watchtower/db");
        assert_eq!(store.ledger.default_recent_entries, 50);
        assert_eq!(store.ledger.conflict_retries, 3);
        assert_eq!(store.tokens.default_ttl, Some(Duration::from_secs(24 * 3600)));
        assert_eq!(store.tokens.issue_attempts, 3);
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let mut config = WatchtowerConfig {
            store: WatchtowerConfigStore::default(),
            paths_relative_to: PathBuf::from("."),
        };
        assert!(config.validate().is_ok());
        config.store.tokens.default_ttl = Some(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(WatchtowerError::InvalidArgument(_))
        ));
    }
}
