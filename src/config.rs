//! TOML configuration for opening a ledger
use super::ledger::Ledger;
use super::store::SledStore;
use super::types::Identity;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILTER: &str = "movie_ratings=info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Owner identity used when the store has not been initialized yet.
    pub owner: Option<String>,
    pub storage: StorageConfig,
    pub log_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Sled {
        path: PathBuf,
        #[serde(default)]
        flush_on_commit: bool,
    },
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            owner: None,
            storage: StorageConfig::Memory,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("invalid ledger configuration")
    }

    /// Opens the configured store. A fresh store is initialized for the
    /// configured owner; an existing one must match it when an owner is set.
    pub fn open_ledger(&self) -> anyhow::Result<Ledger> {
        let owner = self.owner.as_deref().map(Identity::from);

        let ledger = match &self.storage {
            StorageConfig::Memory => {
                let owner = owner.context("an in-memory ledger needs an owner")?;
                Ledger::in_memory(owner)?
            }
            StorageConfig::Sled {
                path,
                flush_on_commit,
            } => {
                let store = SledStore::open(path)
                    .with_context(|| format!("failed to open store at {}", path.display()))?
                    .flush_on_commit(*flush_on_commit);
                match owner {
                    Some(owner) => Ledger::open_or_initialize(store, owner)?,
                    None => Ledger::open(store)
                        .context("store is not initialized and no owner is configured")?,
                }
            }
        };

        Ok(ledger)
    }
}
