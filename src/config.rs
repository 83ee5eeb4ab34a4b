//! Pagination configuration using Figment
//!
//! Sources, highest precedence first:
//! 1. Environment variables (`QUILL_PAGINATION__DEFAULT_LIMIT`, `QUILL_PAGINATION__MAX_LIMIT`)
//! 2. The `[pagination]` table of a TOML file, when one is given
//! 3. Default values

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{GraphQLError, Result};

/// Page size settings applied to every paginated field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the request does not give one
    pub default_limit: usize,
    /// Largest page size a request may ask for
    pub max_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl PaginationConfig {
    /// Load from defaults and environment variables
    pub fn load() -> Result<Self> {
        Self::extract(Self::figment())
    }

    /// Load from a TOML file, with environment variables taking precedence
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading pagination configuration from: {}", path.display());
        Self::extract(Self::figment().merge(Toml::file(path)).merge(env()))
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::default("pagination", Self::default()))
            .merge(env())
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract_inner("pagination")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(GraphQLError::Config(
                "default_limit must be at least 1".to_string(),
            ));
        }
        if self.default_limit > self.max_limit {
            return Err(GraphQLError::Config(format!(
                "default_limit ({}) exceeds max_limit ({})",
                self.default_limit, self.max_limit
            )));
        }
        Ok(())
    }
}

fn env() -> Env {
    Env::prefixed("QUILL_").split("__")
}
