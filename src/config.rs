// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! # Example
//!
//! ```
//! use storefront_ledger::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     max_attempts = 4
//!
//!     [subscription]
//!     fee = 1499
//!     duration_days = 30
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.max_attempts, 4);
//! assert_eq!(config.subscription.fee, 1499);
//! assert_eq!(config.lock_timeout_ms, 50);
//! ```

use crate::LedgerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Price and length of one Pro subscription period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Fee in minor currency units.
    pub fee: u64,
    pub duration_days: u32,
}

impl SubscriptionPlan {
    pub fn new(fee: u64, duration_days: u32) -> Self {
        Self { fee, duration_days }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.duration_days))
    }

    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.fee == 0 {
            return Err(LedgerError::invalid("subscription fee must be positive"));
        }
        if self.duration_days == 0 {
            return Err(LedgerError::invalid("subscription duration must be positive"));
        }
        Ok(())
    }
}

impl Default for SubscriptionPlan {
    /// One year of Pro for 999 minor units.
    fn default() -> Self {
        Self {
            fee: 999,
            duration_days: 365,
        }
    }
}

/// Tunables for the engine's atomic units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts per atomic unit before surfacing a concurrency conflict.
    pub max_attempts: u32,
    /// How long one attempt waits for each entity lock.
    pub lock_timeout_ms: u64,
    /// Base pause between attempts, scaled by the attempt number.
    pub retry_backoff_ms: u64,
    /// Plan used when a caller does not supply one.
    pub subscription: SubscriptionPlan,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            lock_timeout_ms: 50,
            retry_backoff_ms: 2,
            subscription: SubscriptionPlan::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        self.subscription
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
