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

//! Atomic units of work.
//!
//! A unit takes the entity locks it needs in the fixed order
//! account → product → purchase request, validates everything, and only then
//! mutates. Each lock is awaited for at most the configured timeout; when one
//! times out the attempt is abandoned before any mutation, every held guard is
//! dropped, and the whole unit is retried from a fresh read.

use crate::LedgerError;
use crate::config::EngineConfig;
use parking_lot::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Why an attempt stopped.
#[derive(Debug)]
pub(crate) enum Abort {
    /// A lock could not be acquired in time; the attempt may be retried.
    Contended,
    /// The unit failed for a domain reason; surfaced as-is.
    Failed(LedgerError),
}

impl From<LedgerError> for Abort {
    fn from(error: LedgerError) -> Self {
        Self::Failed(error)
    }
}

pub(crate) type Attempt<T> = Result<T, Abort>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_attempts: u32,
    lock_timeout: Duration,
    backoff: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            lock_timeout: config.lock_timeout(),
            backoff: config.retry_backoff(),
        }
    }

    /// Acquires one entity lock for the current attempt.
    pub(crate) fn lock<'a, T>(&self, cell: &'a Mutex<T>) -> Attempt<MutexGuard<'a, T>> {
        cell.try_lock_for(self.lock_timeout).ok_or(Abort::Contended)
    }

    /// Runs `body` until it commits, fails, or exhausts its attempts.
    pub(crate) fn run<T>(
        &self,
        unit: &'static str,
        mut body: impl FnMut(&Self) -> Attempt<T>,
    ) -> Result<T, LedgerError> {
        for attempt in 1..=self.max_attempts {
            match body(self) {
                Ok(value) => return Ok(value),
                Err(Abort::Failed(error)) => {
                    debug!(unit, %error, "atomic unit failed");
                    return Err(error);
                }
                Err(Abort::Contended) => {
                    debug!(unit, attempt, "lock contended, retrying");
                    if attempt < self.max_attempts {
                        thread::sleep(self.backoff * attempt);
                    }
                }
            }
        }
        warn!(unit, attempts = self.max_attempts, "atomic unit abandoned");
        Err(LedgerError::ConcurrencyConflict {
            attempts: self.max_attempts,
        })
    }
}
