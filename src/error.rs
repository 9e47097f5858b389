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

//! Error types for ledger, moderation, and acquisition operations.

use crate::base::{AccountId, ProductId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kinds of entity an operation can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Account,
    Product,
    PurchaseRequest,
    SavedFilter,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Account => "account",
            Self::Product => "product",
            Self::PurchaseRequest => "purchase request",
            Self::SavedFilter => "saved filter",
        })
    }
}

/// Engine operation errors.
///
/// Every failure leaves persisted state exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Charge exceeds the current balance
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    /// Unknown account, product, request, or filter
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// An active purchase request already exists for the pair
    #[error("account {account} already has an active request for product {product}")]
    DuplicateAcquisition { account: AccountId, product: ProductId },

    /// Transition attempted from a terminal or incompatible state
    #[error("invalid {entity} transition from {from} to {to}")]
    InvalidStateTransition {
        entity: Entity,
        from: &'static str,
        to: &'static str,
    },

    /// Lock contention outlasted the retry budget
    #[error("concurrency conflict: gave up after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    /// Malformed input rejected before reaching storage
    #[error("validation failed: {0}")]
    Validation(String),
}

impl LedgerError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            Self::DuplicateAcquisition { .. } => "DUPLICATE_ACQUISITION",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}
