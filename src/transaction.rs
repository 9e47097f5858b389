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

//! Ledger records.
//!
//! A [`TransactionRecord`] is written once per balance change, carrying the
//! same signed delta that was applied. Records are never updated or removed.

use crate::LedgerError;
use crate::base::{AccountId, ProductId, TransactionId};
use crate::config::SubscriptionPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Purchase,
    Subscription,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Purchase => "purchase",
            Self::Subscription => "subscription",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// Whether records of this kind add to the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account: AccountId,
    /// Signed delta in minor units: positive credits, negative debits.
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Why an account is being debited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReason {
    kind: TransactionKind,
    description: String,
}

impl ChargeReason {
    /// Builds a reason for any debit kind.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] if `kind` is a credit kind.
    pub fn new(kind: TransactionKind, description: impl Into<String>) -> Result<Self, LedgerError> {
        if kind.is_credit() {
            return Err(LedgerError::invalid(format!(
                "{} cannot be used as a charge reason",
                kind.as_str()
            )));
        }
        Ok(Self {
            kind,
            description: description.into(),
        })
    }

    pub fn purchase(product: &ProductId) -> Self {
        Self {
            kind: TransactionKind::Purchase,
            description: format!("Purchase of product {product}"),
        }
    }

    pub fn subscription(plan: &SubscriptionPlan) -> Self {
        Self {
            kind: TransactionKind::Subscription,
            description: format!("Pro subscription ({} days)", plan.duration_days),
        }
    }

    pub fn withdrawal(description: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Withdrawal,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Rejects zero amounts and amounts that cannot be represented as a signed delta.
pub(crate) fn validate_amount(amount: u64) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::invalid("amount must be positive"));
    }
    if i64::try_from(amount).is_err() {
        return Err(LedgerError::invalid("amount exceeds ledger range"));
    }
    Ok(())
}
