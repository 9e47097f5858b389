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

//! Pro subscription upgrades.

use crate::base::AccountId;
use crate::config::SubscriptionPlan;
use crate::engine::Engine;
use crate::notify::Notification;
use crate::transaction::{ChargeReason, TransactionRecord};
use crate::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Result of a successful upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProSubscription {
    pub account: AccountId,
    pub expires_at: DateTime<Utc>,
    /// The fee charge.
    pub transaction: TransactionRecord,
}

impl Engine {
    /// Charges the plan fee and activates Pro until `now + duration`, as one unit.
    ///
    /// Upgrading an active account restarts the period from now.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientFunds`] - Fee not covered; Pro state is untouched.
    /// - [`LedgerError::Validation`] - Zero fee or duration.
    /// - [`LedgerError::EntityNotFound`] - Unknown account.
    pub fn upgrade_to_pro(
        &self,
        account_id: &AccountId,
        plan: &SubscriptionPlan,
    ) -> Result<ProSubscription, LedgerError> {
        plan.validate()?;
        let account = self.account_entry(account_id)?;

        let (record, expires_at) = self.retry.run("upgrade_to_pro", |retry| {
            let mut data = retry.lock(&account.inner)?;
            let now = self.now();
            let expires_at = now
                .checked_add_signed(plan.duration())
                .ok_or_else(|| LedgerError::invalid("subscription expiry out of range"))?;
            let record = self.debit_locked(&mut data, plan.fee, &ChargeReason::subscription(plan), now)?;
            data.activate_pro(expires_at);
            Ok((record, expires_at))
        })?;

        info!(account = %account_id, fee = plan.fee, %expires_at, "pro subscription activated");
        self.dispatch(account_id, Notification::ProActivated { expires_at });
        Ok(ProSubscription {
            account: account_id.clone(),
            expires_at,
            transaction: record.as_ref().clone(),
        })
    }

    /// Upgrades with the configured plan.
    pub fn upgrade_with_default_plan(&self, account_id: &AccountId) -> Result<ProSubscription, LedgerError> {
        let plan = self.config.subscription;
        self.upgrade_to_pro(account_id, &plan)
    }

    /// Whether the account is Pro and its expiry has not passed.
    pub fn is_pro_active(&self, account_id: &AccountId) -> Result<bool, LedgerError> {
        Ok(self.account_entry(account_id)?.pro_active_at(self.now()))
    }
}
