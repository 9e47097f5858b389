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

//! Wishlist and saved filters.

use crate::account::{FilterSpec, SavedFilter};
use crate::base::{AccountId, FilterId, ProductId};
use crate::engine::Engine;
use crate::LedgerError;
use tracing::{debug, info};

impl Engine {
    /// Adds the product to the wishlist, or removes it if present.
    ///
    /// Returns `true` when the product is wishlisted afterwards.
    pub fn toggle_wishlist(&self, account_id: &AccountId, product_id: &ProductId) -> Result<bool, LedgerError> {
        let account = self.account_entry(account_id)?;
        self.product_entry(product_id)?;

        let present = self.retry.run("toggle_wishlist", |retry| {
            let mut data = retry.lock(&account.inner)?;
            Ok(data.toggle_wishlist(*product_id))
        })?;

        debug!(account = %account_id, product = %product_id, present, "wishlist toggled");
        Ok(present)
    }

    /// # Errors
    ///
    /// [`LedgerError::Validation`] for a blank name or inverted price range.
    pub fn save_filter(&self, account_id: &AccountId, spec: FilterSpec) -> Result<FilterId, LedgerError> {
        spec.validate()?;
        let account = self.account_entry(account_id)?;

        let filter = self.retry.run("save_filter", |retry| {
            let mut data = retry.lock(&account.inner)?;
            Ok(data.save_filter(spec.clone(), self.now()))
        })?;

        info!(account = %account_id, filter = %filter.id, name = %filter.spec.name, "filter saved");
        Ok(filter.id)
    }

    /// Removes a saved filter and returns it.
    pub fn delete_filter(&self, account_id: &AccountId, filter_id: &FilterId) -> Result<SavedFilter, LedgerError> {
        let account = self.account_entry(account_id)?;
        let removed = self.retry.run("delete_filter", |retry| {
            let mut data = retry.lock(&account.inner)?;
            Ok(data.delete_filter(filter_id)?)
        })?;

        info!(account = %account_id, filter = %filter_id, "filter deleted");
        Ok(removed)
    }

    pub fn wishlist(&self, account_id: &AccountId) -> Result<Vec<ProductId>, LedgerError> {
        Ok(self.account_entry(account_id)?.wishlist())
    }

    /// Saved filters in the order they were created.
    pub fn saved_filters(&self, account_id: &AccountId) -> Result<Vec<SavedFilter>, LedgerError> {
        Ok(self.account_entry(account_id)?.saved_filters())
    }
}
