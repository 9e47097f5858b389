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

//! Product submission and moderation.

use crate::base::{AccountId, ProductId};
use crate::catalog::{Listing, ProductSubmission};
use crate::engine::Engine;
use crate::notify::Notification;
use crate::product::{ModerationState, Product, ProductSnapshot, Review};
use crate::LedgerError;
use std::sync::Arc;
use tracing::{debug, info};

impl Engine {
    /// Validates a submission, stores its listing, and creates a pending product.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] - Malformed submission; nothing is stored.
    /// - [`LedgerError::EntityNotFound`] - Unknown owner.
    pub fn submit_product(
        &self,
        owner: &AccountId,
        submission: ProductSubmission,
    ) -> Result<ProductId, LedgerError> {
        submission.validate()?;
        self.account_entry(owner)?;

        let id = ProductId::new();
        let now = self.now();
        let price = submission.price();
        let kind = submission.kind();
        self.catalog.insert(Listing {
            id,
            owner: owner.clone(),
            submission,
            created_at: now,
        })?;
        self.products
            .insert(id, Arc::new(Product::new(id, owner.clone(), price, now)));

        info!(product = %id, %owner, kind, price, "product submitted for moderation");
        Ok(id)
    }

    /// # Errors
    ///
    /// [`LedgerError::InvalidStateTransition`] unless the product is pending.
    pub fn approve_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, LedgerError> {
        self.moderate(product_id, ModerationState::Approved)
    }

    /// # Errors
    ///
    /// [`LedgerError::InvalidStateTransition`] unless the product is pending.
    pub fn reject_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, LedgerError> {
        self.moderate(product_id, ModerationState::Rejected)
    }

    fn moderate(&self, product_id: &ProductId, to: ModerationState) -> Result<ProductSnapshot, LedgerError> {
        let product = self.product_entry(product_id)?;
        let owner = self.retry.run("moderate", |retry| {
            let mut data = retry.lock(&product.inner)?;
            data.transition(to, self.now())?;
            Ok(data.owner().clone())
        })?;

        info!(product = %product_id, state = to.as_str(), "product moderated");
        let notification = match to {
            ModerationState::Approved => Notification::ProductApproved { product: *product_id },
            _ => Notification::ProductRejected { product: *product_id },
        };
        self.dispatch(&owner, notification);
        Ok(product.snapshot())
    }

    /// Returns the new view count.
    pub fn record_view(&self, product_id: &ProductId) -> Result<u64, LedgerError> {
        let views = self.product_entry(product_id)?.record_view();
        debug!(product = %product_id, views, "view recorded");
        Ok(views)
    }

    /// Returns the new download count.
    pub fn record_download(&self, product_id: &ProductId) -> Result<u64, LedgerError> {
        let downloads = self.product_entry(product_id)?.record_download();
        debug!(product = %product_id, downloads, "download recorded");
        Ok(downloads)
    }

    /// Adds a 1–5 star review from an account that acquired the product.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] - Bad rating, reviewer does not own the
    ///   product, or already reviewed it.
    /// - [`LedgerError::InvalidStateTransition`] - Product is not approved.
    pub fn add_review(
        &self,
        product_id: &ProductId,
        reviewer: &AccountId,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<ProductSnapshot, LedgerError> {
        let comment = comment.into();
        let account = self.account_entry(reviewer)?;
        let product = self.product_entry(product_id)?;

        self.retry.run("review", |retry| {
            let author = retry.lock(&account.inner)?;
            let mut listing = retry.lock(&product.inner)?;
            if !author.owns(product_id) {
                return Err(LedgerError::invalid("only buyers of a product can review it").into());
            }
            listing.add_review(Review {
                author: reviewer.clone(),
                rating,
                comment: comment.clone(),
                created_at: self.now(),
            })?;
            Ok(())
        })?;

        info!(product = %product_id, %reviewer, rating, "review added");
        Ok(product.snapshot())
    }

    pub fn product(&self, product_id: &ProductId) -> Result<ProductSnapshot, LedgerError> {
        Ok(self.product_entry(product_id)?.snapshot())
    }

    /// Snapshots of every product, oldest submission first.
    pub fn products(&self) -> Vec<ProductSnapshot> {
        let products: Vec<Arc<Product>> = self
            .products
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut snapshots: Vec<ProductSnapshot> = products.iter().map(|p| p.snapshot()).collect();
        snapshots.sort_by_key(|snapshot| snapshot.submitted_at);
        snapshots
    }
}
