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

//! Acquisition workflow.
//!
//! Every path runs as one unit holding the buyer's account lock and the
//! product lock (plus the request lock when resolving). All checks happen
//! before the wallet is debited; everything after the debit is infallible.

use crate::base::{AccountId, ProductId, RequestId};
use crate::engine::Engine;
use crate::notify::Notification;
use crate::purchase::{PurchaseRequest, RequestCell, Resolution};
use crate::transaction::ChargeReason;
use crate::LedgerError;
use std::sync::Arc;
use tracing::info;

const MAX_PROOF_REFERENCE_LEN: usize = 256;

impl Engine {
    /// Buys an approved product with wallet funds.
    ///
    /// Charges the price, records an approved request, and counts the sale,
    /// all or nothing.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidStateTransition`] - Product is not approved.
    /// - [`LedgerError::DuplicateAcquisition`] - The pair already has an active request.
    /// - [`LedgerError::InsufficientFunds`] - Balance below the price.
    /// - [`LedgerError::EntityNotFound`] - Unknown account or product.
    pub fn create_wallet_purchase(
        &self,
        account_id: &AccountId,
        product_id: &ProductId,
    ) -> Result<PurchaseRequest, LedgerError> {
        let account = self.account_entry(account_id)?;
        let product = self.product_entry(product_id)?;

        let (request, seller) = self.retry.run("wallet_purchase", |retry| {
            let mut buyer = retry.lock(&account.inner)?;
            let mut listing = retry.lock(&product.inner)?;

            listing.ensure_purchasable()?;
            buyer.ensure_no_active_request(product_id)?;

            let now = self.now();
            let charge = self.debit_locked(
                &mut buyer,
                listing.price,
                &ChargeReason::purchase(product_id),
                now,
            )?;
            let request = PurchaseRequest::wallet(account_id.clone(), *product_id, charge.id, now);
            buyer.open_request(*product_id, request.id);
            buyer.grant_ownership(*product_id);
            listing.record_sale();
            self.requests
                .insert(request.id, Arc::new(RequestCell::new(request.clone())));
            Ok((request, listing.owner().clone()))
        })?;

        info!(
            account = %account_id,
            product = %product_id,
            request = %request.id,
            "wallet purchase completed"
        );
        self.dispatch(
            account_id,
            Notification::PurchaseCompleted {
                request: request.id,
                product: *product_id,
            },
        );
        self.dispatch(
            &seller,
            Notification::ProductSold {
                product: *product_id,
                buyer: account_id.clone(),
            },
        );
        Ok(request)
    }

    /// Opens a pending request backed by an external payment proof.
    ///
    /// No funds move until an administrator approves it through
    /// [`Engine::resolve_purchase`].
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] - Blank or oversized proof reference.
    /// - [`LedgerError::InvalidStateTransition`] - Product is not approved.
    /// - [`LedgerError::DuplicateAcquisition`] - The pair already has an active request.
    /// - [`LedgerError::EntityNotFound`] - Unknown account or product.
    pub fn create_external_purchase(
        &self,
        account_id: &AccountId,
        product_id: &ProductId,
        proof_reference: &str,
    ) -> Result<PurchaseRequest, LedgerError> {
        let reference = proof_reference.trim();
        if reference.is_empty() {
            return Err(LedgerError::invalid("payment proof reference must not be blank"));
        }
        if reference.len() > MAX_PROOF_REFERENCE_LEN {
            return Err(LedgerError::invalid("payment proof reference is too long"));
        }
        let account = self.account_entry(account_id)?;
        let product = self.product_entry(product_id)?;

        let request = self.retry.run("external_purchase", |retry| {
            let mut buyer = retry.lock(&account.inner)?;
            let listing = retry.lock(&product.inner)?;

            listing.ensure_purchasable()?;
            buyer.ensure_no_active_request(product_id)?;

            let request =
                PurchaseRequest::external(account_id.clone(), *product_id, reference.to_string(), self.now());
            buyer.open_request(*product_id, request.id);
            self.requests
                .insert(request.id, Arc::new(RequestCell::new(request.clone())));
            Ok(request)
        })?;

        info!(
            account = %account_id,
            product = %product_id,
            request = %request.id,
            "external purchase awaiting review"
        );
        Ok(request)
    }

    /// Approves or rejects a pending request.
    ///
    /// Approval charges the buyer's wallet and grants ownership. Only wallet
    /// purchases count toward the product's sales. Rejection moves no funds
    /// and frees the pair for a new attempt.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidStateTransition`] - Request already resolved.
    /// - [`LedgerError::InsufficientFunds`] - Approval charge not covered; the
    ///   request stays pending.
    /// - [`LedgerError::EntityNotFound`] - Unknown request.
    pub fn resolve_purchase(
        &self,
        request_id: &RequestId,
        resolution: Resolution,
    ) -> Result<PurchaseRequest, LedgerError> {
        let cell = self.request_entry(request_id)?;
        let account = self.account_entry(&cell.account)?;
        let product = self.product_entry(&cell.product)?;

        let (request, seller) = self.retry.run("resolve_purchase", |retry| {
            let mut buyer = retry.lock(&account.inner)?;
            let listing = retry.lock(&product.inner)?;
            let mut request = retry.lock(&cell.inner)?;

            request.ensure_resolvable(resolution)?;
            let now = self.now();
            match resolution {
                Resolution::Approve => {
                    listing.ensure_purchasable()?;
                    let charge = self.debit_locked(
                        &mut buyer,
                        listing.price,
                        &ChargeReason::purchase(&cell.product),
                        now,
                    )?;
                    request.approve(charge.id, now);
                    buyer.grant_ownership(cell.product);
                }
                Resolution::Reject => {
                    buyer.close_request(&cell.product);
                    request.reject(now);
                }
            }
            Ok((request.clone(), listing.owner().clone()))
        })?;

        info!(
            request = %request_id,
            account = %request.account,
            status = request.status.as_str(),
            "purchase request resolved"
        );
        match resolution {
            Resolution::Approve => {
                self.dispatch(
                    &request.account,
                    Notification::PurchaseCompleted {
                        request: request.id,
                        product: request.product,
                    },
                );
                self.dispatch(
                    &seller,
                    Notification::ProductSold {
                        product: request.product,
                        buyer: request.account.clone(),
                    },
                );
            }
            Resolution::Reject => self.dispatch(
                &request.account,
                Notification::PurchaseRejected {
                    request: request.id,
                    product: request.product,
                },
            ),
        }
        Ok(request)
    }

    pub fn purchase_request(&self, request_id: &RequestId) -> Result<PurchaseRequest, LedgerError> {
        Ok(self.request_entry(request_id)?.snapshot())
    }

    /// Every request the account has made, oldest first.
    pub fn requests_for(&self, account_id: &AccountId) -> Result<Vec<PurchaseRequest>, LedgerError> {
        let ids = self.account_entry(account_id)?.purchase_requests();
        ids.iter()
            .map(|id| self.purchase_request(id))
            .collect()
    }

    /// Whether the account holds an approved request for the product.
    pub fn owns(&self, account_id: &AccountId, product_id: &ProductId) -> Result<bool, LedgerError> {
        Ok(self.account_entry(account_id)?.inner.lock().owns(product_id))
    }
}
