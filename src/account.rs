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

//! Account management.
//!
//! An [`Account`] exposes read-only views. Every mutation goes through the
//! engine, which holds the account lock for the whole atomic unit so that the
//! balance, the journal, the wishlist, and the filter list change together.
//!
//! # Example
//!
//! ```
//! use storefront_ledger::{Account, AccountIdentity};
//!
//! let account = Account::new(AccountIdentity::new("uid-1", "Ada", "ada@example.com"));
//! assert_eq!(account.balance(), 0);
//! assert!(!account.is_pro());
//! ```

use crate::LedgerError;
use crate::base::{AccountId, FilterId, ProductId, RequestId, TransactionId};
use crate::error::Entity;
use crate::identity::AccountIdentity;
use crate::transaction::{ChargeReason, TransactionKind, TransactionRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Search criteria a user saved for later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_price: Option<u64>,
    #[serde(default)]
    pub max_price: Option<u64>,
}

impl FilterSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            category: None,
            min_price: None,
            max_price: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::invalid("filter name must not be blank"));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(LedgerError::invalid("filter min_price exceeds max_price"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: FilterId,
    pub spec: FilterSpec,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct AccountData {
    pub(crate) id: AccountId,
    display_name: String,
    email: String,
    avatar_url: Option<String>,
    /// Minor currency units.
    balance: u64,
    reputation: i64,
    is_pro: bool,
    pro_expiry: Option<DateTime<Utc>>,
    wishlist: BTreeSet<ProductId>,
    saved_filters: Vec<SavedFilter>,
    /// Every balance change of this account, in the order it was applied.
    journal: Vec<Arc<TransactionRecord>>,
    /// Pending or approved purchase request per product.
    active_requests: HashMap<ProductId, RequestId>,
    /// Every request ever created by this account, oldest first.
    requests: Vec<RequestId>,
    /// Products acquired through an approved request.
    owned: BTreeSet<ProductId>,
}

impl AccountData {
    fn new(identity: AccountIdentity) -> Self {
        Self {
            id: identity.uid,
            display_name: identity.display_name,
            email: identity.email,
            avatar_url: identity.avatar_url,
            balance: 0,
            reputation: 0,
            is_pro: false,
            pro_expiry: None,
            wishlist: BTreeSet::new(),
            saved_filters: Vec::new(),
            journal: Vec::new(),
            active_requests: HashMap::new(),
            requests: Vec::new(),
            owned: BTreeSet::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.journal.iter().map(|record| i128::from(record.amount)).sum::<i128>(),
            i128::from(self.balance),
            "Invariant violated: journal does not sum to balance for {}",
            self.id
        );
    }

    pub(crate) fn balance(&self) -> u64 {
        self.balance
    }

    /// Increases the balance and journals a deposit.
    pub(crate) fn credit(
        &mut self,
        amount: u64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<TransactionRecord>, LedgerError> {
        let delta = i64::try_from(amount).map_err(|_| LedgerError::invalid("amount exceeds ledger range"))?;
        if delta <= 0 {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        let balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| i64::try_from(*balance).is_ok())
            .ok_or_else(|| LedgerError::invalid("balance would overflow"))?;

        let record = self.journal_record(delta, TransactionKind::Deposit, description, now);
        self.balance = balance;
        self.journal.push(Arc::clone(&record));
        self.assert_invariants();
        Ok(record)
    }

    /// Decreases the balance and journals the charge.
    ///
    /// Nothing changes unless the balance covers `amount`.
    pub(crate) fn debit(
        &mut self,
        amount: u64,
        reason: &ChargeReason,
        now: DateTime<Utc>,
    ) -> Result<Arc<TransactionRecord>, LedgerError> {
        let delta = i64::try_from(amount).map_err(|_| LedgerError::invalid("amount exceeds ledger range"))?;
        if delta <= 0 {
            return Err(LedgerError::invalid("amount must be positive"));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                required: amount,
            });
        }

        let record = self.journal_record(-delta, reason.kind(), reason.description(), now);
        self.balance -= amount;
        self.journal.push(Arc::clone(&record));
        self.assert_invariants();
        Ok(record)
    }

    fn journal_record(
        &self,
        amount: i64,
        kind: TransactionKind,
        description: &str,
        now: DateTime<Utc>,
    ) -> Arc<TransactionRecord> {
        Arc::new(TransactionRecord {
            id: TransactionId::new(),
            account: self.id.clone(),
            amount,
            kind,
            description: description.to_string(),
            created_at: now,
        })
    }

    /// Fails with [`LedgerError::DuplicateAcquisition`] if a pending or
    /// approved request already covers `product`.
    pub(crate) fn ensure_no_active_request(&self, product: &ProductId) -> Result<(), LedgerError> {
        if self.active_requests.contains_key(product) {
            return Err(LedgerError::DuplicateAcquisition {
                account: self.id.clone(),
                product: *product,
            });
        }
        Ok(())
    }

    pub(crate) fn open_request(&mut self, product: ProductId, request: RequestId) {
        self.active_requests.insert(product, request);
        self.requests.push(request);
    }

    /// Frees the pair after a rejection.
    pub(crate) fn close_request(&mut self, product: &ProductId) {
        self.active_requests.remove(product);
    }

    pub(crate) fn grant_ownership(&mut self, product: ProductId) {
        self.owned.insert(product);
    }

    pub(crate) fn owns(&self, product: &ProductId) -> bool {
        self.owned.contains(product)
    }

    pub(crate) fn activate_pro(&mut self, until: DateTime<Utc>) {
        self.is_pro = true;
        self.pro_expiry = Some(until);
    }

    /// Pro with an expiry still in the future.
    pub(crate) fn is_pro_active(&self, now: DateTime<Utc>) -> bool {
        self.is_pro && self.pro_expiry.is_some_and(|expiry| expiry > now)
    }

    /// Adds or removes `product`; returns whether it is now wishlisted.
    pub(crate) fn toggle_wishlist(&mut self, product: ProductId) -> bool {
        if self.wishlist.remove(&product) {
            false
        } else {
            self.wishlist.insert(product);
            true
        }
    }

    pub(crate) fn save_filter(&mut self, spec: FilterSpec, now: DateTime<Utc>) -> SavedFilter {
        let filter = SavedFilter {
            id: FilterId::new(),
            spec,
            created_at: now,
        };
        self.saved_filters.push(filter.clone());
        filter
    }

    pub(crate) fn delete_filter(&mut self, id: &FilterId) -> Result<SavedFilter, LedgerError> {
        let position = self
            .saved_filters
            .iter()
            .position(|filter| filter.id == *id)
            .ok_or(LedgerError::EntityNotFound(Entity::SavedFilter))?;
        Ok(self.saved_filters.remove(position))
    }
}

/// Ledger account.
#[derive(Debug)]
pub struct Account {
    pub(crate) inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(identity: AccountIdentity) -> Self {
        Self {
            inner: Mutex::new(AccountData::new(identity)),
        }
    }

    pub fn id(&self) -> AccountId {
        self.inner.lock().id.clone()
    }

    pub fn display_name(&self) -> String {
        self.inner.lock().display_name.clone()
    }

    pub fn email(&self) -> String {
        self.inner.lock().email.clone()
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.inner.lock().avatar_url.clone()
    }

    /// Current balance in minor units.
    pub fn balance(&self) -> u64 {
        self.inner.lock().balance
    }

    pub fn reputation(&self) -> i64 {
        self.inner.lock().reputation
    }

    pub fn is_pro(&self) -> bool {
        self.inner.lock().is_pro
    }

    pub fn pro_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().pro_expiry
    }

    /// Whether the Pro period covers `now`.
    pub fn pro_active_at(&self, now: DateTime<Utc>) -> bool {
        self.inner.lock().is_pro_active(now)
    }

    pub fn wishlist(&self) -> Vec<ProductId> {
        self.inner.lock().wishlist.iter().copied().collect()
    }

    pub fn saved_filters(&self) -> Vec<SavedFilter> {
        self.inner.lock().saved_filters.clone()
    }

    /// The account's records, newest first.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner
            .lock()
            .journal
            .iter()
            .rev()
            .map(|record| record.as_ref().clone())
            .collect()
    }

    pub fn purchase_requests(&self) -> Vec<RequestId> {
        self.inner.lock().requests.clone()
    }

    pub fn owned_products(&self) -> Vec<ProductId> {
        self.inner.lock().owned.iter().copied().collect()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let balance = Decimal::new(i64::try_from(data.balance).unwrap_or(i64::MAX), Account::DECIMAL_PRECISION);
        let mut state = serializer.serialize_struct("Account", 7)?;
        state.serialize_field("account", &data.id)?;
        state.serialize_field("display_name", &data.display_name)?;
        state.serialize_field("balance", &balance)?;
        state.serialize_field("transactions", &data.journal.len())?;
        state.serialize_field("pro", &data.is_pro)?;
        state.serialize_field("pro_expiry", &data.pro_expiry)?;
        state.serialize_field("wishlist", &data.wishlist.len())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn data() -> AccountData {
        AccountData::new(AccountIdentity::new("alice", "Alice", "alice@example.com"))
    }

    // === AccountData Internal Tests ===

    #[test]
    fn credit_then_debit_journals_both() {
        let mut data = data();
        let now = Utc::now();
        data.credit(500, "top-up", now).unwrap();
        let charge = data
            .debit(500, &ChargeReason::withdrawal("x"), now)
            .unwrap();

        assert_eq!(data.balance, 0);
        assert_eq!(charge.amount, -500);
        assert_eq!(charge.kind, TransactionKind::Withdrawal);
        assert_eq!(data.journal.len(), 2);
        assert_eq!(data.journal.iter().map(|r| r.amount).sum::<i64>(), 0);
    }

    #[test]
    fn debit_insufficient_has_no_effect() {
        let mut data = data();
        data.credit(100, "top-up", Utc::now()).unwrap();
        let result = data.debit(101, &ChargeReason::withdrawal("x"), Utc::now());
        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                available: 100,
                required: 101
            })
        );
        assert_eq!(data.balance, 100);
        assert_eq!(data.journal.len(), 1);
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let mut data = data();
        assert!(data.credit(0, "nothing", Utc::now()).is_err());
        assert!(data.debit(0, &ChargeReason::withdrawal("x"), Utc::now()).is_err());
        assert!(data.journal.is_empty());
    }

    #[test]
    fn credit_overflow_is_rejected() {
        let mut data = data();
        data.credit(i64::MAX as u64, "max", Utc::now()).unwrap();
        let result = data.credit(1, "one more", Utc::now());
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(data.balance, i64::MAX as u64);
    }

    #[test]
    fn pro_expires_with_the_clock() {
        let mut data = data();
        let now = Utc::now();
        assert!(!data.is_pro_active(now));
        data.activate_pro(now + chrono::Duration::days(1));
        assert!(data.is_pro_active(now));
        assert!(!data.is_pro_active(now + chrono::Duration::days(2)));
    }

    #[test]
    fn wishlist_toggle_is_an_involution() {
        let mut data = data();
        let product = ProductId::new();
        assert!(data.toggle_wishlist(product));
        assert!(!data.toggle_wishlist(product));
        assert!(data.wishlist.is_empty());
    }

    #[test]
    fn filters_keep_insertion_order_and_unique_ids() {
        let mut data = data();
        let first = data.save_filter(FilterSpec::named("cheap"), Utc::now());
        let second = data.save_filter(FilterSpec::named("cheap"), Utc::now());
        assert_ne!(first.id, second.id);
        assert_eq!(data.saved_filters, vec![first.clone(), second.clone()]);

        assert_eq!(data.delete_filter(&first.id).unwrap(), first);
        assert_eq!(data.saved_filters, vec![second]);
        assert_eq!(
            data.delete_filter(&first.id),
            Err(LedgerError::EntityNotFound(Entity::SavedFilter))
        );
    }

    #[test]
    fn filter_spec_validation() {
        assert!(FilterSpec::named("ok").validate().is_ok());
        assert!(FilterSpec::named("  ").validate().is_err());
        let inverted = FilterSpec {
            min_price: Some(10),
            max_price: Some(5),
            ..FilterSpec::named("range")
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn active_request_blocks_duplicates_until_closed() {
        let mut data = data();
        let product = ProductId::new();
        data.open_request(product, RequestId::new());
        assert!(matches!(
            data.ensure_no_active_request(&product),
            Err(LedgerError::DuplicateAcquisition { .. })
        ));
        data.close_request(&product);
        assert!(data.ensure_no_active_request(&product).is_ok());
        assert_eq!(data.requests.len(), 1);
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_renders_minor_units_as_major() {
        let account = Account::new(AccountIdentity::new("alice", "Alice", "a@example.com"));
        account
            .inner
            .lock()
            .credit(123_456, "top-up", Utc::now())
            .unwrap();

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["account"], "alice");
        assert_eq!(parsed["balance"].as_str().unwrap(), "1234.56");
        assert_eq!(parsed["transactions"], 1);
        assert_eq!(parsed["pro"], false);
        assert!(parsed["pro_expiry"].is_null());
    }

    #[test]
    fn serializer_keeps_two_decimal_places() {
        let account = Account::new(AccountIdentity::new("bob", "Bob", "b@example.com"));
        account.inner.lock().credit(5, "cents", Utc::now()).unwrap();
        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        let balance: Decimal = parsed["balance"].as_str().unwrap().parse().unwrap();
        assert_eq!(balance, dec!(0.05));
    }
}
