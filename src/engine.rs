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

//! Ledger engine.
//!
//! The [`Engine`] owns every account, product, and purchase request, and is
//! the only way to mutate them. This module holds the registries, account
//! bootstrap, and the ledger operations. Moderation, acquisition,
//! subscriptions, and profile mutators live in sibling modules as further
//! `impl Engine` blocks.
//!
//! # Thread Safety
//!
//! Entities are stored as `Arc`s in [`DashMap`]s. A map guard is never held
//! while an entity lock is taken: the `Arc` is cloned out first. Entity locks
//! are always taken in the order account → product → purchase request, so
//! operations on different accounts run fully in parallel and multi-entity
//! units cannot deadlock.

use crate::account::{Account, AccountData};
use crate::base::{AccountId, ProductId, RequestId, TransactionId};
use crate::catalog::{CatalogStore, InMemoryCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::Entity;
use crate::identity::{AccountIdentity, IdentityGateway};
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::product::Product;
use crate::purchase::RequestCell;
use crate::transaction::{ChargeReason, TransactionRecord, validate_amount};
use crate::transaction_log::TransactionLog;
use crate::unit::RetryPolicy;
use crate::LedgerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings and collaborators an [`Engine`] is built from.
pub struct EngineContext {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<dyn CatalogStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl EngineContext {
    /// Wall clock, in-memory catalog, and log-only notifications.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            catalog: Arc::new(InMemoryCatalog::new()),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Storefront ledger and acquisition engine.
///
/// # Invariants
///
/// - An account balance never goes negative.
/// - Every balance change has exactly one [`TransactionRecord`] with the same
///   signed delta, journaled under the same lock as the change.
/// - At most one pending or approved purchase request exists per
///   (account, product) pair.
/// - A product's sales count grows by one per approved wallet purchase and never
///   otherwise.
/// - Moderation leaves `pending` exactly once.
pub struct Engine {
    pub(crate) accounts: DashMap<AccountId, Arc<Account>>,
    pub(crate) products: DashMap<ProductId, Arc<Product>>,
    pub(crate) requests: DashMap<RequestId, Arc<RequestCell>>,
    pub(crate) transactions: TransactionLog,
    pub(crate) retry: RetryPolicy,
    pub(crate) config: EngineConfig,
    pub(crate) catalog: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(context: EngineContext) -> Self {
        Engine {
            accounts: DashMap::new(),
            products: DashMap::new(),
            requests: DashMap::new(),
            transactions: TransactionLog::new(),
            retry: RetryPolicy::from_config(&context.config),
            config: context.config,
            catalog: context.catalog,
            clock: context.clock,
            notifier: context.notifier,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    pub fn transaction_log(&self) -> &TransactionLog {
        &self.transactions
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn account_entry(&self, id: &AccountId) -> Result<Arc<Account>, LedgerError> {
        self.accounts
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::EntityNotFound(Entity::Account))
    }

    pub(crate) fn product_entry(&self, id: &ProductId) -> Result<Arc<Product>, LedgerError> {
        self.products
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::EntityNotFound(Entity::Product))
    }

    pub(crate) fn request_entry(&self, id: &RequestId) -> Result<Arc<RequestCell>, LedgerError> {
        self.requests
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::EntityNotFound(Entity::PurchaseRequest))
    }

    /// Best-effort delivery; failures are logged and swallowed.
    pub(crate) fn dispatch(&self, recipient: &AccountId, notification: Notification) {
        if let Err(error) = self.notifier.notify(recipient, &notification) {
            warn!(%recipient, %error, "notification dropped");
        }
    }

    /// Debits a locked account and appends the record to the global log.
    ///
    /// Callers must have finished every fallible check of their unit first:
    /// after this returns `Ok` the unit may only perform infallible steps.
    pub(crate) fn debit_locked(
        &self,
        data: &mut AccountData,
        amount: u64,
        reason: &ChargeReason,
        now: DateTime<Utc>,
    ) -> Result<Arc<TransactionRecord>, LedgerError> {
        let record = data.debit(amount, reason, now)?;
        let appended = self.transactions.append(Arc::clone(&record));
        debug_assert!(appended, "transaction ids are unique");
        Ok(record)
    }

    // === Accounts ===

    /// Registers a new account.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] if the identity is malformed or the uid is
    /// already registered.
    pub fn register_account(&self, identity: AccountIdentity) -> Result<AccountId, LedgerError> {
        identity.validate()?;
        let id = identity.uid.clone();
        match self.accounts.entry(id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::invalid(format!("account {id} is already registered"))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Account::new(identity)));
                info!(account = %id, "account registered");
                Ok(id)
            }
        }
    }

    /// Creates the account on first sight of an identity; a no-op afterwards.
    pub fn sync_identity(&self, identity: AccountIdentity) -> Result<AccountId, LedgerError> {
        identity.validate()?;
        let id = identity.uid.clone();
        let mut created = false;
        self.accounts.entry(id.clone()).or_insert_with(|| {
            created = true;
            Arc::new(Account::new(identity))
        });
        if created {
            info!(account = %id, "account bootstrapped from identity gateway");
        }
        Ok(id)
    }

    /// Identity-change listener entry point.
    pub fn on_identity_change(&self, identity: Option<&AccountIdentity>) {
        match identity {
            Some(identity) => {
                if let Err(error) = self.sync_identity(identity.clone()) {
                    warn!(uid = %identity.uid, %error, "identity sync rejected");
                }
            }
            None => debug!("caller signed out"),
        }
    }

    /// Subscribes this engine to a gateway's identity changes.
    ///
    /// The gateway keeps the subscription; it holds only a weak handle.
    pub fn bind_identity(self: &Arc<Self>, gateway: &dyn IdentityGateway) {
        let engine = Arc::downgrade(self);
        gateway.subscribe(Box::new(move |identity| {
            if let Some(engine) = engine.upgrade() {
                engine.on_identity_change(identity);
            }
        }));
    }

    /// Retrieves an account by id.
    pub fn get_account(&self, id: &AccountId) -> Option<Arc<Account>> {
        self.account_entry(id).ok()
    }

    /// All accounts, ordered by id.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }

    // === Ledger ===

    /// Credits `amount` and journals a deposit, as one unit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] - Zero or out-of-range amount.
    /// - [`LedgerError::EntityNotFound`] - Unknown account.
    pub fn deposit(&self, account_id: &AccountId, amount: u64) -> Result<TransactionRecord, LedgerError> {
        validate_amount(amount)?;
        let account = self.account_entry(account_id)?;

        let (record, balance) = self.retry.run("deposit", |retry| {
            let mut data = retry.lock(&account.inner)?;
            let record = data.credit(amount, "Wallet deposit", self.now())?;
            let appended = self.transactions.append(Arc::clone(&record));
            debug_assert!(appended, "transaction ids are unique");
            Ok((record, data.balance()))
        })?;

        info!(account = %account_id, amount, balance, transaction = %record.id, "deposit applied");
        self.dispatch(account_id, Notification::DepositReceived { amount, balance });
        Ok(record.as_ref().clone())
    }

    /// Debits `amount` if the balance covers it, as one unit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientFunds`] - Balance below `amount`; nothing changes.
    /// - [`LedgerError::Validation`] - Zero or out-of-range amount.
    /// - [`LedgerError::EntityNotFound`] - Unknown account.
    pub fn charge(
        &self,
        account_id: &AccountId,
        amount: u64,
        reason: ChargeReason,
    ) -> Result<TransactionRecord, LedgerError> {
        validate_amount(amount)?;
        let account = self.account_entry(account_id)?;

        let record = self.retry.run("charge", |retry| {
            let mut data = retry.lock(&account.inner)?;
            Ok(self.debit_locked(&mut data, amount, &reason, self.now())?)
        })?;

        info!(
            account = %account_id,
            amount,
            kind = record.kind.as_str(),
            transaction = %record.id,
            "charge applied"
        );
        Ok(record.as_ref().clone())
    }

    /// Moves funds out of the wallet.
    pub fn withdraw(&self, account_id: &AccountId, amount: u64) -> Result<TransactionRecord, LedgerError> {
        self.charge(account_id, amount, ChargeReason::withdrawal("Wallet withdrawal"))
    }

    /// Current balance snapshot.
    pub fn balance(&self, account_id: &AccountId) -> Result<u64, LedgerError> {
        Ok(self.account_entry(account_id)?.balance())
    }

    /// The account's records, newest first.
    pub fn transactions(&self, account_id: &AccountId) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.account_entry(account_id)?.transactions())
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.transactions.get(id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineContext::default())
    }
}
