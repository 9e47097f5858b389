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

//! Account public API integration tests.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use storefront_ledger::{
    Account, AccountId, AccountIdentity, ChargeReason, Engine, EngineConfig, EngineContext, LedgerError,
    ListingDetails, ProductSubmission, SubscriptionPlan, TransactionKind,
};

// === Helper Functions ===

fn identity(uid: &str) -> AccountIdentity {
    AccountIdentity::new(uid, format!("User {uid}"), format!("{uid}@example.com"))
}

/// Generous lock timeout so heavily oversubscribed test runners never give up.
fn engine() -> Arc<Engine> {
    let config = EngineConfig {
        max_attempts: 32,
        lock_timeout_ms: 1_000,
        ..EngineConfig::default()
    };
    Arc::new(Engine::new(EngineContext::new(config)))
}

fn funded(engine: &Engine, uid: &str, amount: u64) -> AccountId {
    let id = engine.register_account(identity(uid)).unwrap();
    if amount > 0 {
        engine.deposit(&id, amount).unwrap();
    }
    id
}

fn course(price: u64) -> ProductSubmission {
    ProductSubmission::Course {
        details: ListingDetails {
            title: "Shader basics".into(),
            description: String::new(),
            price,
            category: "graphics".into(),
            preview_url: None,
        },
        lessons: vec!["Vertices".into(), "Fragments".into()],
    }
}

// === Account State Tests ===

#[test]
fn new_account_has_zero_balance() {
    let account = Account::new(identity("ada"));
    assert_eq!(account.id(), AccountId::new("ada"));
    assert_eq!(account.display_name(), "User ada");
    assert_eq!(account.email(), "ada@example.com");
    assert_eq!(account.avatar_url(), None);
    assert_eq!(account.balance(), 0);
    assert_eq!(account.reputation(), 0);
    assert!(!account.is_pro());
    assert!(account.pro_expiry().is_none());
    assert!(account.wishlist().is_empty());
    assert!(account.saved_filters().is_empty());
    assert!(account.transactions().is_empty());
    assert!(account.purchase_requests().is_empty());
    assert!(account.owned_products().is_empty());
}

#[test]
fn deposits_accumulate() {
    let engine = engine();
    let ada = funded(&engine, "ada", 100);
    engine.deposit(&ada, 50).unwrap();
    engine.deposit(&ada, 25).unwrap();

    let account = engine.get_account(&ada).unwrap();
    assert_eq!(account.balance(), 175);
    assert_eq!(account.transactions().len(), 3);
}

#[test]
fn withdraw_exact_balance_succeeds() {
    let engine = engine();
    let ada = funded(&engine, "ada", 100);

    engine.withdraw(&ada, 100).unwrap();

    assert_eq!(engine.balance(&ada).unwrap(), 0);
}

#[test]
fn journal_sums_to_balance() {
    let engine = engine();
    let ada = funded(&engine, "ada", 1_000);
    engine.withdraw(&ada, 120).unwrap();
    engine
        .charge(&ada, 80, ChargeReason::new(TransactionKind::Purchase, "manual").unwrap())
        .unwrap();
    let _ = engine.withdraw(&ada, 10_000);

    let account = engine.get_account(&ada).unwrap();
    let sum: i64 = account.transactions().iter().map(|r| r.amount).sum();
    assert_eq!(sum, account.balance() as i64);
    assert_eq!(account.balance(), 800);
}

#[test]
fn transactions_are_newest_first() {
    let engine = engine();
    let ada = funded(&engine, "ada", 10);
    engine.deposit(&ada, 20).unwrap();
    engine.withdraw(&ada, 5).unwrap();

    let amounts: Vec<i64> = engine
        .transactions(&ada)
        .unwrap()
        .iter()
        .map(|r| r.amount)
        .collect();
    assert_eq!(amounts, vec![-5, 20, 10]);
}

#[test]
fn owned_products_follow_purchases() {
    let engine = engine();
    let sam = funded(&engine, "sam", 0);
    let bea = funded(&engine, "bea", 1_000);
    let product = engine.submit_product(&sam, course(250)).unwrap();
    engine.approve_product(&product).unwrap();

    let request = engine.create_wallet_purchase(&bea, &product).unwrap();

    let account = engine.get_account(&bea).unwrap();
    assert_eq!(account.owned_products(), vec![product]);
    assert_eq!(account.purchase_requests(), vec![request.id]);
    assert!(engine.get_account(&sam).unwrap().owned_products().is_empty());
}

// === Serialization Tests ===

#[test]
fn serialized_balance_uses_major_units() {
    let engine = engine();
    let ada = funded(&engine, "ada", 123_456);

    let json = serde_json::to_value(engine.get_account(&ada).unwrap().as_ref()).unwrap();

    let balance: Decimal = json["balance"].as_str().unwrap().parse().unwrap();
    assert_eq!(balance, dec!(1234.56));
    assert_eq!(json["account"], "ada");
    assert_eq!(json["transactions"], 1);
}

#[test]
fn serialized_pro_state_includes_expiry() {
    let engine = engine();
    let ada = funded(&engine, "ada", 1_000);
    engine
        .upgrade_to_pro(&ada, &SubscriptionPlan::new(999, 365))
        .unwrap();

    let json = serde_json::to_value(engine.get_account(&ada).unwrap().as_ref()).unwrap();

    assert_eq!(json["pro"], true);
    assert!(json["pro_expiry"].is_string());
    let balance: Decimal = json["balance"].as_str().unwrap().parse().unwrap();
    assert_eq!(balance, dec!(0.01));
}

// === Multi-threading Tests ===

#[test]
fn concurrent_deposits_are_atomic() {
    let engine = engine();
    let ada = funded(&engine, "ada", 0);
    let mut handles = vec![];

    for _ in 0..100 {
        let engine = Arc::clone(&engine);
        let ada = ada.clone();
        handles.push(thread::spawn(move || {
            engine.deposit(&ada, 1).unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.balance(&ada).unwrap(), 100);
    assert_eq!(engine.transactions(&ada).unwrap().len(), 100);
}

#[test]
fn concurrent_mixed_operations_maintain_invariants() {
    let engine = engine();
    let ada = funded(&engine, "ada", 1_000);
    let mut handles = vec![];

    // 50 deposits and 50 withdrawals of 10
    for i in 0..100 {
        let engine = Arc::clone(&engine);
        let ada = ada.clone();
        handles.push(thread::spawn(move || {
            if i % 2 == 0 {
                engine.deposit(&ada, 10).unwrap();
            } else {
                engine.withdraw(&ada, 10).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let account = engine.get_account(&ada).unwrap();
    assert_eq!(account.balance(), 1_000);
    assert_eq!(account.transactions().len(), 101);
}

// === Race Condition Tests ===

#[test]
fn no_double_spend_race_condition() {
    for _ in 0..10 {
        let engine = engine();
        let ada = funded(&engine, "ada", 100);
        let successes = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let engine = Arc::clone(&engine);
            let ada = ada.clone();
            let successes = Arc::clone(&successes);
            handles.push(thread::spawn(move || match engine.withdraw(&ada, 100) {
                Ok(_) => {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => assert!(matches!(e, LedgerError::InsufficientFunds { .. })),
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let count = successes.load(Ordering::SeqCst);
        assert_eq!(count, 1, "Expected exactly 1 successful withdrawal, got {}", count);
        assert_eq!(engine.balance(&ada).unwrap(), 0);
    }
}

#[test]
fn balance_never_goes_negative() {
    for _ in 0..10 {
        let engine = engine();
        let ada = funded(&engine, "ada", 50);
        let mut handles = vec![];

        for _ in 0..20 {
            let engine = Arc::clone(&engine);
            let ada = ada.clone();
            handles.push(thread::spawn(move || {
                let _ = engine.withdraw(&ada, 10);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.balance(&ada).unwrap(), 0);
        assert_eq!(engine.transactions(&ada).unwrap().len(), 6);
    }
}
