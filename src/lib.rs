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

//! # Storefront Ledger
//!
//! Transactional core of a digital-goods storefront: wallet ledger, product
//! moderation, purchase requests, Pro subscriptions, and per-account profile
//! state, all behind one thread-safe [`Engine`].
//!
//! ## Core Components
//!
//! - [`Engine`]: Owns every account, product, and purchase request
//! - [`Account`]: Wallet balance, journal, and profile state of one user
//! - [`TransactionRecord`]: Immutable journal entry for one balance change
//! - [`LedgerError`]: Error types for rejected operations
//! - [`Command`]: Serializable form of every mutating operation
//!
//! ## Example
//!
//! ```
//! use storefront_ledger::{
//!     AccountId, AccountIdentity, Engine, ListingDetails, ProductSubmission, RequestStatus,
//! };
//!
//! let engine = Engine::default();
//! let seller = engine.register_account(AccountIdentity::new("sam", "Sam", "sam@example.com")).unwrap();
//! let buyer = engine.register_account(AccountIdentity::new("bea", "Bea", "bea@example.com")).unwrap();
//!
//! let product = engine
//!     .submit_product(
//!         &seller,
//!         ProductSubmission::Download {
//!             details: ListingDetails {
//!                 title: "Icon pack".into(),
//!                 description: "120 SVG icons".into(),
//!                 price: 300,
//!                 category: "design".into(),
//!                 preview_url: None,
//!             },
//!             file_url: "https://cdn.example.com/icons.zip".into(),
//!             file_size_bytes: 4_096,
//!         },
//!     )
//!     .unwrap();
//! engine.approve_product(&product).unwrap();
//!
//! engine.deposit(&buyer, 1_000).unwrap();
//! let request = engine.create_wallet_purchase(&buyer, &product).unwrap();
//!
//! assert_eq!(request.status, RequestStatus::Approved);
//! assert_eq!(engine.balance(&buyer).unwrap(), 700);
//! assert_eq!(engine.product(&product).unwrap().sales_count, 1);
//! assert!(engine.owns(&AccountId::new("bea"), &product).unwrap());
//! ```
//!
//! ## Thread Safety
//!
//! Every operation runs as an atomic unit over per-entity locks taken in a
//! fixed order, so units touching different accounts proceed in parallel.

pub mod account;
mod acquisition;
mod base;
mod catalog;
mod clock;
mod command;
mod config;
mod engine;
pub mod error;
mod identity;
mod moderation;
mod notify;
mod product;
mod profile;
mod purchase;
mod subscription;
mod transaction;
mod transaction_log;
mod unit;

pub use account::{Account, FilterSpec, SavedFilter};
pub use base::{AccountId, FilterId, ProductId, RequestId, TransactionId};
pub use catalog::{CatalogStore, InMemoryCatalog, Listing, ListingDetails, ProductSubmission};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, Outcome};
pub use config::{ConfigError, EngineConfig, SubscriptionPlan};
pub use engine::{Engine, EngineContext};
pub use error::{Entity, LedgerError};
pub use identity::{AccountIdentity, IdentityGateway, IdentityListener, SessionGateway};
pub use notify::{LogNotifier, Notification, Notifier, NotifyError};
pub use product::{ModerationState, Product, ProductSnapshot, Review};
pub use purchase::{PaymentMethod, PurchaseRequest, RequestStatus, Resolution};
pub use subscription::ProSubscription;
pub use transaction::{ChargeReason, TransactionKind, TransactionRecord};
pub use transaction_log::TransactionLog;
