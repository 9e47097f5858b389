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

//! Serializable engine commands.
//!
//! The CLI script runner and the HTTP demo both drive the engine through
//! [`Command`]s, one JSON object per operation:
//!
//! ```
//! use storefront_ledger::{Command, Engine, Outcome};
//!
//! let engine = Engine::default();
//! let register: Command = serde_json::from_str(
//!     r#"{"op":"register","identity":{"uid":"ada","display_name":"Ada","email":"ada@example.com"}}"#,
//! )
//! .unwrap();
//! engine.execute(register).unwrap();
//!
//! let deposit: Command = serde_json::from_str(r#"{"op":"deposit","account":"ada","amount":1000}"#).unwrap();
//! let Outcome::Transaction { transaction } = engine.execute(deposit).unwrap() else {
//!     panic!("deposit yields a transaction");
//! };
//! assert_eq!(transaction.amount, 1000);
//! ```

use crate::account::{FilterSpec, SavedFilter};
use crate::base::{AccountId, FilterId, ProductId, RequestId};
use crate::catalog::ProductSubmission;
use crate::config::SubscriptionPlan;
use crate::engine::Engine;
use crate::identity::AccountIdentity;
use crate::product::ProductSnapshot;
use crate::purchase::{PurchaseRequest, Resolution};
use crate::subscription::ProSubscription;
use crate::transaction::{ChargeReason, TransactionKind, TransactionRecord};
use crate::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Register {
        identity: AccountIdentity,
    },
    Deposit {
        account: AccountId,
        amount: u64,
    },
    Withdraw {
        account: AccountId,
        amount: u64,
    },
    Charge {
        account: AccountId,
        amount: u64,
        kind: TransactionKind,
        description: String,
    },
    SubmitProduct {
        owner: AccountId,
        submission: ProductSubmission,
    },
    ApproveProduct {
        product: ProductId,
    },
    RejectProduct {
        product: ProductId,
    },
    RecordView {
        product: ProductId,
    },
    RecordDownload {
        product: ProductId,
    },
    AddReview {
        product: ProductId,
        reviewer: AccountId,
        rating: u8,
        #[serde(default)]
        comment: String,
    },
    CreateWalletPurchase {
        account: AccountId,
        product: ProductId,
    },
    CreateExternalPurchase {
        account: AccountId,
        product: ProductId,
        proof: String,
    },
    ResolvePurchase {
        request: RequestId,
        resolution: Resolution,
    },
    /// Uses the configured plan when `plan` is omitted.
    UpgradeToPro {
        account: AccountId,
        #[serde(default)]
        plan: Option<SubscriptionPlan>,
    },
    ToggleWishlist {
        account: AccountId,
        product: ProductId,
    },
    SaveFilter {
        account: AccountId,
        filter: FilterSpec,
    },
    DeleteFilter {
        account: AccountId,
        filter: FilterId,
    },
}

impl Command {
    /// Operation name, as it appears in the `op` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Charge { .. } => "charge",
            Self::SubmitProduct { .. } => "submit_product",
            Self::ApproveProduct { .. } => "approve_product",
            Self::RejectProduct { .. } => "reject_product",
            Self::RecordView { .. } => "record_view",
            Self::RecordDownload { .. } => "record_download",
            Self::AddReview { .. } => "add_review",
            Self::CreateWalletPurchase { .. } => "create_wallet_purchase",
            Self::CreateExternalPurchase { .. } => "create_external_purchase",
            Self::ResolvePurchase { .. } => "resolve_purchase",
            Self::UpgradeToPro { .. } => "upgrade_to_pro",
            Self::ToggleWishlist { .. } => "toggle_wishlist",
            Self::SaveFilter { .. } => "save_filter",
            Self::DeleteFilter { .. } => "delete_filter",
        }
    }
}

/// What a successful [`Command`] produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Account { account: AccountId },
    Transaction { transaction: TransactionRecord },
    Submitted { product: ProductId },
    Product { product: ProductSnapshot },
    Counter { value: u64 },
    Purchase { request: PurchaseRequest },
    Subscription { subscription: ProSubscription },
    Wishlist { present: bool },
    FilterSaved { filter: FilterId },
    FilterDeleted { filter: SavedFilter },
}

impl Engine {
    /// Runs one command.
    pub fn execute(&self, command: Command) -> Result<Outcome, LedgerError> {
        let outcome = match command {
            Command::Register { identity } => Outcome::Account {
                account: self.register_account(identity)?,
            },
            Command::Deposit { account, amount } => Outcome::Transaction {
                transaction: self.deposit(&account, amount)?,
            },
            Command::Withdraw { account, amount } => Outcome::Transaction {
                transaction: self.withdraw(&account, amount)?,
            },
            Command::Charge {
                account,
                amount,
                kind,
                description,
            } => Outcome::Transaction {
                transaction: self.charge(&account, amount, ChargeReason::new(kind, description)?)?,
            },
            Command::SubmitProduct { owner, submission } => Outcome::Submitted {
                product: self.submit_product(&owner, submission)?,
            },
            Command::ApproveProduct { product } => Outcome::Product {
                product: self.approve_product(&product)?,
            },
            Command::RejectProduct { product } => Outcome::Product {
                product: self.reject_product(&product)?,
            },
            Command::RecordView { product } => Outcome::Counter {
                value: self.record_view(&product)?,
            },
            Command::RecordDownload { product } => Outcome::Counter {
                value: self.record_download(&product)?,
            },
            Command::AddReview {
                product,
                reviewer,
                rating,
                comment,
            } => Outcome::Product {
                product: self.add_review(&product, &reviewer, rating, comment)?,
            },
            Command::CreateWalletPurchase { account, product } => Outcome::Purchase {
                request: self.create_wallet_purchase(&account, &product)?,
            },
            Command::CreateExternalPurchase { account, product, proof } => Outcome::Purchase {
                request: self.create_external_purchase(&account, &product, &proof)?,
            },
            Command::ResolvePurchase { request, resolution } => Outcome::Purchase {
                request: self.resolve_purchase(&request, resolution)?,
            },
            Command::UpgradeToPro { account, plan } => Outcome::Subscription {
                subscription: match plan {
                    Some(plan) => self.upgrade_to_pro(&account, &plan)?,
                    None => self.upgrade_with_default_plan(&account)?,
                },
            },
            Command::ToggleWishlist { account, product } => Outcome::Wishlist {
                present: self.toggle_wishlist(&account, &product)?,
            },
            Command::SaveFilter { account, filter } => Outcome::FilterSaved {
                filter: self.save_filter(&account, filter)?,
            },
            Command::DeleteFilter { account, filter } => Outcome::FilterDeleted {
                filter: self.delete_filter(&account, &filter)?,
            },
        };
        Ok(outcome)
    }
}
