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

//! Notification dispatcher boundary.
//!
//! Notifications are sent only after an atomic unit has committed and its
//! locks are released. Delivery is best-effort: a failing dispatcher is logged
//! and never affects the outcome of the operation that triggered it.

use crate::base::{AccountId, ProductId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// User-facing alert emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    DepositReceived { amount: u64, balance: u64 },
    PurchaseCompleted { request: RequestId, product: ProductId },
    PurchaseRejected { request: RequestId, product: ProductId },
    ProductSold { product: ProductId, buyer: AccountId },
    ProductApproved { product: ProductId },
    ProductRejected { product: ProductId },
    ProActivated { expires_at: DateTime<Utc> },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: &AccountId, notification: &Notification) -> Result<(), NotifyError>;
}

/// Dispatcher that writes every alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: &AccountId, notification: &Notification) -> Result<(), NotifyError> {
        info!(%recipient, ?notification, "notification dispatched");
        Ok(())
    }
}
