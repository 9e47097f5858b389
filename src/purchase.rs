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

//! Purchase requests.
//!
//! ```text
//! wallet purchase ─────────────────────────────► Approved
//! external proof  ──► Pending ──resolve(approve)──► Approved
//!                        │
//!                        └─────resolve(reject)──► Rejected
//! ```
//!
//! `Approved` and `Rejected` are terminal.

use crate::LedgerError;
use crate::base::{AccountId, ProductId, RequestId, TransactionId};
use crate::error::Entity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Pending and approved requests block another request for the same pair.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Wallet,
    ExternalProof { reference: String },
}

/// Administrative decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Approve,
    Reject,
}

impl Resolution {
    fn target(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    pub account: AccountId,
    pub product: ProductId,
    pub status: RequestStatus,
    pub payment: PaymentMethod,
    /// The wallet charge that paid for this request, once approved.
    pub charge: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PurchaseRequest {
    /// A wallet purchase, approved at creation.
    pub(crate) fn wallet(
        account: AccountId,
        product: ProductId,
        charge: TransactionId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            account,
            product,
            status: RequestStatus::Approved,
            payment: PaymentMethod::Wallet,
            charge: Some(charge),
            created_at: now,
            approved_at: Some(now),
            resolved_at: Some(now),
        }
    }

    /// An external-proof purchase awaiting review.
    pub(crate) fn external(
        account: AccountId,
        product: ProductId,
        reference: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            account,
            product,
            status: RequestStatus::Pending,
            payment: PaymentMethod::ExternalProof { reference },
            charge: None,
            created_at: now,
            approved_at: None,
            resolved_at: None,
        }
    }

    pub fn is_wallet_purchase(&self) -> bool {
        self.payment == PaymentMethod::Wallet
    }

    /// Checks that `resolution` may be applied, without applying it.
    pub(crate) fn ensure_resolvable(&self, resolution: Resolution) -> Result<(), LedgerError> {
        if self.status != RequestStatus::Pending {
            return Err(LedgerError::InvalidStateTransition {
                entity: Entity::PurchaseRequest,
                from: self.status.as_str(),
                to: resolution.target().as_str(),
            });
        }
        Ok(())
    }

    pub(crate) fn approve(&mut self, charge: TransactionId, now: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.charge = Some(charge);
        self.approved_at = Some(now);
        self.resolved_at = Some(now);
    }

    pub(crate) fn reject(&mut self, now: DateTime<Utc>) {
        self.status = RequestStatus::Rejected;
        self.resolved_at = Some(now);
    }
}

/// Shared slot for one request.
///
/// The account and product are copied out so a resolver can take the
/// account and product locks before the request lock.
#[derive(Debug)]
pub(crate) struct RequestCell {
    pub(crate) account: AccountId,
    pub(crate) product: ProductId,
    pub(crate) inner: Mutex<PurchaseRequest>,
}

impl RequestCell {
    pub(crate) fn new(request: PurchaseRequest) -> Self {
        Self {
            account: request.account.clone(),
            product: request.product,
            inner: Mutex::new(request),
        }
    }

    pub(crate) fn snapshot(&self) -> PurchaseRequest {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PurchaseRequest {
        PurchaseRequest::external(
            AccountId::new("alice"),
            ProductId::new(),
            "bank-ref-77".into(),
            Utc::now(),
        )
    }

    #[test]
    fn wallet_request_is_born_approved() {
        let charge = TransactionId::new();
        let request = PurchaseRequest::wallet(AccountId::new("a"), ProductId::new(), charge, Utc::now());
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.is_wallet_purchase());
        assert_eq!(request.charge, Some(charge));
        assert_eq!(request.approved_at, Some(request.created_at));
    }

    #[test]
    fn external_request_starts_pending() {
        let request = pending();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(!request.is_wallet_purchase());
        assert!(request.approved_at.is_none());
        assert!(request.ensure_resolvable(Resolution::Approve).is_ok());
    }

    #[test]
    fn resolved_requests_are_terminal() {
        let mut approved = pending();
        approved.approve(TransactionId::new(), Utc::now());
        assert_eq!(
            approved.ensure_resolvable(Resolution::Reject),
            Err(LedgerError::InvalidStateTransition {
                entity: Entity::PurchaseRequest,
                from: "approved",
                to: "rejected",
            })
        );

        let mut rejected = pending();
        rejected.reject(Utc::now());
        assert!(rejected.ensure_resolvable(Resolution::Approve).is_err());
        assert!(!rejected.status.is_active());
        assert!(rejected.approved_at.is_none());
    }

    #[test]
    fn payment_method_is_tagged() {
        let json = serde_json::to_value(PaymentMethod::ExternalProof {
            reference: "r-1".into(),
        })
        .unwrap();
        assert_eq!(json["method"], "external_proof");
        assert_eq!(json["reference"], "r-1");
    }
}
