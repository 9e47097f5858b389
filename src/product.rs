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

//! Product moderation and integrity counters.
//!
//! Moderation is one-shot:
//!
//! ```text
//! Pending ──approve──► Approved
//!    │
//!    └─────reject───► Rejected
//! ```
//!
//! Sales, the rating aggregate, and reviews change under the product lock.
//! View and download counters are bare atomics: each increment is atomic on
//! its own and is not ordered against moderation.

use crate::LedgerError;
use crate::base::{AccountId, ProductId};
use crate::error::Entity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

const MAX_REVIEW_LEN: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationState {
    Pending,
    Approved,
    Rejected,
}

impl ModerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub author: AccountId,
    /// 1 to 5 stars.
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct ProductData {
    id: ProductId,
    owner: AccountId,
    pub(crate) price: u64,
    state: ModerationState,
    sales_count: u64,
    rating_total: u64,
    reviews: Vec<Review>,
    submitted_at: DateTime<Utc>,
    moderated_at: Option<DateTime<Utc>>,
}

impl ProductData {
    pub(crate) fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Moves a pending product to `to`.
    pub(crate) fn transition(&mut self, to: ModerationState, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.state != ModerationState::Pending || to == ModerationState::Pending {
            return Err(LedgerError::InvalidStateTransition {
                entity: Entity::Product,
                from: self.state.as_str(),
                to: to.as_str(),
            });
        }
        self.state = to;
        self.moderated_at = Some(now);
        Ok(())
    }

    /// Only approved products can be acquired.
    pub(crate) fn ensure_purchasable(&self) -> Result<(), LedgerError> {
        if self.state != ModerationState::Approved {
            return Err(LedgerError::InvalidStateTransition {
                entity: Entity::Product,
                from: self.state.as_str(),
                to: "acquired",
            });
        }
        Ok(())
    }

    pub(crate) fn record_sale(&mut self) {
        self.sales_count += 1;
    }

    pub(crate) fn add_review(&mut self, review: Review) -> Result<(), LedgerError> {
        if !(1..=5).contains(&review.rating) {
            return Err(LedgerError::invalid("rating must be between 1 and 5"));
        }
        if review.comment.chars().count() > MAX_REVIEW_LEN {
            return Err(LedgerError::invalid("review comment is too long"));
        }
        if self.state != ModerationState::Approved {
            return Err(LedgerError::InvalidStateTransition {
                entity: Entity::Product,
                from: self.state.as_str(),
                to: "reviewed",
            });
        }
        if self.reviews.iter().any(|existing| existing.author == review.author) {
            return Err(LedgerError::invalid("account already reviewed this product"));
        }
        self.rating_total += u64::from(review.rating);
        self.reviews.push(review);
        Ok(())
    }

    fn rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            None
        } else {
            Some(self.rating_total as f64 / self.reviews.len() as f64)
        }
    }
}

/// Point-in-time view of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub owner: AccountId,
    pub price: u64,
    pub state: ModerationState,
    pub view_count: u64,
    pub sales_count: u64,
    pub download_count: u64,
    /// Average star rating, absent until the first review.
    pub rating: Option<f64>,
    pub review_count: usize,
    pub submitted_at: DateTime<Utc>,
    pub moderated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Product {
    pub(crate) inner: Mutex<ProductData>,
    views: AtomicU64,
    downloads: AtomicU64,
}

impl Product {
    pub(crate) fn new(id: ProductId, owner: AccountId, price: u64, now: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(ProductData {
                id,
                owner,
                price,
                state: ModerationState::Pending,
                sales_count: 0,
                rating_total: 0,
                reviews: Vec::new(),
                submitted_at: now,
                moderated_at: None,
            }),
            views: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ModerationState {
        self.inner.lock().state
    }

    pub fn sales_count(&self) -> u64 {
        self.inner.lock().sales_count
    }

    pub fn view_count(&self) -> u64 {
        self.views.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.inner.lock().reviews.clone()
    }

    /// Returns the new view count.
    pub(crate) fn record_view(&self) -> u64 {
        self.views.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the new download count.
    pub(crate) fn record_download(&self) -> u64 {
        self.downloads.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        let data = self.inner.lock();
        ProductSnapshot {
            id: data.id,
            owner: data.owner.clone(),
            price: data.price,
            state: data.state,
            view_count: self.view_count(),
            sales_count: data.sales_count,
            download_count: self.download_count(),
            rating: data.rating(),
            review_count: data.reviews.len(),
            submitted_at: data.submitted_at,
            moderated_at: data.moderated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product::new(ProductId::new(), AccountId::new("seller"), 999, Utc::now())
    }

    fn review(author: &str, rating: u8) -> Review {
        Review {
            author: AccountId::new(author),
            rating,
            comment: "nice".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn new_product_is_pending_with_zero_counters() {
        let snapshot = product().snapshot();
        assert_eq!(snapshot.state, ModerationState::Pending);
        assert_eq!(snapshot.view_count, 0);
        assert_eq!(snapshot.sales_count, 0);
        assert_eq!(snapshot.download_count, 0);
        assert_eq!(snapshot.rating, None);
        assert!(snapshot.moderated_at.is_none());
    }

    #[test]
    fn approval_is_one_shot() {
        let product = product();
        let mut data = product.inner.lock();
        data.transition(ModerationState::Approved, Utc::now()).unwrap();

        assert_eq!(
            data.transition(ModerationState::Rejected, Utc::now()),
            Err(LedgerError::InvalidStateTransition {
                entity: Entity::Product,
                from: "approved",
                to: "rejected",
            })
        );
        assert_eq!(
            data.transition(ModerationState::Approved, Utc::now()).unwrap_err(),
            LedgerError::InvalidStateTransition {
                entity: Entity::Product,
                from: "approved",
                to: "approved",
            }
        );
        assert_eq!(data.state, ModerationState::Approved);
    }

    #[test]
    fn rejected_product_cannot_be_approved_or_bought() {
        let product = product();
        let mut data = product.inner.lock();
        data.transition(ModerationState::Rejected, Utc::now()).unwrap();
        assert!(data.transition(ModerationState::Approved, Utc::now()).is_err());
        assert!(data.ensure_purchasable().is_err());
    }

    #[test]
    fn pending_is_not_a_transition_target() {
        let product = product();
        let mut data = product.inner.lock();
        assert!(data.transition(ModerationState::Pending, Utc::now()).is_err());
    }

    #[test]
    fn counters_increment_independently() {
        let product = product();
        assert_eq!(product.record_view(), 1);
        assert_eq!(product.record_view(), 2);
        assert_eq!(product.record_download(), 1);
        assert_eq!(product.view_count(), 2);
        assert_eq!(product.download_count(), 1);
        assert_eq!(product.sales_count(), 0);
    }

    #[test]
    fn reviews_update_rating_aggregate() {
        let product = product();
        {
            let mut data = product.inner.lock();
            data.transition(ModerationState::Approved, Utc::now()).unwrap();
            data.add_review(review("a", 5)).unwrap();
            data.add_review(review("b", 2)).unwrap();
        }
        let snapshot = product.snapshot();
        assert_eq!(snapshot.review_count, 2);
        assert_eq!(snapshot.rating, Some(3.5));
    }

    #[test]
    fn review_rules() {
        let product = product();
        let mut data = product.inner.lock();
        // Not yet approved.
        assert!(matches!(
            data.add_review(review("a", 4)),
            Err(LedgerError::InvalidStateTransition { .. })
        ));
        data.transition(ModerationState::Approved, Utc::now()).unwrap();
        assert!(matches!(data.add_review(review("a", 0)), Err(LedgerError::Validation(_))));
        assert!(matches!(data.add_review(review("a", 6)), Err(LedgerError::Validation(_))));
        data.add_review(review("a", 4)).unwrap();
        assert!(matches!(data.add_review(review("a", 3)), Err(LedgerError::Validation(_))));
        assert_eq!(data.reviews.len(), 1);
    }
}
