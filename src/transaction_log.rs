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

//! Global append-only transaction log.
//!
//! Records are appended while the owning account's lock is held, so for any
//! single account the feed order matches the order balance changes were
//! applied. Records of different accounts interleave freely.

use crate::base::TransactionId;
use crate::transaction::TransactionRecord;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;

/// Thread-safe record store with an exportable feed.
///
/// Combines a [`DashMap`] for lookup by id and duplicate detection with a
/// [`SegQueue`] that buffers committed records until an exporter drains them.
///
/// The feed holds a second handle to every record appended since the last
/// [`drain_feed`](Self::drain_feed). Long-running hosts must drain it
/// periodically or it grows without bound; the CLI drains once at exit and
/// the demo server on `GET /journal`.
#[derive(Debug, Default)]
pub struct TransactionLog {
    records: DashMap<TransactionId, Arc<TransactionRecord>>,
    /// Committed records not yet exported, in append order.
    feed: SegQueue<Arc<TransactionRecord>>,
    appended: AtomicUsize,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed record.
    ///
    /// Returns `false` (and stores nothing) if a record with the same id exists.
    pub fn append(&self, record: Arc<TransactionRecord>) -> bool {
        // Entry API keeps check-and-insert atomic.
        match self.records.entry(record.id) {
            Entry::Occupied(_) => {
                error!(transaction = %record.id, "duplicate transaction id rejected by log");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&record));
                self.feed.push(record);
                self.appended.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    pub fn get(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.records.get(id).map(|record| record.as_ref().clone())
    }

    /// Number of records ever appended.
    pub fn len(&self) -> usize {
        self.appended.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records waiting in the feed.
    pub fn pending_export(&self) -> usize {
        self.feed.len()
    }

    /// Removes and returns every record appended since the previous drain.
    pub fn drain_feed(&self) -> Vec<TransactionRecord> {
        let mut drained = Vec::with_capacity(self.feed.len());
        while let Some(record) = self.feed.pop() {
            drained.push(record.as_ref().clone());
        }
        drained
    }
}
