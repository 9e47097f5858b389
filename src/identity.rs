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

//! Identity gateway boundary.
//!
//! The engine never authenticates callers. A gateway hands it an
//! [`AccountIdentity`] and, on sign-in/sign-out, invokes registered listeners
//! synchronously. Subscriptions live on the gateway side.

use crate::LedgerError;
use crate::base::AccountId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Profile bootstrap data for an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub uid: AccountId,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl AccountIdentity {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: AccountId::new(uid),
            display_name: display_name.into(),
            email: email.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        if self.uid.as_str().trim().is_empty() {
            return Err(LedgerError::invalid("identity uid must not be blank"));
        }
        if self.display_name.trim().is_empty() {
            return Err(LedgerError::invalid("display name must not be blank"));
        }
        if !self.email.contains('@') {
            return Err(LedgerError::invalid("email address is malformed"));
        }
        Ok(())
    }
}

/// Callback fired on identity change; `None` means signed out.
pub type IdentityListener = Box<dyn Fn(Option<&AccountIdentity>) + Send + Sync>;

pub trait IdentityGateway: Send + Sync {
    /// Identity of the current caller, if signed in.
    fn authenticate(&self) -> Option<AccountIdentity>;

    fn subscribe(&self, listener: IdentityListener);
}

/// In-process gateway holding a single session.
#[derive(Default)]
pub struct SessionGateway {
    current: Mutex<Option<AccountIdentity>>,
    listeners: Mutex<Vec<IdentityListener>>,
}

impl SessionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: AccountIdentity) {
        *self.current.lock() = Some(identity.clone());
        self.publish(Some(&identity));
    }

    pub fn sign_out(&self) {
        *self.current.lock() = None;
        self.publish(None);
    }

    fn publish(&self, identity: Option<&AccountIdentity>) {
        for listener in self.listeners.lock().iter() {
            listener(identity);
        }
    }
}

impl IdentityGateway for SessionGateway {
    fn authenticate(&self) -> Option<AccountIdentity> {
        self.current.lock().clone()
    }

    fn subscribe(&self, listener: IdentityListener) {
        self.listeners.lock().push(listener);
    }
}
