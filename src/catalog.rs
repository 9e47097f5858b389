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

//! Catalog store boundary and product submissions.
//!
//! The catalog owns a listing's descriptive fields. The engine only keeps the
//! moderation state, price, and counters of each product.

use crate::LedgerError;
use crate::base::{AccountId, ProductId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use url::Url;

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 5_000;

/// Fields shared by every kind of submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetails {
    pub title: String,
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    pub category: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl ListingDetails {
    fn validate(&self) -> Result<(), LedgerError> {
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(LedgerError::invalid(format!(
                "title must be 1..={MAX_TITLE_LEN} characters"
            )));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::invalid("description is too long"));
        }
        if self.price == 0 {
            return Err(LedgerError::invalid("price must be positive"));
        }
        if i64::try_from(self.price).is_err() {
            return Err(LedgerError::invalid("price exceeds ledger range"));
        }
        if self.category.trim().is_empty() {
            return Err(LedgerError::invalid("category must not be blank"));
        }
        if let Some(url) = &self.preview_url {
            validate_url("preview_url", url)?;
        }
        Ok(())
    }
}

/// A new-product submission, one variant per kind of digital asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductSubmission {
    /// A single downloadable file.
    Download {
        details: ListingDetails,
        file_url: String,
        file_size_bytes: u64,
    },
    /// An ordered sequence of lessons.
    Course {
        details: ListingDetails,
        lessons: Vec<String>,
    },
    /// A usage license for a fixed number of seats.
    License {
        details: ListingDetails,
        terms: String,
        seats: u32,
    },
}

impl ProductSubmission {
    pub fn details(&self) -> &ListingDetails {
        match self {
            Self::Download { details, .. }
            | Self::Course { details, .. }
            | Self::License { details, .. } => details,
        }
    }

    pub fn price(&self) -> u64 {
        self.details().price
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::Course { .. } => "course",
            Self::License { .. } => "license",
        }
    }

    /// Checks the submission before anything is stored.
    pub fn validate(&self) -> Result<(), LedgerError> {
        self.details().validate()?;
        match self {
            Self::Download {
                file_url,
                file_size_bytes,
                ..
            } => {
                validate_url("file_url", file_url)?;
                if *file_size_bytes == 0 {
                    return Err(LedgerError::invalid("download file must not be empty"));
                }
            }
            Self::Course { lessons, .. } => {
                if lessons.is_empty() {
                    return Err(LedgerError::invalid("course needs at least one lesson"));
                }
                if lessons.iter().any(|lesson| lesson.trim().is_empty()) {
                    return Err(LedgerError::invalid("lesson titles must not be blank"));
                }
            }
            Self::License { terms, seats, .. } => {
                if terms.trim().is_empty() {
                    return Err(LedgerError::invalid("license terms must not be blank"));
                }
                if *seats == 0 {
                    return Err(LedgerError::invalid("license needs at least one seat"));
                }
            }
        }
        Ok(())
    }
}

fn validate_url(field: &str, raw: &str) -> Result<(), LedgerError> {
    let invalid = || LedgerError::invalid(format!("{field} must be an http(s) URL"));
    let parsed = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(())
}

/// A product listing as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ProductId,
    pub owner: AccountId,
    pub submission: ProductSubmission,
    pub created_at: DateTime<Utc>,
}

pub trait CatalogStore: Send + Sync {
    /// Stores a new listing.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] if the id is already taken.
    fn insert(&self, listing: Listing) -> Result<(), LedgerError>;

    fn get(&self, id: &ProductId) -> Option<Listing>;

    fn list(&self) -> Vec<Listing>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    listings: DashMap<ProductId, Listing>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for InMemoryCatalog {
    fn insert(&self, listing: Listing) -> Result<(), LedgerError> {
        match self.listings.entry(listing.id) {
            Entry::Occupied(_) => Err(LedgerError::invalid("listing id already exists")),
            Entry::Vacant(entry) => {
                entry.insert(listing);
                Ok(())
            }
        }
    }

    fn get(&self, id: &ProductId) -> Option<Listing> {
        self.listings.get(id).map(|listing| listing.clone())
    }

    fn list(&self) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self.listings.iter().map(|l| l.value().clone()).collect();
        listings.sort_by_key(|listing| listing.created_at);
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(price: u64) -> ListingDetails {
        ListingDetails {
            title: "Icon pack".into(),
            description: "400 icons".into(),
            price,
            category: "design".into(),
            preview_url: None,
        }
    }

    fn download(price: u64) -> ProductSubmission {
        ProductSubmission::Download {
            details: details(price),
            file_url: "https://cdn.example.com/icons.zip".into(),
            file_size_bytes: 1024,
        }
    }

    #[test]
    fn valid_download_passes() {
        assert!(download(999).validate().is_ok());
        assert_eq!(download(999).kind(), "download");
        assert_eq!(download(999).price(), 999);
    }

    #[test]
    fn zero_price_is_rejected() {
        assert!(matches!(download(0).validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut submission = download(10);
        if let ProductSubmission::Download { details, .. } = &mut submission {
            details.title = "   ".into();
        }
        assert!(submission.validate().is_err());
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let submission = ProductSubmission::Download {
            details: details(10),
            file_url: "ftp://cdn.example.com/icons.zip".into(),
            file_size_bytes: 1,
        };
        assert!(submission.validate().is_err());

        let mut with_preview = details(10);
        with_preview.preview_url = Some("https://".into());
        let course = ProductSubmission::Course {
            details: with_preview,
            lessons: vec!["Intro".into()],
        };
        assert!(course.validate().is_err());
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for file_url in [
            "https://:::",
            "http://[not-a-host",
            "https://%%%/x",
            "https://exa\0mple",
            "mailto:seller@example.com",
            "cdn.example.com/icons.zip",
        ] {
            let submission = ProductSubmission::Download {
                details: details(10),
                file_url: file_url.into(),
                file_size_bytes: 1,
            };
            assert!(
                matches!(submission.validate(), Err(LedgerError::Validation(_))),
                "accepted {file_url:?}"
            );
        }
    }

    #[test]
    fn urls_with_ports_and_queries_pass() {
        let mut with_preview = details(10);
        with_preview.preview_url = Some("http://media.example.com:8080/p.png?size=lg".into());
        let submission = ProductSubmission::Download {
            details: with_preview,
            file_url: "https://cdn.example.com/files/icons.zip#v2".into(),
            file_size_bytes: 1,
        };
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn course_requires_lessons() {
        let course = ProductSubmission::Course {
            details: details(10),
            lessons: vec![],
        };
        assert!(course.validate().is_err());
    }

    #[test]
    fn license_requires_seats_and_terms() {
        let no_seats = ProductSubmission::License {
            details: details(10),
            terms: "Commercial use".into(),
            seats: 0,
        };
        assert!(no_seats.validate().is_err());

        let no_terms = ProductSubmission::License {
            details: details(10),
            terms: "".into(),
            seats: 5,
        };
        assert!(no_terms.validate().is_err());
    }

    #[test]
    fn submission_deserializes_from_tagged_json() {
        let json = r#"{
            "kind": "license",
            "details": {"title": "Font", "description": "", "price": 2500, "category": "type"},
            "terms": "Desktop use",
            "seats": 3
        }"#;
        let submission: ProductSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.kind(), "license");
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let catalog = InMemoryCatalog::new();
        let listing = Listing {
            id: ProductId::new(),
            owner: AccountId::new("seller"),
            submission: download(100),
            created_at: Utc::now(),
        };
        catalog.insert(listing.clone()).unwrap();
        assert!(catalog.insert(listing.clone()).is_err());
        assert_eq!(catalog.get(&listing.id), Some(listing));
        assert_eq!(catalog.list().len(), 1);
    }
}
