//! # contract: capability seams between the engine and the outside world
//!
//! This module defines the three traits the reconciliation engine depends on
//! and the plain data types that cross those seams:
//!
//! - [`CatalogClient`]: the remote catalog's query/mutation transport. The
//!   engine only ever calls `execute(operation, variables)` and normalizes
//!   whatever shape comes back (see [`crate::response`]).
//! - [`ProgressNotifier`]: receives structured progress events during a run.
//! - [`TrackingStore`]: the externally-owned mapping from feed groups to
//!   remote product ids and last-known prices.
//!
//! ## Mocking & Testing
//! All traits are annotated for `mockall`, gated exactly like the rest of the
//! crate's mocks, so consumers can generate deterministic mocks for unit and
//! integration tests.
//!
//! ## Adding New Implementations
//! - Implement the trait for your transport/store.
//! - Convert all meaningful upstream errors to a boxed error; the engine
//!   classifies boxed transport errors as retryable.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::response::RawResponse;
use crate::stats::SyncStats;

/// Boxed error used across all capability seams.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// A variant on an existing remote product. Reference data, never mutated
/// directly, only through explicit mutation calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVariant {
    pub id: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub price: Decimal,
}

/// An existing product in the remote catalog, as returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: String,
    pub title: String,
    pub vendor: String,
    pub description: String,
    pub tags: Vec<String>,
    pub variants: Vec<RemoteVariant>,
    pub images: Vec<String>,
}

impl RemoteProduct {
    /// The default variant is the first one, per the remote API's contract.
    pub fn default_variant(&self) -> Option<&RemoteVariant> {
        self.variants.first()
    }

    /// Match an incoming variant to an existing one: SKU first, then
    /// barcode/GTIN.
    pub fn find_variant(&self, sku: Option<&str>, gtin: Option<&str>) -> Option<&RemoteVariant> {
        if let Some(sku) = sku {
            if let Some(found) = self
                .variants
                .iter()
                .find(|v| v.sku.as_deref() == Some(sku))
            {
                return Some(found);
            }
        }
        gtin.and_then(|gtin| {
            self.variants
                .iter()
                .find(|v| v.barcode.as_deref() == Some(gtin))
        })
    }
}

/// Local tracking record linking a feed group to a remote product. Owned by
/// the [`TrackingStore`]; deletion is soft here even when the remote
/// deletion is hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMapping {
    pub group_key: String,
    pub sku: Option<String>,
    pub remote_product_id: String,
    pub title: String,
    pub last_price: Decimal,
    pub active: bool,
}

/// Structured progress events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    SyncStarted {
        total: usize,
    },
    Processing {
        product_title: String,
        processed: usize,
        total: usize,
    },
    Created {
        product_title: String,
        processed: usize,
        total: usize,
        variants_created: usize,
    },
    Updated {
        product_title: String,
        processed: usize,
        total: usize,
        variants_updated: usize,
        variants_created: usize,
    },
    Skipped {
        product_title: String,
        processed: usize,
        total: usize,
    },
    Error {
        product_title: String,
        processed: usize,
        total: usize,
        error: String,
    },
    SyncCompleted {
        stats: SyncStats,
    },
}

impl ProgressEvent {
    /// The wire tag, handy for logs and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::SyncStarted { .. } => "sync_started",
            ProgressEvent::Processing { .. } => "processing",
            ProgressEvent::Created { .. } => "created",
            ProgressEvent::Updated { .. } => "updated",
            ProgressEvent::Skipped { .. } => "skipped",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::SyncCompleted { .. } => "sync_completed",
        }
    }
}

/// Transport capability for the remote catalog. Implementors post the
/// operation document with its variables and return the raw response in
/// whichever shape the transport produces.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn execute(
        &self,
        operation: &str,
        variables: Value,
    ) -> Result<RawResponse, CapabilityError>;
}

/// Receives progress events for a shop's run. Implementations must be cheap;
/// the pipeline awaits every send.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn send(&self, shop: &str, event: ProgressEvent) -> Result<(), CapabilityError>;
}

/// Externally-owned store of feed-group → remote-product mappings.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Current mapping for a group key, if any.
    async fn get(&self, group_key: &str) -> Result<Option<ProductMapping>, CapabilityError>;

    /// All mappings not yet marked inactive; drives delete reconciliation.
    async fn list_active(&self) -> Result<Vec<ProductMapping>, CapabilityError>;

    async fn upsert(&self, mapping: ProductMapping) -> Result<(), CapabilityError>;

    /// Soft-delete: the record is kept for history, flagged inactive.
    async fn mark_inactive(&self, group_key: &str) -> Result<(), CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, sku: Option<&str>, barcode: Option<&str>) -> RemoteVariant {
        RemoteVariant {
            id: id.to_string(),
            sku: sku.map(str::to_string),
            barcode: barcode.map(str::to_string),
            price: Decimal::ZERO,
        }
    }

    #[test]
    fn variant_matching_prefers_sku_over_barcode() {
        let product = RemoteProduct {
            id: "p1".into(),
            title: "T".into(),
            vendor: "V".into(),
            description: String::new(),
            tags: vec![],
            variants: vec![
                variant("v1", Some("SKU-A"), Some("11111111")),
                variant("v2", Some("SKU-B"), Some("22222222")),
            ],
            images: vec![],
        };
        // SKU match wins even though the barcode points elsewhere
        let found = product.find_variant(Some("SKU-B"), Some("11111111")).unwrap();
        assert_eq!(found.id, "v2");
        // No SKU match: fall back to barcode
        let found = product.find_variant(Some("SKU-X"), Some("11111111")).unwrap();
        assert_eq!(found.id, "v1");
        assert!(product.find_variant(Some("SKU-X"), None).is_none());
    }

    #[test]
    fn progress_events_serialize_with_wire_tags() {
        let event = ProgressEvent::Processing {
            product_title: "Bottle".into(),
            processed: 1,
            total: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "processing");
        assert_eq!(json["product_title"], "Bottle");
        assert_eq!(event.kind(), "processing");
    }
}
