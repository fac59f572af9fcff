//! Finds the existing remote counterpart of a variant group, if any.
//!
//! Query construction is tiered: the first tier that yields a usable query
//! wins, and a group with no distinguishing text is never sent to the remote
//! system at all. Lookups are cached per run, hits and explicit misses
//! alike, so repeated groups sharing a query cost one remote call. Transport
//! failures are treated as "not found" and deliberately left uncached, so a
//! later group with the same query gets a fresh attempt.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::contract::{CatalogClient, RemoteProduct, RemoteVariant};
use crate::group::VariantGroup;
use crate::response::normalize_response;

/// Search document sent through the catalog client.
pub const PRODUCT_SEARCH: &str = r#"
query productSearch($query: String!, $first: Int!) {
  products(first: $first, query: $query) {
    edges {
      node {
        id
        title
        vendor
        descriptionHtml
        tags
        variants(first: 50) {
          edges {
            node {
              id
              sku
              barcode
              price
            }
          }
        }
        media(first: 20) {
          edges {
            node {
              ... on MediaImage {
                image {
                  url
                }
              }
            }
          }
        }
      }
    }
  }
}"#;

pub struct CatalogMatcher<C> {
    client: Arc<C>,
    cache: Mutex<HashMap<String, Option<RemoteProduct>>>,
    cache_enabled: bool,
}

impl<C: CatalogClient> CatalogMatcher<C> {
    pub fn new(client: Arc<C>, cache_enabled: bool) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            cache_enabled,
        }
    }

    /// Fuzzy lookup for a group's existing remote counterpart.
    pub async fn find_existing(&self, group: &VariantGroup) -> Option<RemoteProduct> {
        let query = build_search_query(group)?;
        self.lookup(&query).await
    }

    /// Secondary lookup used by the update flow: group identifiers are
    /// sometimes stored as SKU or barcode on a previously-created master
    /// variant. Tried in order, first non-empty result wins.
    pub async fn find_by_group(
        &self,
        group_key: &str,
        first_sku: Option<&str>,
    ) -> Option<RemoteProduct> {
        let mut queries = vec![
            format!("sku:{group_key}"),
            format!("barcode:{group_key}"),
        ];
        if let Some(sku) = first_sku {
            queries.push(format!("sku:{sku}"));
            queries.push(format!("barcode:{sku}"));
        }
        for query in queries {
            if let Some(found) = self.lookup(&query).await {
                return Some(found);
            }
        }
        None
    }

    async fn lookup(&self, query: &str) -> Option<RemoteProduct> {
        if self.cache_enabled {
            if let Some(cached) = self.cache.lock().await.get(query) {
                debug!(query, hit = cached.is_some(), "[MATCH] Cache hit");
                return cached.clone();
            }
        }

        match self.search_remote(query).await {
            Ok(result) => {
                if self.cache_enabled {
                    self.cache
                        .lock()
                        .await
                        .insert(query.to_string(), result.clone());
                }
                result
            }
            Err(err) => {
                // A failed read never blocks the pipeline, and a transient
                // fault must not starve later groups sharing this query.
                warn!(query, error = %err, "[MATCH] Lookup failed, treating as not found");
                None
            }
        }
    }

    async fn search_remote(
        &self,
        query: &str,
    ) -> Result<Option<RemoteProduct>, crate::error::SyncError> {
        let raw = self
            .client
            .execute(PRODUCT_SEARCH, json!({ "query": query, "first": 1 }))
            .await
            .map_err(crate::error::SyncError::transport)?;
        let result = normalize_response(raw)?;
        if !result.is_ok() {
            return Err(crate::error::SyncError::Transport(
                result
                    .errors
                    .iter()
                    .map(|e| e.message.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }
        let node = result
            .data
            .get("products")
            .and_then(|p| p.get("edges"))
            .and_then(|e| e.as_array())
            .and_then(|edges| edges.first())
            .and_then(|edge| edge.get("node"));
        Ok(node.and_then(product_from_node))
    }
}

/// Build the search query for a group, tier by tier.
///
/// 1. vendor + title, when the vendor has more than 2 chars and the
///    normalized title more than 3;
/// 2. vendor alone, when longer than 3 chars with no whitespace;
/// 3. the first three words of the normalized title, when longer than 5.
///
/// No tier usable means the group cannot be matched and no remote call is
/// made.
pub fn build_search_query(group: &VariantGroup) -> Option<String> {
    let master = group.master();
    let vendor = master.vendor.trim();
    let title = normalize_query_text(&master.title);

    if vendor.len() > 2 && title.len() > 3 {
        return Some(format!("{vendor} {title}"));
    }
    if vendor.len() > 3 && !vendor.contains(char::is_whitespace) {
        return Some(vendor.to_string());
    }
    if title.len() > 5 {
        let head: Vec<&str> = title.split_whitespace().take(3).collect();
        return Some(head.join(" "));
    }
    None
}

/// Strip quotes and newlines, collapse runs of whitespace.
fn normalize_query_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '\n' | '\r'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode a product node from the search response into reference data.
pub fn product_from_node(node: &Value) -> Option<RemoteProduct> {
    let id = node.get("id")?.as_str()?.to_string();
    let variants = node
        .get("variants")
        .and_then(|v| v.get("edges"))
        .and_then(|e| e.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| edge.get("node"))
                .filter_map(variant_from_node)
                .collect()
        })
        .unwrap_or_default();
    let images = node
        .get("media")
        .and_then(|m| m.get("edges"))
        .and_then(|e| e.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| edge.pointer("/node/image/url"))
                .filter_map(|url| url.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(RemoteProduct {
        id,
        title: str_field(node, "title"),
        vendor: str_field(node, "vendor"),
        description: str_field(node, "descriptionHtml"),
        tags: node
            .get("tags")
            .and_then(|t| t.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        variants,
        images,
    })
}

fn variant_from_node(node: &Value) -> Option<RemoteVariant> {
    Some(RemoteVariant {
        id: node.get("id")?.as_str()?.to_string(),
        sku: node
            .get("sku")
            .and_then(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        barcode: node
            .get("barcode")
            .and_then(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        price: node
            .get("price")
            .and_then(|p| p.as_str())
            .and_then(|p| p.parse::<Decimal>().ok())
            .unwrap_or_default(),
    })
}

fn str_field(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
