//! Feed parsing: turns raw feed bytes into canonical [`FeedItem`] records.
//!
//! Suppliers emit half a dozen mutually incompatible XML layouts. Instead of
//! branching per supplier, the parser lowers the document into a JSON tree
//! ([`crate::xml`]) and probes an ordered ladder of known shapes; the first
//! shape that resolves wins. Unknown layouts fall back to a generic scan for
//! the first array of objects in the tree.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::xml;

const FEED_ACCEPT: &str = "application/xml, text/xml, */*";
const FEED_USER_AGENT: &str = "feedsync/0.1";
const DEFAULT_VENDOR: &str = "Unknown";
const DEFAULT_CATEGORY: &str = "General";

/// Product condition as declared by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Refurbished,
    Used,
}

impl Condition {
    fn from_feed(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("refurbished") => Condition::Refurbished,
            Some("used") => Condition::Used,
            _ => Condition::New,
        }
    }

    /// Display label used for the remote option schema.
    pub fn label(&self) -> &'static str {
        match self {
            Condition::New => "New",
            Condition::Refurbished => "Refurbished",
            Condition::Used => "Used",
        }
    }
}

/// Stock state as declared by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Preorder,
    Unknown,
}

impl Availability {
    fn from_feed(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            // Absent defaults to in stock, which is what most feeds mean.
            None | Some("in_stock") | Some("in stock") => Availability::InStock,
            Some("out_of_stock") | Some("out of stock") => Availability::OutOfStock,
            Some("preorder") => Availability::Preorder,
            Some(_) => Availability::Unknown,
        }
    }
}

/// One raw feed entry, normalized. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub external_id: String,
    /// Present when the entry belongs to a multi-variant product.
    pub group_id: Option<String>,
    pub title: String,
    pub description: String,
    pub vendor: String,
    pub condition: Condition,
    pub price: Decimal,
    pub sku: Option<String>,
    pub gtin: Option<String>,
    /// Absolute HTTP(S) URLs only; the first is the primary image.
    pub images: Vec<String>,
    pub availability: Availability,
    pub color: Option<String>,
    pub category: String,
    pub tags: BTreeSet<String>,
}

impl FeedItem {
    pub fn in_stock(&self) -> bool {
        self.availability == Availability::InStock
    }
}

static PRICE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static price regex"));

/// Extract the first numeric token from a possibly unit-suffixed price string.
/// `"179.00 EUR"` -> 179.00, `"€45"` -> 45, no digits -> 0.
pub fn extract_price(raw: &str) -> Decimal {
    PRICE_TOKEN
        .find(raw)
        .and_then(|m| m.as_str().parse::<Decimal>().ok())
        .unwrap_or_default()
}

/// A recognized feed layout: a key path whose target holds the entry list.
struct FeedShape {
    name: &'static str,
    path: &'static [&'static str],
}

/// Probed in order; the first resolving shape wins. Adding a supplier layout
/// is a new row here, not new control flow.
const FEED_SHAPES: &[FeedShape] = &[
    FeedShape { name: "products.product", path: &["products", "product"] },
    FeedShape { name: "catalog.item", path: &["catalog", "item"] },
    FeedShape { name: "rss.channel.item", path: &["rss", "channel", "item"] },
    FeedShape { name: "feed.entry", path: &["feed", "entry"] },
    FeedShape { name: "channel.item", path: &["channel", "item"] },
    FeedShape { name: "item", path: &["item"] },
    FeedShape { name: "product", path: &["product"] },
];

/// Download a feed document. Failures here abort the run before any group
/// work starts.
pub async fn fetch(url: &str) -> Result<Vec<u8>, SyncError> {
    info!(url, "[FEED] Downloading feed");
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header(ACCEPT, FEED_ACCEPT)
        .header(USER_AGENT, FEED_USER_AGENT)
        .send()
        .await
        .map_err(SyncError::transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Transport(format!(
            "feed fetch failed: HTTP {status}"
        )));
    }
    let bytes = response.bytes().await.map_err(SyncError::transport)?;
    info!(url, bytes = bytes.len(), "[FEED] Feed downloaded");
    Ok(bytes.to_vec())
}

/// Parse feed bytes into canonical items.
///
/// Malformed markup fails with [`SyncError::Parse`]; a well-formed document
/// in an unrecognized shape yields an empty list.
pub fn parse(bytes: &[u8]) -> Result<Vec<FeedItem>, SyncError> {
    let tree = xml::to_value(bytes)?;
    let entries = locate_entries(&tree);
    let items = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| normalize_entry(entry, index))
        .collect::<Vec<_>>();
    info!(items = items.len(), "[FEED] Parsed feed");
    Ok(items)
}

fn locate_entries(tree: &Value) -> Vec<Value> {
    for shape in FEED_SHAPES {
        if let Some(found) = resolve_path(tree, shape.path) {
            debug!(shape = shape.name, "[FEED] Matched feed shape");
            return as_entry_list(found);
        }
    }

    // Generic scan: first array-of-objects property at the top level, then
    // one level of nesting.
    if let Some(root) = tree.as_object() {
        for (key, value) in root {
            if is_object_array(value) {
                debug!(property = %key, "[FEED] Found entries via generic scan");
                return as_entry_list(value);
            }
            if let Some(nested) = value.as_object() {
                for (nested_key, nested_value) in nested {
                    if is_object_array(nested_value) {
                        debug!(
                            property = %format!("{key}.{nested_key}"),
                            "[FEED] Found entries via generic scan"
                        );
                        return as_entry_list(nested_value);
                    }
                }
            }
        }
    }

    Vec::new()
}

fn resolve_path<'a>(tree: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

fn as_entry_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(entries) => entries.clone(),
        other => vec![other.clone()],
    }
}

fn is_object_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|arr| !arr.is_empty() && arr[0].is_object())
}

/// First non-empty scalar among the given keys. Elements that carried
/// attributes surface their character data under `#text`.
fn text_field(entry: &Value, keys: &[&str]) -> Option<String> {
    let obj = entry.as_object()?;
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get(xml::TEXT_KEY).and_then(scalar_text),
        Value::Array(arr) => arr.iter().find_map(scalar_text),
        _ => None,
    }
}

/// Collect scalar values from a field that may be a single value, a list, or
/// a wrapper element around a list (e.g. `<tags><tag>..</tag></tags>`).
fn collect_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(_) | Value::Number(_) => {
            if let Some(text) = scalar_text(value) {
                out.push(text);
            }
        }
        Value::Array(arr) => {
            for element in arr {
                if let Some(text) = scalar_text(element) {
                    out.push(text);
                }
            }
        }
        Value::Object(obj) => {
            for (key, nested) in obj {
                if key == xml::TEXT_KEY || !key.starts_with(xml::ATTR_PREFIX) {
                    match nested {
                        Value::Array(arr) => {
                            for element in arr {
                                if let Some(text) = scalar_text(element) {
                                    out.push(text);
                                }
                            }
                        }
                        other => {
                            if let Some(text) = scalar_text(other) {
                                out.push(text);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn looks_like_gtin(raw: &str) -> bool {
    raw.len() >= 8 && raw.bytes().all(|b| b.is_ascii_digit())
}

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

fn extract_images(entry: &Value) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(obj) = entry.as_object() {
        for key in ["image_link", "additional_image_link", "image"] {
            if let Some(value) = obj.get(key) {
                collect_scalars(value, &mut candidates);
            }
        }
        if let Some(images) = obj.get("images").and_then(|v| v.as_object()) {
            if let Some(value) = images.get("image") {
                collect_scalars(value, &mut candidates);
            }
        }
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|url| is_http_url(url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn extract_tags(entry: &Value, item_fields: &[Option<&str>]) -> BTreeSet<String> {
    let mut tags: Vec<String> = item_fields
        .iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();

    if let Some(obj) = entry.as_object() {
        for key in ["tags", "categories"] {
            if let Some(value) = obj.get(key) {
                collect_scalars(value, &mut tags);
            }
        }
    }

    tags.into_iter().filter(|t| !t.is_empty()).collect()
}

fn normalize_entry(entry: &Value, index: usize) -> FeedItem {
    let gtin = text_field(entry, &["gtin"]).filter(|g| looks_like_gtin(g));
    let mpn = text_field(entry, &["mpn"]);

    let external_id = text_field(entry, &["id", "@_id"])
        .or_else(|| gtin.clone())
        .or_else(|| text_field(entry, &["sku"]));
    let synthesized_id = external_id.is_none();
    let external_id = external_id.unwrap_or_else(|| format!("product-{index}"));

    let title = text_field(entry, &["title", "name", "description"])
        .unwrap_or_else(|| format!("Product {}", index + 1));
    let description =
        text_field(entry, &["description", "summary", "title"]).unwrap_or_default();

    let price = text_field(entry, &["sale_price", "price", "cost", "amount"])
        .map(|raw| extract_price(&raw))
        .unwrap_or_default();

    // Resolution order is fixed: gtin, then mpn, then the entry's own id.
    // A synthesized placeholder id identifies nothing, so it never becomes
    // a SKU.
    let sku = gtin
        .clone()
        .or_else(|| mpn.clone())
        .or_else(|| (!synthesized_id).then(|| external_id.clone()));

    let vendor = text_field(entry, &["brand", "vendor", "manufacturer"])
        .unwrap_or_else(|| DEFAULT_VENDOR.to_string());
    let category = text_field(entry, &["category", "type", "product_type"])
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let condition_raw = text_field(entry, &["condition"]);
    let availability_raw = text_field(entry, &["availability"]);
    let color = text_field(entry, &["color"]);

    let tags = extract_tags(
        entry,
        &[
            text_field(entry, &["brand"]).as_deref(),
            color.as_deref(),
            condition_raw.as_deref(),
            text_field(entry, &["category"]).as_deref(),
        ],
    );

    FeedItem {
        external_id,
        group_id: text_field(entry, &["item_group_id", "group_id"]),
        title,
        description,
        vendor,
        condition: Condition::from_feed(condition_raw.as_deref()),
        price,
        sku,
        gtin,
        images: extract_images(entry),
        availability: Availability::from_feed(availability_raw.as_deref()),
        color,
        category,
        tags,
    }
}
