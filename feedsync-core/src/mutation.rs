//! Executes create/update/delete decisions against the remote catalog.
//!
//! Every remote call goes through one retry wrapper: transport failures are
//! retried with capped exponential backoff (base * 2^(attempt-1), fixed
//! attempt ceiling), while remote-reported errors (request-level or
//! field-level `userErrors`) surface immediately as
//! [`SyncError::Mutation`]. Either way the error stops at the calling group
//! task; it never aborts a run.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::contract::{CatalogClient, ProductMapping, RemoteProduct};
use crate::error::SyncError;
use crate::feed::FeedItem;
use crate::group::VariantGroup;
use crate::response::{normalize_response, user_errors, GraphQlResult};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub const PRODUCT_CREATE: &str = r#"
mutation productCreate($product: ProductCreateInput!) {
  productCreate(product: $product) {
    product {
      id
      title
      handle
      status
      variants(first: 1) {
        edges {
          node {
            id
          }
        }
      }
    }
    userErrors {
      field
      message
    }
  }
}"#;

pub const PRODUCT_UPDATE: &str = r#"
mutation productUpdate($product: ProductUpdateInput!) {
  productUpdate(product: $product) {
    product {
      id
      title
      handle
    }
    userErrors {
      field
      message
    }
  }
}"#;

pub const PRODUCT_DELETE: &str = r#"
mutation productDelete($input: ProductDeleteInput!) {
  productDelete(input: $input) {
    deletedProductId
    userErrors {
      field
      message
    }
  }
}"#;

pub const VARIANTS_BULK_CREATE: &str = r#"
mutation productVariantsBulkCreate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {
  productVariantsBulkCreate(productId: $productId, variants: $variants) {
    productVariants {
      id
      title
    }
    userErrors {
      field
      message
    }
  }
}"#;

pub const VARIANTS_BULK_UPDATE: &str = r#"
mutation productVariantsBulkUpdate($productId: ID!, $variants: [ProductVariantsBulkInput!]!) {
  productVariantsBulkUpdate(productId: $productId, variants: $variants) {
    productVariants {
      id
      price
      sku
    }
    userErrors {
      field
      message
    }
  }
}"#;

pub const MEDIA_CREATE: &str = r#"
mutation productCreateMedia($productId: ID!, $media: [CreateMediaInput!]!) {
  productCreateMedia(productId: $productId, media: $media) {
    media {
      mediaContentType
      status
    }
    userErrors: mediaUserErrors {
      field
      message
    }
  }
}"#;

/// Result of creating a product for a group.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub product_id: String,
    pub variants_created: usize,
}

/// Result of reconciling a group against an existing product.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing changed (single-variant group with an unchanged price).
    Skipped,
    Updated {
        variants_updated: usize,
        variants_created: usize,
    },
}

pub struct MutationExecutor<C> {
    client: Arc<C>,
    retry_count: u32,
    base_delay: Duration,
}

impl<C: CatalogClient> MutationExecutor<C> {
    pub fn new(client: Arc<C>, config: &SyncConfig) -> Self {
        Self {
            client,
            retry_count: config.retry_count.max(1),
            base_delay: config.retry_base_delay(),
        }
    }

    /// Execute an operation, retrying transport failures with capped
    /// exponential backoff. Remote-reported errors are not retried.
    pub async fn call(
        &self,
        label: &str,
        operation: &str,
        variables: Value,
    ) -> Result<GraphQlResult, SyncError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.execute(operation, variables.clone()).await {
                Ok(raw) => {
                    let result = normalize_response(raw)?;
                    if !result.is_ok() {
                        let message = result
                            .errors
                            .iter()
                            .map(|e| e.message.clone())
                            .collect::<Vec<_>>()
                            .join(", ");
                        warn!(label, error = %message, "[MUTATE] Remote reported errors");
                        return Err(SyncError::Mutation {
                            field: None,
                            message,
                        });
                    }
                    return Ok(result);
                }
                Err(err) if attempt < self.retry_count => {
                    let backoff = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1))
                        .min(MAX_BACKOFF);
                    warn!(
                        label,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "[MUTATE] Transport failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    return Err(SyncError::Transport(format!(
                        "{label} failed after {attempt} attempts: {err}"
                    )));
                }
            }
        }
    }

    /// Create a new product for the group, then its variants, SKUs and
    /// images.
    pub async fn create(&self, group: &VariantGroup) -> Result<CreateOutcome, SyncError> {
        let master = group.master();
        if master.price <= Decimal::ZERO {
            return Err(SyncError::Validation(format!(
                "refusing to create \"{}\": price must be positive, got {}",
                master.title, master.price
            )));
        }

        let mut product = json!({
            "title": master.title,
            "descriptionHtml": master.description,
            "vendor": master.vendor,
            "productType": master.category,
            "status": "ACTIVE",
            "tags": group_tags(group),
        });
        if group.is_multi_variant() {
            product["productOptions"] = option_schema(group);
        }

        let result = self
            .call("productCreate", PRODUCT_CREATE, json!({ "product": product }))
            .await?;
        ensure_no_user_errors(&result, "productCreate")?;

        let created = &result.data["productCreate"]["product"];
        let product_id = created["id"]
            .as_str()
            .ok_or_else(|| {
                SyncError::ResponseFormat("productCreate returned no product id".into())
            })?
            .to_string();
        info!(product_id = %product_id, title = %master.title, "[MUTATE] Product created");

        // The create mutation leaves the default variant without price or
        // identifiers; push them in a follow-up. Failures here degrade the
        // record but the product exists, so log and carry on.
        if let Some(default_variant_id) = created
            .pointer("/variants/edges/0/node/id")
            .and_then(|id| id.as_str())
        {
            let variant = variant_update_input(default_variant_id, master);
            if let Err(err) = self
                .bulk_variant_update(&product_id, vec![variant])
                .await
            {
                warn!(product_id = %product_id, error = %err, "[MUTATE] Default variant update failed");
            }
        }

        let mut variants_created = 1;
        if group.is_multi_variant() {
            variants_created += self.add_variants(&product_id, group.non_master()).await?;
        }

        self.attach_images(&product_id, unique_images(group.items.iter()))
            .await;

        Ok(CreateOutcome {
            product_id,
            variants_created,
        })
    }

    /// Reconcile a group against an existing remote product.
    ///
    /// `last_price` is the tracked price from the previous run; a
    /// single-variant group whose price is unchanged is a no-op and is not
    /// counted as an update.
    pub async fn update(
        &self,
        existing: &RemoteProduct,
        group: &VariantGroup,
        last_price: Option<Decimal>,
    ) -> Result<UpdateOutcome, SyncError> {
        let master = group.master();

        if !group.is_multi_variant() && last_price == Some(master.price) {
            debug!(product_id = %existing.id, "[MUTATE] Price unchanged, skipping");
            return Ok(UpdateOutcome::Skipped);
        }

        // Base attributes: title, vendor, description, and the union of
        // remote and feed tags.
        let mut tags: BTreeSet<String> = existing.tags.iter().cloned().collect();
        tags.extend(group_tags(group));
        let result = self
            .call(
                "productUpdate",
                PRODUCT_UPDATE,
                json!({ "product": {
                    "id": existing.id,
                    "title": master.title,
                    "descriptionHtml": master.description,
                    "vendor": master.vendor,
                    "tags": tags.into_iter().collect::<Vec<_>>(),
                }}),
            )
            .await?;
        ensure_no_user_errors(&result, "productUpdate")?;

        let (variants_updated, variants_created) = if group.is_multi_variant() {
            self.reconcile_variants(existing, group).await?
        } else {
            self.update_default_variant(existing, master).await?
        };

        let missing_images: Vec<String> = unique_images(group.items.iter())
            .into_iter()
            .filter(|url| !existing.images.contains(url))
            .collect();
        self.attach_images(&existing.id, missing_images).await;

        Ok(UpdateOutcome::Updated {
            variants_updated,
            variants_created,
        })
    }

    /// Remove a previously-created product from the remote catalog. The
    /// caller marks the local mapping inactive afterwards.
    pub async fn remove(&self, mapping: &ProductMapping) -> Result<(), SyncError> {
        let result = self
            .call(
                "productDelete",
                PRODUCT_DELETE,
                json!({ "input": { "id": mapping.remote_product_id } }),
            )
            .await?;
        ensure_no_user_errors(&result, "productDelete")?;
        info!(
            product_id = %mapping.remote_product_id,
            title = %mapping.title,
            "[MUTATE] Product deleted"
        );
        Ok(())
    }

    /// Push price/sku/barcode to the existing default variant, only when
    /// something actually differs.
    async fn update_default_variant(
        &self,
        existing: &RemoteProduct,
        master: &FeedItem,
    ) -> Result<(usize, usize), SyncError> {
        let Some(current) = existing.default_variant() else {
            return Ok((0, 0));
        };
        let changed = current.price != master.price
            || (master.sku.is_some() && current.sku != master.sku)
            || (master.gtin.is_some() && current.barcode != master.gtin);
        if !changed {
            return Ok((0, 0));
        }
        self.bulk_variant_update(&existing.id, vec![variant_update_input(&current.id, master)])
            .await?;
        Ok((1, 0))
    }

    /// Match incoming variants against the existing product: matched ones
    /// are updated in place, unmatched ones are added.
    async fn reconcile_variants(
        &self,
        existing: &RemoteProduct,
        group: &VariantGroup,
    ) -> Result<(usize, usize), SyncError> {
        let mut updates = Vec::new();
        let mut additions: Vec<&FeedItem> = Vec::new();

        for item in &group.items {
            match existing.find_variant(item.sku.as_deref(), item.gtin.as_deref()) {
                Some(current) => {
                    if current.price != item.price
                        || (item.gtin.is_some() && current.barcode != item.gtin)
                    {
                        updates.push(variant_update_input(&current.id, item));
                    }
                }
                None => additions.push(item),
            }
        }

        let variants_updated = updates.len();
        if !updates.is_empty() {
            self.bulk_variant_update(&existing.id, updates).await?;
        }
        let variants_created = if additions.is_empty() {
            0
        } else {
            self.add_variants(&existing.id, additions.into_iter())
                .await?
        };
        Ok((variants_updated, variants_created))
    }

    /// Add variants in one bulk call, then assign their SKUs. The bulk
    /// create input does not accept SKU in the targeted API version, so the
    /// assignment is a follow-up update keyed by the returned variant ids.
    async fn add_variants(
        &self,
        product_id: &str,
        items: impl Iterator<Item = &FeedItem>,
    ) -> Result<usize, SyncError> {
        let items: Vec<&FeedItem> = items.collect();
        if items.is_empty() {
            return Ok(0);
        }

        let variants: Vec<Value> = items.iter().map(|item| variant_create_input(item)).collect();
        let result = self
            .call(
                "productVariantsBulkCreate",
                VARIANTS_BULK_CREATE,
                json!({ "productId": product_id, "variants": variants }),
            )
            .await?;
        ensure_no_user_errors(&result, "productVariantsBulkCreate")?;

        let created_ids: Vec<String> = result.data["productVariantsBulkCreate"]
            ["productVariants"]
            .as_array()
            .map(|variants| {
                variants
                    .iter()
                    .filter_map(|v| v.get("id"))
                    .filter_map(|id| id.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let sku_updates: Vec<Value> = created_ids
            .iter()
            .zip(items.iter())
            .filter_map(|(id, item)| {
                item.sku
                    .as_ref()
                    .map(|sku| json!({ "id": id, "sku": sku }))
            })
            .collect();
        if !sku_updates.is_empty() {
            if let Err(err) = self.bulk_variant_update(product_id, sku_updates).await {
                warn!(product_id, error = %err, "[MUTATE] SKU assignment failed");
            }
        }

        Ok(items.len())
    }

    async fn bulk_variant_update(
        &self,
        product_id: &str,
        variants: Vec<Value>,
    ) -> Result<(), SyncError> {
        let result = self
            .call(
                "productVariantsBulkUpdate",
                VARIANTS_BULK_UPDATE,
                json!({ "productId": product_id, "variants": variants }),
            )
            .await?;
        ensure_no_user_errors(&result, "productVariantsBulkUpdate")
    }

    /// Attach images one call per URL so a single bad URL cannot sink the
    /// rest. Failures are logged, never fatal to the product.
    async fn attach_images(&self, product_id: &str, urls: Vec<String>) {
        for url in urls {
            let outcome = self
                .call(
                    "productCreateMedia",
                    MEDIA_CREATE,
                    json!({ "productId": product_id, "media": [{
                        "originalSource": url,
                        "mediaContentType": "IMAGE",
                    }]}),
                )
                .await
                .and_then(|result| ensure_no_user_errors(&result, "productCreateMedia"));
            if let Err(err) = outcome {
                warn!(product_id, url = %url, error = %err, "[MUTATE] Image attach failed");
            }
        }
    }
}

fn ensure_no_user_errors(result: &GraphQlResult, mutation: &str) -> Result<(), SyncError> {
    let errors = user_errors(&result.data, mutation);
    match errors.first() {
        None => Ok(()),
        Some(first) => Err(SyncError::Mutation {
            field: first.field.clone(),
            message: errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Unique URL-valid images across the given items, feed order preserved.
fn unique_images<'a>(items: impl Iterator<Item = &'a FeedItem>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for item in items {
        for url in &item.images {
            if (url.starts_with("http://") || url.starts_with("https://"))
                && seen.insert(url.clone())
            {
                urls.push(url.clone());
            }
        }
    }
    urls
}

fn group_tags(group: &VariantGroup) -> Vec<String> {
    let tags: BTreeSet<&String> = group.items.iter().flat_map(|item| &item.tags).collect();
    tags.into_iter().cloned().collect()
}

fn variant_update_input(variant_id: &str, item: &FeedItem) -> Value {
    let mut input = json!({
        "id": variant_id,
        "price": item.price.to_string(),
    });
    if let Some(sku) = &item.sku {
        input["sku"] = json!(sku);
    }
    if let Some(gtin) = &item.gtin {
        input["barcode"] = json!(gtin);
    }
    input
}

fn variant_create_input(item: &FeedItem) -> Value {
    let mut input = json!({
        "price": item.price.to_string(),
        "optionValues": [
            { "optionName": "Capacity", "name": capacity_label(&item.title) },
            { "optionName": "Condition", "name": item.condition.label() },
        ],
    });
    if let Some(color) = &item.color {
        input["optionValues"]
            .as_array_mut()
            .expect("optionValues is an array")
            .push(json!({ "optionName": "Color", "name": color }));
    }
    if let Some(gtin) = &item.gtin {
        input["barcode"] = json!(gtin);
    }
    input
}

static CAPACITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+\s?(GB|TB|ML|L)\b").expect("static capacity regex"));

/// Size token from a title, e.g. "750ML" out of "Steel Bottle 750ML".
fn capacity_label(title: &str) -> String {
    CAPACITY
        .find(title)
        .map(|m| m.as_str().replace(' ', "").to_uppercase())
        .unwrap_or_else(|| "Standard".to_string())
}

/// Option schema for a multi-variant create: Capacity and Condition always,
/// Color only when the group actually varies by color.
fn option_schema(group: &VariantGroup) -> Value {
    let mut capacities: Vec<String> = Vec::new();
    let mut conditions: Vec<&str> = Vec::new();
    for item in &group.items {
        let capacity = capacity_label(&item.title);
        if !capacities.contains(&capacity) {
            capacities.push(capacity);
        }
        let condition = item.condition.label();
        if !conditions.contains(&condition) {
            conditions.push(condition);
        }
    }

    let mut options = vec![
        json!({
            "name": "Capacity",
            "values": capacities.iter().map(|c| json!({ "name": c })).collect::<Vec<_>>(),
        }),
        json!({
            "name": "Condition",
            "values": conditions.iter().map(|c| json!({ "name": c })).collect::<Vec<_>>(),
        }),
    ];

    let colors = group.distinct_colors();
    if colors.len() >= 2 {
        options.push(json!({
            "name": "Color",
            "values": colors.iter().map(|c| json!({ "name": c })).collect::<Vec<_>>(),
        }));
    }
    Value::Array(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockCatalogClient, RemoteVariant};
    use crate::feed::{Availability, Condition};
    use crate::group::group_items;
    use crate::response::RawResponse;
    use std::time::Instant;

    fn item(id: &str, group: Option<&str>, price: &str, color: Option<&str>, title: &str) -> FeedItem {
        FeedItem {
            external_id: id.to_string(),
            group_id: group.map(str::to_string),
            title: title.to_string(),
            description: "desc".to_string(),
            vendor: "Acme".to_string(),
            condition: Condition::New,
            price: price.parse().unwrap(),
            sku: Some(format!("SKU-{id}")),
            gtin: None,
            images: vec![],
            availability: Availability::InStock,
            color: color.map(str::to_string),
            category: "General".to_string(),
            tags: BTreeSet::new(),
        }
    }

    fn config_with_fast_retries() -> SyncConfig {
        SyncConfig {
            retry_count: 3,
            retry_base_delay_ms: 20,
            ..SyncConfig::default()
        }
    }

    fn create_response(product_id: &str) -> RawResponse {
        RawResponse::Value(json!({"data": {"productCreate": {
            "product": {
                "id": product_id,
                "title": "T",
                "handle": "t",
                "status": "ACTIVE",
                "variants": {"edges": [{"node": {"id": "gid://variant/1"}}]}
            },
            "userErrors": []
        }}}))
    }

    fn ok_response(mutation: &str) -> RawResponse {
        RawResponse::Value(json!({"data": { mutation: { "userErrors": [] }}}))
    }

    #[test]
    fn capacity_label_matches_size_tokens() {
        assert_eq!(capacity_label("Steel Bottle 750ML"), "750ML");
        assert_eq!(capacity_label("SSD Drive 2 TB black"), "2TB");
        assert_eq!(capacity_label("Plain Mug"), "Standard");
    }

    #[test]
    fn option_schema_includes_color_only_when_varied() {
        let uniform = group_items(vec![
            item("a", Some("G"), "10", Some("Red"), "Bottle 500ML"),
            item("b", Some("G"), "12", Some("Red"), "Bottle 750ML"),
        ]);
        let schema = option_schema(&uniform[0]);
        let names: Vec<&str> = schema
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Capacity", "Condition"]);

        let varied = group_items(vec![
            item("a", Some("G"), "10", Some("Red"), "Bottle 500ML"),
            item("b", Some("G"), "12", Some("Blue"), "Bottle 750ML"),
        ]);
        let schema = option_schema(&varied[0]);
        let names: Vec<&str> = schema
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Capacity", "Condition", "Color"]);
    }

    #[tokio::test]
    async fn non_positive_price_fails_validation_without_remote_call() {
        let client = MockCatalogClient::new(); // any call would panic
        let executor = MutationExecutor::new(Arc::new(client), &SyncConfig::default());
        let groups = group_items(vec![item("a", None, "0", None, "Freebie")]);
        let err = executor.create(&groups[0]).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn transport_failures_retry_then_succeed() {
        let mut client = MockCatalogClient::new();
        let mut calls = 0;
        client.expect_execute().returning(move |op, _| {
            if op.contains("productCreate(") {
                calls += 1;
                if calls < 3 {
                    return Err("connection reset".into());
                }
                return Ok(create_response("gid://product/1"));
            }
            Ok(ok_response("productVariantsBulkUpdate"))
        });

        let config = config_with_fast_retries();
        let executor = MutationExecutor::new(Arc::new(client), &config);
        let groups = group_items(vec![item("a", None, "9.99", None, "Widget")]);

        let started = Instant::now();
        let outcome = executor.create(&groups[0]).await.unwrap();
        assert_eq!(outcome.product_id, "gid://product/1");
        assert_eq!(outcome.variants_created, 1);
        // Two backoffs: base and 2*base.
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_a_transport_error() {
        let mut client = MockCatalogClient::new();
        client
            .expect_execute()
            .times(3)
            .returning(|_, _| Err("gateway timeout".into()));

        let config = config_with_fast_retries();
        let executor = MutationExecutor::new(Arc::new(client), &config);
        let groups = group_items(vec![item("a", None, "9.99", None, "Widget")]);
        let err = executor.create(&groups[0]).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[tokio::test]
    async fn user_errors_become_mutation_errors_without_retry() {
        let mut client = MockCatalogClient::new();
        client.expect_execute().times(1).returning(|_, _| {
            Ok(RawResponse::Value(json!({"data": {"productCreate": {
                "product": null,
                "userErrors": [{"field": ["product", "title"], "message": "Title taken"}]
            }}})))
        });

        let executor = MutationExecutor::new(Arc::new(client), &SyncConfig::default());
        let groups = group_items(vec![item("a", None, "9.99", None, "Widget")]);
        match executor.create(&groups[0]).await.unwrap_err() {
            SyncError::Mutation { field, message } => {
                assert_eq!(field.as_deref(), Some("product.title"));
                assert!(message.contains("Title taken"));
            }
            other => panic!("expected mutation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unchanged_price_short_circuits_update() {
        let client = MockCatalogClient::new(); // any call would panic
        let executor = MutationExecutor::new(Arc::new(client), &SyncConfig::default());
        let groups = group_items(vec![item("a", None, "9.99", None, "Widget")]);
        let existing = RemoteProduct {
            id: "gid://product/1".into(),
            title: "Widget".into(),
            vendor: "Acme".into(),
            description: String::new(),
            tags: vec![],
            variants: vec![RemoteVariant {
                id: "gid://variant/1".into(),
                sku: Some("SKU-a".into()),
                barcode: None,
                price: "9.99".parse().unwrap(),
            }],
            images: vec![],
        };
        let outcome = executor
            .update(&existing, &groups[0], Some("9.99".parse().unwrap()))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Skipped);
    }

    #[tokio::test]
    async fn variant_group_update_matches_by_sku_and_adds_the_rest() {
        let mut client = MockCatalogClient::new();
        client.expect_execute().returning(|op, vars| {
            if op.contains("productUpdate(") {
                Ok(ok_response("productUpdate"))
            } else if op.contains("productVariantsBulkCreate(") {
                let count = vars["variants"].as_array().unwrap().len();
                assert_eq!(count, 1, "only the unmatched variant is added");
                Ok(RawResponse::Value(json!({"data": {"productVariantsBulkCreate": {
                    "productVariants": [{"id": "gid://variant/new"}],
                    "userErrors": []
                }}})))
            } else {
                Ok(ok_response("productVariantsBulkUpdate"))
            }
        });

        let executor = MutationExecutor::new(Arc::new(client), &SyncConfig::default());
        let groups = group_items(vec![
            item("a", Some("G"), "9.99", None, "Widget 500ML"),
            item("b", Some("G"), "12.99", None, "Widget 750ML"),
        ]);
        let existing = RemoteProduct {
            id: "gid://product/1".into(),
            title: "Widget".into(),
            vendor: "Acme".into(),
            description: String::new(),
            tags: vec![],
            variants: vec![RemoteVariant {
                id: "gid://variant/1".into(),
                sku: Some("SKU-a".into()),
                barcode: None,
                price: "8.00".parse().unwrap(), // stale price forces an update
            }],
            images: vec![],
        };
        let outcome = executor.update(&existing, &groups[0], None).await.unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                variants_updated: 1,
                variants_created: 1,
            }
        );
    }

    #[tokio::test]
    async fn image_failures_do_not_fail_the_create() {
        let mut client = MockCatalogClient::new();
        client.expect_execute().returning(|op, _| {
            if op.contains("productCreateMedia(") {
                return Err("media service down".into());
            }
            if op.contains("productCreate(") {
                return Ok(create_response("gid://product/9"));
            }
            Ok(ok_response("productVariantsBulkUpdate"))
        });

        let config = SyncConfig {
            retry_count: 1,
            retry_base_delay_ms: 1,
            ..SyncConfig::default()
        };
        let executor = MutationExecutor::new(Arc::new(client), &config);
        let mut feed_item = item("a", None, "9.99", None, "Widget");
        feed_item.images = vec!["https://cdn.example/1.jpg".into()];
        let groups = group_items(vec![feed_item]);
        let outcome = executor.create(&groups[0]).await.unwrap();
        assert_eq!(outcome.product_id, "gid://product/9");
    }
}
