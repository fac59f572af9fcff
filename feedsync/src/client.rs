//! Concrete [`CatalogClient`] for a Shopify-style Admin GraphQL API.
//!
//! Construct [`AdminClient`] from environment variables (`SHOP_DOMAIN`,
//! `ADMIN_API_TOKEN`); the engine never sees transport details, it just gets
//! back a raw response body to normalize.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::env;

use feedsync_core::contract::{CapabilityError, CatalogClient};
use feedsync_core::response::RawResponse;

const API_VERSION: &str = "2025-04";

pub struct AdminClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl AdminClient {
    pub fn new_from_env() -> Result<Self, CapabilityError> {
        dotenvy::dotenv().ok();
        match (env::var("SHOP_DOMAIN"), env::var("ADMIN_API_TOKEN")) {
            (Ok(shop_domain), Ok(access_token)) => {
                let endpoint = format!(
                    "https://{}/admin/api/{}/graphql.json",
                    shop_domain.trim_end_matches('/'),
                    API_VERSION
                );
                tracing::info!(
                    shop_domain = %shop_domain,
                    token_set = !access_token.is_empty(),
                    "Initialized AdminClient from environment"
                );
                Ok(AdminClient {
                    http: reqwest::Client::new(),
                    endpoint,
                    access_token,
                })
            }
            (Err(e), _) => {
                tracing::error!(error = ?e, "SHOP_DOMAIN missing in environment");
                Err(Box::new(e))
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "ADMIN_API_TOKEN missing in environment");
                Err(Box::new(e))
            }
        }
    }
}

#[async_trait]
impl CatalogClient for AdminClient {
    async fn execute(
        &self,
        operation: &str,
        variables: Value,
    ) -> Result<RawResponse, CapabilityError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(&json!({ "query": operation, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(%status, "Catalog API returned an error status");
            return Err(format!("catalog API error (status {status}): {body}").into());
        }
        Ok(RawResponse::Text(body))
    }
}
