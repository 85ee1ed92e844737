//! Inventory REST API client.
//!
//! Serves two read-only lookups:
//! - `GET {base}/products` - the product list offered on the sale form
//! - `GET {base}/products/{id}/batches` - batches of one product

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use batchwise_core::ProductId;

use super::{BatchCatalog, CatalogError};
use crate::config::CatalogConfig;
use crate::models::{Batch, Product};

/// Inventory API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpBatchCatalog {
    inner: Arc<HttpBatchCatalogInner>,
}

struct HttpBatchCatalogInner {
    client: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl HttpBatchCatalog {
    /// Create a new inventory API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| CatalogError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert("Authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBatchCatalogInner {
                client,
                base_url: config.base_url.clone(),
                timeout_secs: config.timeout.as_secs(),
            }),
        })
    }

    /// Fetch every sellable product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on transport failure or a non-success status.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, CatalogError> {
        self.get("products").await
    }

    /// Fetch the batches of one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn batches(&self, product_id: ProductId) -> Result<Vec<Batch>, CatalogError> {
        let batches: Vec<Batch> = self.get(&batches_path(product_id)).await?;
        tracing::debug!(count = batches.len(), "Fetched batches");
        Ok(batches)
    }

    /// Execute a GET request relative to the base URL.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| CatalogError::Parse(format!("Invalid request path {path}: {e}")))?;

        let response = self.inner.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(self.inner.timeout_secs)
            } else {
                CatalogError::Http(e)
            }
        })?;

        self.handle_response(response).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CatalogError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return parse_body(&body);
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the inventory API.
    async fn parse_error(&self, response: reqwest::Response) -> CatalogError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return CatalogError::RateLimited(retry_after);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        error_for_status(status, message)
    }
}

impl BatchCatalog for HttpBatchCatalog {
    async fn batches_for_product(&self, product_id: ProductId) -> Result<Vec<Batch>, CatalogError> {
        self.batches(product_id).await
    }
}

impl std::fmt::Debug for HttpBatchCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBatchCatalog")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn batches_path(product_id: ProductId) -> String {
    format!("products/{product_id}/batches")
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, CatalogError> {
    serde_json::from_str(body)
        .map_err(|e| CatalogError::Parse(format!("Failed to parse response: {e}")))
}

/// Map a non-success status (other than 429) to a catalog error.
fn error_for_status(status: u16, message: String) -> CatalogError {
    match status {
        401 | 403 => CatalogError::Unauthorized,
        404 => CatalogError::NotFound(message),
        _ => CatalogError::Api { status, message },
    }
}
