//! Azure Blob Storage adapter (REST API with a SAS token)

use async_trait::async_trait;
use bytes::Bytes;
use postsaga_domain::{BlobError, BlobStore};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::blob_fs::validate_key;

const API_VERSION: &str = "2021-08-06";

/// Block blobs in a single container, authorized by a SAS query string
pub struct AzureBlobStore {
    client: Client,
    base_url: String,
    container: String,
    sas_token: SecretString,
}

impl AzureBlobStore {
    /// `base_url` is the account endpoint, e.g. `https://account.blob.core.windows.net`
    pub fn new(
        base_url: impl Into<String>,
        container: impl Into<String>,
        sas_token: SecretString,
    ) -> Result<Self, BlobError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BlobError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            container: container.into(),
            sas_token,
        })
    }

    fn blob_url(&self, key: &str) -> Result<String, BlobError> {
        validate_key(key)?;
        let sas = self.sas_token.expose_secret().trim_start_matches('?');
        let mut url = format!("{}/{}/{}", self.base_url, self.container, key);
        if !sas.is_empty() {
            url.push('?');
            url.push_str(sas);
        }
        Ok(url)
    }

    async fn check(
        &self,
        key: &str,
        operation: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BlobError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Unavailable(format!(
                "Azure {} of {} failed ({}): {}",
                operation, key, status, body
            )));
        }
        Ok(response)
    }
}

fn transport(e: reqwest::Error) -> BlobError {
    if e.is_timeout() {
        BlobError::Unavailable("request timed out".to_string())
    } else {
        BlobError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        let size = data.len();
        let response = self
            .client
            .put(self.blob_url(key)?)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(transport)?;

        self.check(key, "upload", response).await?;
        tracing::debug!(key = %key, size, container = %self.container, "Blob uploaded");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let response = self
            .client
            .get(self.blob_url(key)?)
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(transport)?;

        let response = self.check(key, "download", response).await?;
        response.bytes().await.map_err(transport)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let response = self
            .client
            .delete(self.blob_url(key)?)
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(transport)?;

        self.check(key, "delete", response).await?;
        tracing::debug!(key = %key, container = %self.container, "Blob deleted");
        Ok(())
    }
}
