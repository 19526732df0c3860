//! File API client.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ViewerError};
use crate::file::{FileDescriptor, ListDescriptor};

const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: Client, base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// `GET {api}/file/{id}/info`
    pub async fn file_info(&self, id: &str) -> Result<FileDescriptor> {
        let url = format!("{}/file/{}/info", self.base, id);
        debug!(%url, "fetching file info");
        self.get_json(&url).await
    }

    /// `GET {api}/list/{id}`
    pub async fn list_info(&self, id: &str) -> Result<ListDescriptor> {
        let url = format!("{}/list/{}", self.base, id);
        debug!(%url, "fetching list info");
        let mut list: ListDescriptor = self.get_json(&url).await?;
        if list.id.is_empty() {
            list.id = id.to_string();
        }
        Ok(list)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
