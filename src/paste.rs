use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::PasteConfig;

#[derive(Debug, Error)]
pub enum PasteError {
    #[error("paste request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("paste service answered with status {0}")]
    Status(StatusCode),
    #[error("paste service response has no url")]
    MissingUrl,
}

/// Hosts long text somewhere reachable and hands back a link to it.
#[async_trait]
pub trait PasteService: Send + Sync {
    async fn upload(&self, content: &str) -> Result<String, PasteError>;
}

#[derive(Debug, Serialize)]
struct PasteRequest<'a> {
    content: &'a str,
    filename: &'a str,
}

#[derive(Debug, Deserialize)]
struct PasteResponse {
    url: Option<String>,
}

pub struct PasteClient {
    client: Client,
    endpoint: Url,
    filename: String,
}

impl PasteClient {
    pub fn new(config: &PasteConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(&config.endpoint)?,
            filename: config.filename.clone(),
        })
    }
}

#[async_trait]
impl PasteService for PasteClient {
    async fn upload(&self, content: &str) -> Result<String, PasteError> {
        debug!(
            "uploading {} characters to paste service {}",
            content.chars().count(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&PasteRequest {
                content,
                filename: &self.filename,
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PasteError::Status(status));
        }

        let body: PasteResponse = response.json().await?;
        match body.url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(PasteError::MissingUrl),
        }
    }
}
