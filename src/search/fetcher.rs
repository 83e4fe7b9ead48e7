//! HTTP content fetcher used to pull promising result pages.

use super::ContentFetcher;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::utils::domain::normalize_url;

use async_trait::async_trait;
use reqwest::Client;

/// Fetches page bodies over HTTP with the shared client's timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let target = normalize_url(url)?;
        tracing::debug!(target: "fetch_task", "Fetching {}", target);

        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("fetch of {} failed: {}", target, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "fetch of {} returned HTTP {}",
                target, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("reading body of {} failed: {}", target, e)))?;

        tracing::debug!(target: "fetch_task", "Fetched {} ({} bytes)", target, body.len());
        Ok(body)
    }
}
