//! Network retrieval of model files.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use log::{debug, info};
use serde::Serialize;

/// Incremental download progress for one file.
///
/// `total` is the length the server declared for the transfer. With a
/// compressed transfer encoding it can undershoot the decoded byte count,
/// so `received` may legitimately exceed it.
#[derive(Debug, Clone, Serialize)]
pub struct FetchProgress {
    pub filename: String,
    pub received: u64,
    pub total: Option<u64>,
}

impl FetchProgress {
    /// Percentage for display, clamped to 100 so an undershooting declared
    /// total never renders as more than complete.
    pub fn display_percentage(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => ((self.received as f64 / total as f64) * 100.0).min(100.0),
            _ => 0.0,
        }
    }
}

/// The network seam: fetch one file by path, reporting raw progress as
/// `(bytes received, declared total)`.
pub trait AssetFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        path: &'a str,
        progress: &'a mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// HTTP GET fetcher streaming the response body chunk by chunk.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        path: &'a str,
        progress: &'a mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
            debug!("Fetching {}", url);

            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                anyhow::bail!("HTTP {}", response.status());
            }

            let total = response.content_length();
            let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                bytes.extend_from_slice(&chunk);
                progress(bytes.len() as u64, total);
            }

            info!("Fetched {} ({} bytes)", path, bytes.len());
            Ok(bytes)
        })
    }
}
