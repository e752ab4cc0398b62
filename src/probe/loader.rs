//! Resource loading used by the availability probe.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::FallbackError;

/// Fetches a single resource; `Ok` means it loaded.
///
/// Implementations do not apply a timeout: the prober races them against
/// its own deadline and drops the future when that fires.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), FallbackError>;
}

/// Loader backed by a real HTTP client.
#[derive(Debug, Clone, Default)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<(), FallbackError> {
        let response = self
            .client
            .get(url)
            .header("user-agent", "cdn-fallback-probe")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(FallbackError::ProbeFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            })
        }
    }
}

/// Append a cache-busting `_=<unix millis>` parameter.
pub fn cache_busted(url: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, millis)
}
