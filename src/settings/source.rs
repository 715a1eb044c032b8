//! Where the settings document comes from

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::types::OverlaySettings;

/// Source of the full settings document
pub trait SettingsSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, ClientResult<OverlaySettings>>;
}

/// `GET {url}` returning the settings document as JSON
#[derive(Debug, Clone)]
pub struct HttpSettingsSource {
    client: Client,
    url: String,
}

impl HttpSettingsSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SettingsSource for HttpSettingsSource {
    fn fetch(&self) -> BoxFuture<'static, ClientResult<OverlaySettings>> {
        Box::pin(fetch_document(self.client.get(&self.url), self.url.clone()))
    }
}

async fn fetch_document(request: RequestBuilder, url: String) -> ClientResult<OverlaySettings> {
    debug!(%url, "fetching overlay settings");
    let settings = request
        .send()
        .await?
        .error_for_status()?
        .json::<OverlaySettings>()
        .await?;
    Ok(settings)
}
