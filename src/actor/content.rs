//! One-shot fetch of the artist content bundle.
//!
//! Failures never reach the user: the caller keeps the bundled content and
//! logs why the remote bundle was not used.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::common::config::Settings;
use crate::model::content::ArtistContent;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("malformed content: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("fetch aborted")]
    Aborted,
}

pub type ContentFuture = Pin<Box<dyn Future<Output = Result<ArtistContent, ContentError>> + Send>>;

pub trait ContentSource: Send + Sync {
    fn fetch(&self) -> ContentFuture;
}

#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    url: String,
}

impl HttpContentSource {
    pub fn new(url: impl Into<String>) -> Result<Self, ContentError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client, url: url.into() })
    }
}

impl ContentSource for HttpContentSource {
    fn fetch(&self) -> ContentFuture {
        let request = self.client.get(&self.url);
        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ContentError::Status(status));
            }
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
    }
}

/// The remote source named in the config, if there is one.
pub fn configured_source(settings: &Settings) -> Option<Arc<dyn ContentSource>> {
    let url = settings.content_url.as_deref()?;
    match HttpContentSource::new(url) {
        Ok(source) => Some(Arc::new(source)),
        Err(e) => {
            warn!("remote content disabled: {e}");
            None
        }
    }
}

/// Fetches from `source` unless `token` is cancelled first.
#[instrument(name = "content", skip_all)]
pub async fn load(source: &dyn ContentSource, token: CancellationToken) -> Result<ArtistContent, ContentError> {
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => Err(ContentError::Aborted),
        result = source.fetch() => result,
    };
    debug!(ok = result.is_ok(), "content fetch finished");
    result
}
