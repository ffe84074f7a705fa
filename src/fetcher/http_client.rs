use crate::config::PricesConfig;
use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &PricesConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Yahoo hands out a consent cookie on first contact
            .cookie_store(true)
            .build()?;

        Ok(Self { inner })
    }

    /// Fetch a URL and decode its JSON body. Failures are returned, not retried.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &url::Url) -> Result<T> {
        debug!("GET {}", url);

        let resp = self.inner.get(url.as_str()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
