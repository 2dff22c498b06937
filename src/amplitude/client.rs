use std::time::Instant;

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, USER_AGENT};
use tracing::{debug, info};

use crate::amplitude::{Batch, UploadRequest};
use crate::config::Config;

pub const UPLOAD_PATH: &str = "/2/httpapi";

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("ingestion API responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to reach ingestion API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends a composed batch to the ingestion API.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, batch: &Batch) -> Result<(), DeliveryError>;
}

/// Reqwest-backed delivery. Both records go out in a single request with the
/// identify record first, so the profile update is applied before the event.
#[derive(Clone, Debug)]
pub struct AmplitudeClient {
    http: reqwest::Client,
    url: String,
    api_key: crate::config::ApiKey,
}

impl AmplitudeClient {
    pub fn new(config: &Config) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(AmplitudeClient {
            http,
            url: format!("{}{}", config.endpoint, UPLOAD_PATH),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Deliver for AmplitudeClient {
    async fn deliver(&self, batch: &Batch) -> Result<(), DeliveryError> {
        let start_time = Instant::now();
        let body = serde_json::to_vec(&UploadRequest::new(self.api_key.token(), batch))?;

        let response = self
            .http
            .post(&self.url)
            .header(
                USER_AGENT,
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            )
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, %body, "ingestion API rejected batch");
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Delivered 2 records to {} in {}ms.",
            self.url,
            start_time.elapsed().as_millis()
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn config(endpoint: &str) -> Config {
        Config {
            api_key: "amp-key".into(),
            endpoint: endpoint.to_string(),
            auth_token: "token".to_string(),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_upload_url() {
        let client = AmplitudeClient::new(&config("https://api2.amplitude.com")).unwrap();
        assert_eq!(client.url(), "https://api2.amplitude.com/2/httpapi");
    }

    #[test]
    fn test_status_error_message() {
        let err = DeliveryError::Status {
            status: 503,
            body: "try later".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ingestion API responded with 503: try later"
        );
    }
}
