//! HTTP sensor source.

use super::{FetchError, SensorSource};

use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Fetches a JSON array of raw records from one backend endpoint.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpSource {
    /// Create a source for `base_url` joined with `endpoint`.
    pub fn new(base_url: &str, endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/{}", base.trim_end_matches('/'), endpoint.trim_start_matches('/')),
            token,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get_records(&self) -> Result<Vec<Value>, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.map_err(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.json::<Vec<Value>>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl SensorSource for HttpSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
        self.get_records()
    }
}
