use crate::error::{Error, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Thin capability wrapper over reqwest for upstream metadata endpoints.
///
/// Non-success statuses and malformed payloads surface as `Error::Metadata`.
/// There is no retry or backoff; failures propagate to the caller as-is.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: Client,
}

impl MetadataClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http })
    }

    /// Wrap an existing client (shared connection pool).
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// GET a URL and deserialize its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("GET (json) {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Metadata(format!("HTTP {} from {}", status, url)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Metadata(format!("malformed JSON from {}: {}", url, e)))
    }

    /// GET a URL and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        log::debug!("GET (text) {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Metadata(format!("HTTP {} from {}", status, url)));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn non_success_status_is_a_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = MetadataClient::new().unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("{}/manifest.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Metadata(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn malformed_json_is_a_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = MetadataClient::new().unwrap();
        let err = client
            .get_json::<serde_json::Value>(&format!("{}/manifest.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Metadata(_)), "got {:?}", err);
    }
}
