//! HTTP gifts source
//!
//! Talks to a running service's `/profile-gifts` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::ClientError;
use super::session::GiftsSource;
use crate::api::ProfileGiftsResponse;
use crate::data::AccountHandle;

/// Longer than the service's own process timeout so cold fetches finish
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// [`GiftsSource`] backed by the HTTP API
pub struct HttpGiftsSource {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpGiftsSource {
    /// Create a source for the service at `base_url`
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let endpoint = Url::parse(base_url)?.join("profile-gifts")?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("giftsync/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { endpoint, client })
    }

    fn url_for(&self, handle: &AccountHandle) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("username", handle.as_str());
        url
    }
}

#[async_trait]
impl GiftsSource for HttpGiftsSource {
    async fn load(&self, handle: &AccountHandle) -> Result<ProfileGiftsResponse, ClientError> {
        let response = self.client.get(self.url_for(handle)).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if body.get("success").and_then(serde_json::Value::as_bool) != Some(true) {
            let message = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {status}"));
            return Err(ClientError::Api(message));
        }

        serde_json::from_value(body).map_err(|e| ClientError::Api(format!("Malformed response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_query_against_base_path() {
        let source = HttpGiftsSource::new("http://127.0.0.1:8080/api/").unwrap();
        let url = source.url_for(&AccountHandle::parse("@Alice").unwrap());
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/profile-gifts?username=alice");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            HttpGiftsSource::new("not a url"),
            Err(ClientError::Url(_))
        ));
    }
}
