//! The HTTP client driver (spec §4.8): consumes another engine's HTTP
//! surface as if it were a local backend, issuing the inverse of every
//! request the server side handles.

use super::{Driver, Options};
use crate::error::{Result, StoreError};
use crate::http::RAW_CONTENT_TYPE;
use crate::value::Meta;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// Talks to a remote unistore HTTP surface. Keys map onto URL paths with
/// `:` rewritten to `/`; raw reads/writes negotiate via `Accept` /
/// `Content-Type: application/octet-stream`.
///
/// # Example
///
/// ```
/// use unistore::driver::ClientDriver;
///
/// let driver = ClientDriver::new("http://localhost:8080".to_string());
/// ```
pub struct ClientDriver {
    base_url: String,
    client: Client,
    bearer_token: Option<String>,
}

impl ClientDriver {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = Some(token);
        self
    }

    fn url_for(&self, key: &str, trailing_slash: bool) -> String {
        let path = key.replace(':', "/");
        if trailing_slash {
            format!("{}/{}/", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn map_status(status: StatusCode) -> StoreError {
        match status.as_u16() {
            401 => StoreError::AuthDenied(status.to_string()),
            400..=499 => StoreError::InvalidKey(status.to_string()),
            _ => StoreError::BackendFailure(status.to_string()),
        }
    }
}

#[async_trait]
impl Driver for ClientDriver {
    async fn has(&self, key: &str, _opts: &Options) -> Result<bool> {
        let resp = self
            .request(reqwest::Method::HEAD, self.url_for(key, false))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        Ok(resp.status() != StatusCode::NOT_FOUND)
    }

    async fn get(&self, key: &str, _opts: &Options) -> Result<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, self.url_for(key, false))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        Ok(Some(resp.text().await.map_err(|e| StoreError::BackendFailure(e.to_string()))?))
    }

    async fn get_raw(&self, key: &str, _opts: &Options) -> Result<Option<Vec<u8>>> {
        let resp = self
            .request(reqwest::Method::GET, self.url_for(key, false))
            .header(reqwest::header::ACCEPT, RAW_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        let bytes = resp.bytes().await.map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: &str, opts: &Options) -> Result<()> {
        let mut req = self.request(reqwest::Method::PUT, self.url_for(key, false)).body(value.to_string());
        if let Some(ttl) = opts.ttl() {
            req = req.header("X-TTL", ttl.to_string());
        }
        let resp = req.send().await.map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        Ok(())
    }

    async fn set_raw(&self, key: &str, bytes: &[u8], opts: &Options) -> Result<()> {
        let mut req = self
            .request(reqwest::Method::PUT, self.url_for(key, false))
            .header(reqwest::header::CONTENT_TYPE, RAW_CONTENT_TYPE)
            .body(bytes.to_vec());
        if let Some(ttl) = opts.ttl() {
            req = req.header("X-TTL", ttl.to_string());
        }
        let resp = req.send().await.map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        Ok(())
    }

    async fn remove(&self, key: &str, _opts: &Options) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, self.url_for(key, false))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(Self::map_status(resp.status()));
        }
        Ok(())
    }

    async fn get_meta(&self, key: &str, _opts: &Options) -> Result<Option<Meta>> {
        let resp = self
            .request(reqwest::Method::HEAD, self.url_for(key, false))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let mut meta = Meta::new();
        if let Some(last_modified) = resp.headers().get(reqwest::header::LAST_MODIFIED) {
            if let Ok(text) = last_modified.to_str() {
                if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(text) {
                    meta = meta.with("mtime", parsed.timestamp());
                }
            }
        }
        if let Some(ttl) = resp.headers().get("X-TTL") {
            if let Ok(text) = ttl.to_str() {
                if let Ok(secs) = text.parse::<i64>() {
                    meta = meta.with("ttl", secs);
                }
            }
        }
        Ok(Some(meta))
    }

    async fn list_keys(&self, base: &str, _opts: &Options) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, self.url_for(base, true))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        let paths: Vec<String> =
            resp.json().await.map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        Ok(paths.into_iter().map(|p| p.replace('/', ":")).collect())
    }

    async fn clear(&self, base: &str, _opts: &Options) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, self.url_for(base, true))
            .send()
            .await
            .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_maps_colons_to_slashes() {
        let driver = ClientDriver::new("http://localhost:8080".to_string());
        assert_eq!(driver.url_for("users:1", false), "http://localhost:8080/users/1");
    }

    #[test]
    fn url_for_base_adds_trailing_slash() {
        let driver = ClientDriver::new("http://localhost:8080".to_string());
        assert_eq!(driver.url_for("users", true), "http://localhost:8080/users/");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let driver = ClientDriver::new("http://localhost:8080/".to_string());
        assert_eq!(driver.url_for("a", false), "http://localhost:8080/a");
    }

    #[test]
    fn status_mapping_distinguishes_client_and_server_errors() {
        assert!(matches!(
            ClientDriver::map_status(StatusCode::UNAUTHORIZED),
            StoreError::AuthDenied(_)
        ));
        assert!(matches!(
            ClientDriver::map_status(StatusCode::BAD_REQUEST),
            StoreError::InvalidKey(_)
        ));
        assert!(matches!(
            ClientDriver::map_status(StatusCode::BAD_GATEWAY),
            StoreError::BackendFailure(_)
        ));
    }
}
