//! HTTP client for unary methods.

use crate::error::ClientError;
use apiserve_domain::ApiError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Calls unary methods of one apiserve server
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:8081`)
    pub fn new(base_url: &str) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing `reqwest` client
    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `req` as JSON to `path` and decode the reply.
    ///
    /// A non-200 response is decoded as an [`ApiError`] and returned as
    /// [`ClientError::Api`].
    pub async fn call<Req, Rsp>(&self, path: &str, req: &Req) -> Result<Rsp, ClientError>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_vec(req)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!("POST {} -> {}", url, status);

        if status != StatusCode::OK {
            return Err(match serde_json::from_slice::<ApiError>(&bytes) {
                Ok(err) => ClientError::Api(err),
                Err(_) => ClientError::Http(format!(
                    "HTTP {}: {}",
                    status,
                    String::from_utf8_lossy(&bytes)
                )),
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(Client::new("http://localhost:8081/").base_url(), "http://localhost:8081");
        assert_eq!(Client::new("http://localhost:8081").base_url(), "http://localhost:8081");
    }
}
