//! HTTP client for network-based API calls

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::{ClientError, ClientResult, SessionConfig};

/// Error body returned by the platform API
#[derive(serde::Deserialize)]
struct ApiErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

/// HTTP client for the platform REST API.
///
/// Stateless with respect to credentials: every call takes the bearer token
/// it should present, so one client can be shared by all services.
#[derive(Debug, Clone)]
pub struct NetworkHttpClient {
    client: Client,
    base_url: String,
}

impl NetworkHttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, timeout_secs: u64) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a new HTTP client from configuration
    pub fn from_config(config: &SessionConfig) -> ClientResult<Self> {
        Self::new(&config.base_url, config.timeout)
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ClientResult<T> {
        let request = Self::authorize(self.client.get(self.url(path)), token);
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> ClientResult<T> {
        let request = Self::authorize(self.client.post(self.url(path)).json(body), token);
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request without body, discarding whatever comes back
    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> ClientResult<()> {
        let request = Self::authorize(self.client.post(self.url(path)), token);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    /// Map non-success statuses onto [`ClientError`]
    async fn check_status(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .map(|body| body.message)
            .unwrap_or(text);

        tracing::debug!(status = %status, message = %message, "API request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST => ClientError::Validation(message),
            _ => ClientError::Internal(format!("{status}: {message}")),
        })
    }
}
