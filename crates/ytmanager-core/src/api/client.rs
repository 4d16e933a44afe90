//! API client for the ytmanager backend.
//!
//! Only the auth endpoints are typed here. Everything else the backend
//! serves goes through `get`/`post`, which attach the bearer token.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::Role;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Backend address used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a client that authenticates every request with `token`,
    /// sharing this client's connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Auth endpoints =====

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let response: LoginResponse = self
            .post("/login", &LoginRequest { email, password })
            .await
            .context("Login failed")?;
        debug!(email, "Received login token");
        Ok(response.token)
    }

    /// Create an account. The backend does not log the new user in.
    pub async fn signup(&self, request: &SignupRequest) -> Result<String> {
        let response: MessageResponse = self
            .post("/signup", request)
            .await
            .context("Signup failed")?;
        Ok(response.message)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("/").await
    }

    // ===== Generic requests =====

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send the request built by `build`, retrying with exponential backoff
    /// while the backend answers 429.
    async fn send<T, F>(&self, url: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.send(&url, || self.client.get(&url)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        self.send(&url, || self.client.post(&url).json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/login"), "http://localhost:8080/login");
        assert_eq!(client.url("projects/recent"), "http://localhost:8080/projects/recent");
        assert_eq!(client.url("/"), "http://localhost:8080/");
    }

    #[test]
    fn test_with_token_sets_bearer_header() {
        let anonymous = ApiClient::new(DEFAULT_API_BASE_URL).unwrap();
        assert!(!anonymous.has_token());
        assert!(anonymous.auth_headers().unwrap().is_empty());

        let authed = anonymous.with_token("abc.def.ghi");
        assert!(authed.has_token());
        let headers = authed.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc.def.ghi");
    }

    #[test]
    fn test_invalid_token_header_is_error() {
        let client = ApiClient::new(DEFAULT_API_BASE_URL)
            .unwrap()
            .with_token("bad\ntoken");
        assert!(client.auth_headers().is_err());
    }

    #[test]
    fn test_signup_request_wire_format() {
        let request = SignupRequest {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "hunter22".to_string(),
            role: Role::Editor,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["role"], "editor");
        assert_eq!(value["email"], "ana@example.com");
    }

    #[test]
    fn test_parse_backend_responses() {
        let login: LoginResponse = serde_json::from_str(r#"{"token":"a.b.c"}"#).unwrap();
        assert_eq!(login.token, "a.b.c");

        let health: HealthStatus = serde_json::from_str(
            r#"{"status":"ok","message":"YouTube Manager API is running"}"#,
        )
        .unwrap();
        assert_eq!(health.status, "ok");

        let signup: MessageResponse =
            serde_json::from_str(r#"{"message":"Signup successful"}"#).unwrap();
        assert_eq!(signup.message, "Signup successful");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Reserve a free port, then release it so nothing is listening there
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = ApiClient::new(format!("http://127.0.0.1:{}", port)).unwrap();
        let err = client.login("a@b.c", "pw").await.unwrap_err();
        assert!(err.chain().any(|cause| cause.downcast_ref::<ApiError>().is_some()));
    }
}
