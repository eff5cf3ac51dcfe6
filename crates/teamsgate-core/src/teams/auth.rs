//! Client for the internal security service.
//!
//! This service does not talk to the identity provider itself. The security
//! service owns the login of the Teams service account and hands out its
//! current bearer token, which is all this module asks it for.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::SecurityConfig;
use crate::teams::token::{MAX_LIFETIME, Token, TokenSource};
use crate::{CoreError, Result};

/// Fetches the service account token from the security service.
#[derive(Debug, Clone)]
pub struct SecurityServiceClient {
    http_client: Client,
    token_url: String,
}

/// Body returned by the token endpoint.
///
/// The lifetime is given either relative (`lifetimeSeconds`) or as an
/// absolute Unix timestamp (`validity`).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "lifetimeSeconds")]
    lifetime_seconds: Option<f64>,
    #[serde(default)]
    validity: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now_epoch_secs: f64) -> Result<Token> {
        if self.result.as_deref() == Some("error") {
            let reason = self.error.unwrap_or_else(|| "no reason given".to_string());
            return Err(CoreError::AuthUnavailable(format!(
                "security service returned an error: {reason}"
            )));
        }

        let value = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::AuthUnavailable("missing token in response".to_string()))?;

        let lifetime_secs = match (self.lifetime_seconds, self.validity) {
            (Some(lifetime), _) => lifetime,
            (None, Some(validity)) => validity - now_epoch_secs,
            (None, None) => {
                return Err(CoreError::AuthUnavailable(
                    "missing token lifetime in response".to_string(),
                ));
            }
        };

        if !lifetime_secs.is_finite() || lifetime_secs <= 0.0 {
            return Err(CoreError::AuthUnavailable(
                "token from security service is already expired".to_string(),
            ));
        }

        let lifetime = Duration::try_from_secs_f64(lifetime_secs)
            .unwrap_or(MAX_LIFETIME)
            .min(MAX_LIFETIME);

        Ok(Token::new(value, lifetime))
    }
}

impl SecurityServiceClient {
    /// Create a client for the configured token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| CoreError::Config(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            token_url: config.token_url.clone(),
        })
    }

    /// Request a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AuthUnavailable` on network errors, timeouts,
    /// non-success statuses and malformed bodies.
    pub async fn request_token(&self) -> Result<Token> {
        let response = self
            .http_client
            .get(&self.token_url)
            .send()
            .await
            .map_err(|e| CoreError::AuthUnavailable(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::error!("failed to get Teams token from security service: {status} - {text}");
            return Err(CoreError::AuthUnavailable(format!(
                "security service returned {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CoreError::AuthUnavailable(format!("parsing token response: {e}")))?;

        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        body.into_token(now)
    }
}

impl TokenSource for SecurityServiceClient {
    async fn fetch(&self) -> Result<Token> {
        self.request_token().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer, timeout: u64) -> SecurityServiceClient {
        SecurityServiceClient::new(&SecurityConfig {
            token_url: format!("{}/api/token", server.uri()),
            timeout,
        })
        .expect("client")
    }

    async fn respond_with(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/token"))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn parses_token_with_lifetime() {
        let server = respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "abc", "lifetimeSeconds": 3600})),
        )
        .await;

        let token = client_for(&server, 3).request_token().await.expect("token");
        assert_eq!(token.value(), "abc");
        assert!(token.is_usable(Duration::from_secs(3500)));
        assert!(!token.is_usable(Duration::from_secs(3700)));
    }

    #[tokio::test]
    async fn parses_absolute_validity() {
        let validity = chrono::Utc::now().timestamp() + 600;
        let server = respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "success",
            "token": "abc",
            "validity": validity,
        })))
        .await;

        let token = client_for(&server, 3).request_token().await.expect("token");
        assert!(token.is_usable(Duration::from_secs(500)));
        assert!(!token.is_usable(Duration::from_secs(700)));
    }

    #[tokio::test]
    async fn past_validity_is_rejected() {
        let validity = chrono::Utc::now().timestamp() - 10;
        let server = respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "abc", "validity": validity})),
        )
        .await;

        let err = client_for(&server, 3).request_token().await.unwrap_err();
        assert!(matches!(err, CoreError::AuthUnavailable(_)));
    }

    #[tokio::test]
    async fn error_result_is_auth_unavailable() {
        let server = respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "error",
            "error": "service account not logged in",
        })))
        .await;

        let err = client_for(&server, 3).request_token().await.unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }

    #[tokio::test]
    async fn non_success_status_is_auth_unavailable() {
        let server = respond_with(ResponseTemplate::new(500).set_body_string("boom")).await;

        let err = client_for(&server, 3).request_token().await.unwrap_err();
        assert!(matches!(err, CoreError::AuthUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_auth_unavailable() {
        let server = respond_with(ResponseTemplate::new(200).set_body_string("not json")).await;

        let err = client_for(&server, 3).request_token().await.unwrap_err();
        assert!(matches!(err, CoreError::AuthUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_lifetime_is_auth_unavailable() {
        let server =
            respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"}))).await;

        let err = client_for(&server, 3).request_token().await.unwrap_err();
        assert!(matches!(err, CoreError::AuthUnavailable(_)));
    }

    #[tokio::test]
    async fn timeout_is_auth_unavailable() {
        let server = respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "abc", "lifetimeSeconds": 60}))
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let err = client_for(&server, 1).request_token().await.unwrap_err();
        assert!(matches!(err, CoreError::AuthUnavailable(_)));
    }

    #[test]
    fn huge_lifetime_is_capped() {
        let body = TokenResponse {
            result: None,
            token: Some("abc".to_string()),
            lifetime_seconds: Some(1e30),
            validity: None,
            error: None,
        };
        let token = body.into_token(0.0).expect("token");
        assert!(!token.is_usable(MAX_LIFETIME));
    }
}
