use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use switchyard_core::config::RetryConfig;
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::Service;

/// Authenticated JSON client for one external service, with retry.
///
/// Rate limiting (429), server errors, connect failures and timeouts are
/// retried with exponential backoff. Anything else fails immediately.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    service: Service,
    base_url: String,
    token: String,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(
        client: reqwest::Client,
        service: Service,
        base_url: &str,
        token: &str,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, query: &[(&str, String)], body: &Value) -> Result<Value> {
        self.request(Method::PATCH, path, query, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, &[], None).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let max_retries = self.retry.max_retries;

        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), &url, query, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.retry);
                    warn!(
                        service = %self.service,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying service request"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        debug!(service = %self.service, %method, url, "Service request");

        let mut req = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(SwitchyardError::ServiceApi {
                service: self.service.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn transport_error(&self, e: reqwest::Error) -> SwitchyardError {
        let message = if e.is_timeout() {
            format!("timeout: {}", e)
        } else if e.is_connect() {
            format!("connect error: {}", e)
        } else {
            e.to_string()
        };
        SwitchyardError::ServiceRequest {
            service: self.service.to_string(),
            message,
        }
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::http::StatusCode;
    use axum::routing::{delete, get};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    fn client(base: &str, retry: RetryConfig) -> ApiClient {
        ApiClient::new(reqwest::Client::new(), Service::Mail, base, "tok", retry)
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        };
        let first = calculate_backoff(0, &config).as_millis();
        assert!((800..=1200).contains(&first));
        let third = calculate_backoff(2, &config).as_millis();
        assert!((3200..=4800).contains(&third));
        let capped = calculate_backoff(20, &config).as_millis();
        assert!(capped <= 36000);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/flaky",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (StatusCode::OK, Json(json!({"ok": true})))
                    }
                }
            }),
        );
        let base = test_server::spawn(app).await;

        let value = client(&base, fast_retry(3)).get("/flaky", &[]).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/limited",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::TOO_MANY_REQUESTS, "slow down")
                }
            }),
        );
        let base = test_server::spawn(app).await;

        let err = client(&base, fast_retry(2)).get("limited", &[]).await.unwrap_err();
        match err {
            SwitchyardError::ServiceApi { status, body, .. } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/missing",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::NOT_FOUND, "no such message")
                }
            }),
        );
        let base = test_server::spawn(app).await;

        let err = client(&base, fast_retry(3)).get("/missing", &[]).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::ServiceApi { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let app = Router::new().route("/thing", delete(|| async { StatusCode::NO_CONTENT }));
        let base = test_server::spawn(app).await;
        let value = client(&base, fast_retry(0)).delete("/thing").await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_sends_bearer_token() {
        let app = Router::new().route(
            "/whoami",
            get(|headers: axum::http::HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({"auth": auth}))
            }),
        );
        let base = test_server::spawn(app).await;
        let value = client(&base, fast_retry(0)).get("/whoami", &[]).await.unwrap();
        assert_eq!(value["auth"], "Bearer tok");
    }

    #[tokio::test]
    async fn test_connect_failure_is_retryable() {
        // Bind then drop a listener so the port refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr), fast_retry(1))
            .get("/", &[])
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
