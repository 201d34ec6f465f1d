use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Serialize;

use idemgate_common::{IdempotencyKey, IDEMPOTENCY_KEY_HEADER, REPLAY_HEADER};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`. A server `Retry-After` is a floor.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff.saturating_mul(exp).min(self.max_backoff);
        retry_after.map_or(delay, |ra| delay.max(ra))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub replayed: bool,
    pub attempts: u32,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.body["id"].as_str()
    }

    pub fn error_message(&self) -> String {
        match (self.body["error"].as_str(), self.body["message"].as_str()) {
            (Some(code), Some(msg)) => format!("HTTP {} {code}: {msg}", self.status),
            _ => format!("HTTP {}", self.status),
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 409 | 502 | 503 | 504)
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(base: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token,
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    pub async fn check(&self, path: &str) -> Result<()> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .context("connection failed")?;
        if resp.status().is_success() {
            Ok(())
        } else {
            anyhow::bail!("HTTP {}", resp.status())
        }
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let resp = self
            .authorized(self.http.get(self.url(path)))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn post_idempotent<T: Serialize + ?Sized>(
        &self,
        path: &str,
        key: &IdempotencyKey,
        body: &T,
    ) -> Result<ApiResponse> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            let sent = self
                .authorized(self.http.post(self.url(path)))
                .header(IDEMPOTENCY_KEY_HEADER, key.as_str())
                .json(body)
                .send()
                .await;

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    let retry_after = parse_retry_after(&resp);
                    let replayed = resp
                        .headers()
                        .get(REPLAY_HEADER)
                        .is_some_and(|v| v == "true");
                    let bytes = resp.bytes().await.context("reading response body")?;
                    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
                    let response = ApiResponse {
                        status: status.as_u16(),
                        replayed,
                        attempts: attempt,
                        body,
                    };
                    if attempt >= attempts || !is_retryable_status(response.status) {
                        return Ok(response);
                    }
                    tokio::time::sleep(self.policy.backoff(attempt, retry_after)).await;
                }
                Err(e) if attempt < attempts && (e.is_connect() || e.is_timeout()) => {
                    tokio::time::sleep(self.policy.backoff(attempt, None)).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("POST {path} (key {key})"));
                }
            }
            attempt += 1;
        }
    }
}

fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    if resp.status() != StatusCode::CONFLICT && resp.status() != StatusCode::SERVICE_UNAVAILABLE {
        return None;
    }
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
