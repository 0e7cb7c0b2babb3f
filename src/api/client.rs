//! Async REST client for the match/tournament resource.
//!
//! Features:
//! - Rate limiting (configurable, default 20 req/sec)
//! - Bounded attempts for 5xx and network errors
//! - Typed responses

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::models::{Match, NewTournament, Tournament};

use super::errors::ApiError;
use super::MatchApi;

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// HTTP client for the collaborator store.
pub struct MatchApiClient {
    base_url: String,
    client: Client,
    rate_limiter: Arc<DirectLimiter>,
    max_attempts: u32,
}

impl MatchApiClient {
    /// `timeout_secs = 0` leaves requests without a client-side timeout.
    pub fn new(
        base_url: &str,
        rate_limit: u32,
        max_attempts: u32,
        timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30));
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Create with default settings: one attempt per call, no timeout.
    pub fn with_defaults(base_url: &str) -> Result<Self, ApiError> {
        Self::new(base_url, 20, 1, 0)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.max_attempts {
            let is_last = attempt + 1 == self.max_attempts;
            self.rate_limiter.until_ready().await;

            debug!(
                method = %method,
                path = %path,
                attempt = attempt + 1,
                "API request"
            );

            let mut req = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| ApiError::Network(e.to_string()))?;
                        return serde_json::from_str(&text)
                            .map_err(|e| ApiError::Deserialization(e.to_string()));
                    }

                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(retry_after, attempt = attempt + 1, "Rate limited");
                        last_error = Some(ApiError::RateLimited { retry_after });
                        if !is_last {
                            tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        }
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ApiError::from_response(status.as_u16(), &body_text);

                    // Client errors are final.
                    if !err.is_retryable() {
                        return Err(err);
                    }

                    let delay_ms = 500 * 2u64.pow(attempt);
                    warn!(
                        status_code = status.as_u16(),
                        delay_ms,
                        attempt = attempt + 1,
                        "Server error"
                    );
                    last_error = Some(err);
                    if !is_last {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => {
                    let delay_ms = 500 * 2u64.pow(attempt);
                    warn!(
                        error = %e,
                        delay_ms,
                        attempt = attempt + 1,
                        "Network error"
                    );
                    last_error = Some(if e.is_timeout() {
                        ApiError::Timeout(e.to_string())
                    } else {
                        ApiError::Network(e.to_string())
                    });
                    if !is_last {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(err) if self.max_attempts == 1 => err,
            Some(err) => ApiError::MaxRetriesExceeded {
                attempts: self.max_attempts,
                last_error: err.to_string(),
            },
            None => ApiError::MaxRetriesExceeded {
                attempts: self.max_attempts,
                last_error: "Unknown error".to_string(),
            },
        })
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let data = self.request(method, path, body).await?;
        serde_json::from_value(data).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Decode a list response one element at a time, skipping records that
    /// fail to parse instead of failing the whole snapshot.
    async fn request_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let data = self.request(reqwest::Method::GET, path, None).await?;
        let items = match data {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(ApiError::Deserialization(format!(
                    "expected an array from {path}, got {other}"
                )))
            }
        };

        let parsed = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<T>(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(path, error = %e, "Skipping unparseable record");
                    None
                }
            })
            .collect();
        Ok(parsed)
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::InvalidPayload(e.to_string()))
}

#[async_trait]
impl MatchApi for MatchApiClient {
    async fn list_matches(&self) -> Result<Vec<Match>, ApiError> {
        self.request_list("/matches/").await
    }

    async fn create_match(&self, new_match: &Match) -> Result<Match, ApiError> {
        let body = to_body(new_match)?;
        let created: Match = self
            .request_typed(reqwest::Method::POST, "/matches/", Some(&body))
            .await?;
        if created.id.is_none() {
            return Err(ApiError::MissingId);
        }
        Ok(created)
    }

    async fn update_match(&self, id: u64, updated: &Match) -> Result<Match, ApiError> {
        let body = to_body(updated)?;
        let path = format!("/matches/{id}");
        self.request_typed(reqwest::Method::PUT, &path, Some(&body))
            .await
    }

    async fn list_tournaments(&self) -> Result<Vec<Tournament>, ApiError> {
        self.request_list("/tournaments/").await
    }

    async fn create_tournament(&self, new: &NewTournament) -> Result<Tournament, ApiError> {
        let body = to_body(new)?;
        self.request_typed(reqwest::Method::POST, "/tournaments/", Some(&body))
            .await
    }

    async fn tournament_matches(&self, tournament_id: u64) -> Result<Vec<Match>, ApiError> {
        let path = format!("/tournaments/{tournament_id}/matches/");
        self.request_list(&path).await
    }
}
