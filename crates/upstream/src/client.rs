use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("response body could not be decoded: {0}")]
    Decode(serde_json::Error),
}

/// Result of a conditional GET (spec §4.3): either nothing changed (304, or
/// any failure -- the caller never distinguishes "unchanged" from "broken"),
/// or a fresh body plus the etag to store for next time.
pub enum ConditionalResponse<T> {
    NotModified,
    Fresh { body: T, etag: Option<String> },
}

/// Shared conditional-GET behaviour for both upstream API groups (spec §4.3,
/// §6). Collectors never see network errors directly -- a failed or
/// malformed fetch collapses to `NotModified` so the cycle just preserves
/// the last good state.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `ETag`-conditional GET. Any non-200/304 response, network error, or
    /// decode failure is treated as "no new data" (spec §4.3) -- logged and
    /// folded into `NotModified` rather than propagated.
    pub async fn get_conditional<T: DeserializeOwned>(
        &self,
        path: &str,
        previous_etag: Option<&str>,
    ) -> ConditionalResponse<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some(etag) = previous_etag {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(why) => {
                tracing::warn!(url, error = %why, "upstream request failed");
                return ConditionalResponse::NotModified;
            }
        };

        if response.status() == StatusCode::NOT_MODIFIED {
            return ConditionalResponse::NotModified;
        }
        if !response.status().is_success() {
            tracing::warn!(url, status = %response.status(), "upstream returned an error status");
            return ConditionalResponse::NotModified;
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let date_header = response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(why) => {
                tracing::warn!(url, error = %why, "failed reading upstream body");
                return ConditionalResponse::NotModified;
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(body) => ConditionalResponse::Fresh { body, etag },
            Err(why) => {
                let _ = date_header; // available to callers that need the Date header too; see `get_with_date`.
                tracing::warn!(url, error = %why, "failed decoding upstream body");
                ConditionalResponse::NotModified
            }
        }
    }

    /// Plain GET that also hands back the response's `Date` header, used by
    /// the server-time endpoints to derive the UTC offset (spec §4.5b, §6).
    pub async fn get_with_date<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Option<(T, chrono::DateTime<chrono::Utc>)> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let date = response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))?;
        let body = response.json::<T>().await.ok()?;
        Some((body, date))
    }
}
