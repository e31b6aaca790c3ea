use chrono::{DateTime, Utc};

use crate::client::UpstreamClient;
use crate::dto::{ServerTimeMillis, ServerTimeOffset, TrainRunEntry};

/// The AWS API group (spec §6): run timetables and the two best-effort
/// fallbacks used to derive a server's UTC offset.
#[derive(Clone)]
pub struct AwsApiClient {
    client: UpstreamClient,
}

impl AwsApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: UpstreamClient::new(base_url),
        }
    }

    pub async fn train_runs(&self, server_code: &str) -> Option<Vec<TrainRunEntry>> {
        let path = format!("/runs/{server_code}");
        self.client
            .get_with_date::<Vec<TrainRunEntry>>(&path)
            .await
            .map(|(body, _)| body)
    }

    /// Returns `(server_epoch_millis, http_date)` so the caller can derive
    /// the offset per spec §6: `offset_seconds = server_epoch_ms − Date`.
    pub async fn server_time_millis(
        &self,
        server_code: &str,
    ) -> Option<(i64, DateTime<Utc>)> {
        let path = format!("/time/{server_code}");
        self.client
            .get_with_date::<ServerTimeMillis>(&path)
            .await
            .map(|(body, date)| (body.epoch_millis, date))
    }

    /// Best-effort fallback when the millis endpoint is unavailable.
    pub async fn server_time_offset(&self, server_code: &str) -> Option<i32> {
        let path = format!("/time-offset/{server_code}");
        self.client
            .get_with_date::<ServerTimeOffset>(&path)
            .await
            .map(|(body, _)| body.utc_offset_hours * 3600)
    }
}
