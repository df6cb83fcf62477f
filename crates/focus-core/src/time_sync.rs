//! Network time sync.
//!
//! Measures how far the local clock is from a time server so hosts can run
//! the session clock on an [`OffsetClock`](crate::clock::OffsetClock). The
//! server is expected to answer a plain GET with `{"unixtime": <seconds>}`,
//! the shape worldtimeapi.org returns.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::TimeSyncError;
use crate::storage::{KeyValueStore, TimeSyncConfig};

/// kv key the measured offset is cached under, in milliseconds.
pub const OFFSET_KEY: &str = "clock.offset_ms";

#[derive(Debug, Deserialize)]
struct TimeResponse {
    unixtime: f64,
}

pub struct TimeSync {
    client: Client,
    url: String,
    timeout: StdDuration,
}

impl TimeSync {
    pub fn new(url: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TimeSyncConfig) -> Self {
        Self::new(config.url.clone(), StdDuration::from_secs(config.timeout_secs.max(1)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch server time and return `server - local`.
    ///
    /// The local reference is the midpoint of the request, which cancels
    /// symmetric network latency.
    pub async fn fetch_offset(&self) -> Result<Duration, TimeSyncError> {
        let sent = Utc::now();
        let resp = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let received = Utc::now();

        if !resp.status().is_success() {
            return Err(TimeSyncError::Status(resp.status().as_u16()));
        }

        let body = resp.text().await?;
        let server = parse_server_time(&body)?;
        let local = sent + (received - sent) / 2;
        let offset = server - local;
        debug!(offset_ms = offset.num_milliseconds(), url = %self.url, "time sync measured");
        Ok(offset)
    }
}

fn parse_server_time(body: &str) -> Result<DateTime<Utc>, TimeSyncError> {
    let parsed: TimeResponse = serde_json::from_str(body)
        .map_err(|e| TimeSyncError::InvalidResponse(e.to_string()))?;
    if !parsed.unixtime.is_finite() || parsed.unixtime < 0.0 {
        return Err(TimeSyncError::InvalidResponse(format!(
            "unixtime out of range: {}",
            parsed.unixtime
        )));
    }
    let millis = (parsed.unixtime * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| TimeSyncError::InvalidResponse(format!("unixtime out of range: {millis}ms")))
}

/// Cached offset, zero when none was ever stored or the stored value is
/// unreadable.
pub fn stored_offset(store: &impl KeyValueStore) -> Duration {
    match store.kv_get(OFFSET_KEY) {
        Ok(Some(raw)) => raw
            .parse::<i64>()
            .map(Duration::milliseconds)
            .unwrap_or_else(|_| Duration::zero()),
        _ => Duration::zero(),
    }
}

pub fn store_offset(store: &impl KeyValueStore, offset: Duration) -> crate::error::Result<()> {
    store.kv_set(OFFSET_KEY, &offset.num_milliseconds().to_string())
}
