//! Dexcom Share source adapter
//!
//! Two-step flow against the Share cloud API: authenticate with account
//! credentials to obtain a session token, then fetch the latest glucose
//! values with it. Timestamps arrive as `/Date(1462404576000)/` strings
//! and the epoch millis are extracted from between the parentheses.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::error::FetchError;
use crate::readings::{CanonicalReading, NoiseLevel, Trend};
use crate::source::Source;

/// Application id the Share API expects from third-party followers.
const APPLICATION_ID: &str = "d89443d2-327c-4a6f-89e5-496bbb0317db";
const USER_AGENT: &str = "Dexcom Share/3.0.2.11 CFNetwork/711.2.23 Darwin/14.0.0";

/// Lookback window and sample cap for the latest-values call.
const WINDOW_MINUTES: u32 = 1440;
const MAX_COUNT: u32 = 8;

/// Pick the Share host for the configured region.
fn host_for_region(region: &str) -> &'static str {
    if region == "outside" {
        "shareous1"
    } else {
        "share1"
    }
}

/// Extract epoch millis from a wall-time string like `/Date(1462404576000)/`.
fn parse_wall_time(wt: &str) -> Option<i64> {
    let open = wt.find('(')?;
    let close = wt.rfind(')')?;
    wt.get(open + 1..close)?.trim().parse().ok()
}

/// Raw value shape of `ReadPublisherLatestGlucoseValues`.
#[derive(Debug, Deserialize)]
struct ShareEntry {
    #[serde(rename = "WT")]
    wt: String,
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Trend")]
    trend: Option<i64>,
}

fn map_entry(entry: &ShareEntry) -> Result<CanonicalReading, FetchError> {
    let date = parse_wall_time(&entry.wt).ok_or_else(|| {
        FetchError::ServerError(format!("unparseable wall time: {}", entry.wt))
    })?;
    Ok(CanonicalReading {
        date,
        sgv: entry.value as i32,
        // Share has no raw sensor channels; raw mode never applies here.
        filtered: 0.0,
        unfiltered: 0.0,
        noise: NoiseLevel::NotComputed,
        trend: Trend::from_code(entry.trend.unwrap_or(8)),
        device: "share".to_string(),
        is_sgv: true,
    })
}

/// Parse a latest-values response body into newest-first readings.
fn parse_values(body: &str) -> Result<Vec<CanonicalReading>, FetchError> {
    let entries: Vec<ShareEntry> =
        serde_json::from_str(body).map_err(|e| FetchError::ServerError(e.to_string()))?;
    if entries.is_empty() {
        return Err(FetchError::EmptyData);
    }
    let mut readings = entries
        .iter()
        .map(map_entry)
        .collect::<Result<Vec<_>, _>>()?;
    readings.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(readings)
}

/// Adapter for Dexcom Share's cloud API.
pub struct ShareSource {
    http: reqwest::Client,
    account_name: String,
    password: String,
    host: &'static str,
}

impl ShareSource {
    pub fn new(http: reqwest::Client, account_name: &str, password: &str, region: &str) -> Self {
        Self {
            http,
            account_name: account_name.to_string(),
            password: password.to_string(),
            host: host_for_region(region),
        }
    }

    fn login_url(&self) -> String {
        format!(
            "https://{}.dexcom.com/ShareWebServices/Services/General/LoginPublisherAccountByName",
            self.host
        )
    }

    fn latest_url(&self, session_id: &str) -> String {
        format!(
            "https://{}.dexcom.com/ShareWebServices/Services/Publisher/ReadPublisherLatestGlucoseValues?sessionID={}&minutes={}&maxCount={}",
            self.host, session_id, WINDOW_MINUTES, MAX_COUNT
        )
    }

    /// Authenticate and return the session token. Any non-2xx status is a
    /// credential rejection as far as the watch is concerned.
    async fn authenticate(&self) -> Result<String, FetchError> {
        let body = json!({
            "password": self.password,
            "applicationId": APPLICATION_ID,
            "accountName": self.account_name,
        });
        let response = self
            .http
            .post(self.login_url())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(FetchError::from)?;
        if !response.status().is_success() {
            return Err(FetchError::AuthFailure);
        }
        let token = response.text().await.map_err(FetchError::from)?;
        // The session id comes back as a bare JSON string
        Ok(token.trim().trim_matches('"').to_string())
    }
}

#[async_trait]
impl Source for ShareSource {
    async fn fetch(&self) -> Result<Vec<CanonicalReading>, FetchError> {
        let session_id = self.authenticate().await?;
        debug!("Share session established");
        let response = self
            .http
            .post(self.latest_url(&session_id))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .header("Content-Length", 0)
            .send()
            .await
            .map_err(FetchError::from)?;
        if !response.status().is_success() {
            return Err(FetchError::ServerError(format!(
                "latest values request returned {}",
                response.status()
            )));
        }
        let body = response.text().await.map_err(FetchError::from)?;
        parse_values(&body)
    }

    fn name(&self) -> &str {
        "share"
    }
}
