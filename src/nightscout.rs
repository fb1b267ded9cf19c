//! Nightscout source adapter
//!
//! Queries a self-hosted Nightscout server's entries API for the most
//! recent sgv samples and maps them into canonical readings. Users tend to
//! paste the watchface endpoint URL from their Nightscout setup guide, so
//! known `/pebble` suffixes are stripped from the configured base URL.

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::readings::{CalibrationRecord, CanonicalReading, NoiseLevel, Trend};
use crate::source::Source;

/// How many recent samples to request; covers the 45-minute sparkline
/// window at the usual 5-minute cadence.
const ENTRY_COUNT: usize = 9;

/// Raw entry shape of `/api/v1/entries/sgv.json`. Absent fields default to
/// safe neutral values instead of failing the cycle.
#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "type")]
    kind: Option<String>,
    sgv: Option<f64>,
    date: i64,
    direction: Option<String>,
    noise: Option<i64>,
    filtered: Option<f64>,
    unfiltered: Option<f64>,
    device: Option<String>,
}

/// Calibration entry of `/api/v1/entries/cal.json`. Some uploaders store
/// the coefficients as strings, so the fields are parsed leniently.
#[derive(Debug, Deserialize)]
struct CalEntry {
    slope: Value,
    intercept: Value,
    scale: Value,
}

fn lenient_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Strip the watchface path suffixes users paste along with their base URL.
pub fn normalize_base_url(api: &str) -> String {
    api.trim()
        .replace("/pebble?units=mmol", "")
        .replace("/pebble/", "")
        .replace("/pebble", "")
}

fn map_entry(entry: Entry) -> CanonicalReading {
    CanonicalReading {
        date: entry.date,
        sgv: entry.sgv.unwrap_or(0.0) as i32,
        filtered: entry.filtered.unwrap_or(0.0),
        unfiltered: entry.unfiltered.unwrap_or(0.0),
        noise: NoiseLevel::from_int(entry.noise.unwrap_or(0)),
        trend: entry
            .direction
            .as_deref()
            .map(Trend::from_direction)
            .unwrap_or(Trend::NotComputable),
        device: entry.device.unwrap_or_default(),
        is_sgv: entry.kind.as_deref() == Some("sgv"),
    }
}

/// Parse an entries response body into newest-first canonical readings.
fn parse_entries(body: &str) -> Result<Vec<CanonicalReading>, FetchError> {
    let entries: Vec<Entry> =
        serde_json::from_str(body).map_err(|e| FetchError::ServerError(e.to_string()))?;
    if entries.is_empty() {
        return Err(FetchError::EmptyData);
    }
    let mut readings: Vec<CanonicalReading> = entries.into_iter().map(map_entry).collect();
    readings.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(readings)
}

/// Adapter for a self-hosted Nightscout server.
pub struct NightscoutSource {
    http: reqwest::Client,
    base: String,
}

impl NightscoutSource {
    pub fn new(http: reqwest::Client, api: &str) -> Self {
        Self {
            http,
            base: normalize_base_url(api),
        }
    }

    fn entries_url(&self) -> Result<Url, FetchError> {
        let url = format!("{}/api/v1/entries/sgv.json?count={}", self.base, ENTRY_COUNT);
        Url::parse(&url).map_err(|_| FetchError::InvalidEndpoint(url))
    }

    /// Fetch the linear calibration record used by raw mode.
    ///
    /// Any failure (transport, non-2xx, empty, unparseable) disables raw
    /// mode for this cycle rather than failing it.
    pub async fn fetch_calibration(&self) -> Option<CalibrationRecord> {
        let url = format!("{}/api/v1/entries/cal.json?count=1", self.base);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Calibration fetch failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("Calibration fetch returned {}", response.status());
            return None;
        }
        let entries: Vec<CalEntry> = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("Calibration body unparseable: {}", e);
                return None;
            }
        };
        let first = entries.first()?;
        let record = CalibrationRecord {
            slope: lenient_f64(&first.slope)?,
            intercept: lenient_f64(&first.intercept)?,
            scale: lenient_f64(&first.scale)?,
        };
        info!(
            "Calibration record: slope={} intercept={} scale={}",
            record.slope, record.intercept, record.scale
        );
        Some(record)
    }
}

#[async_trait]
impl Source for NightscoutSource {
    async fn fetch(&self) -> Result<Vec<CanonicalReading>, FetchError> {
        let url = self.entries_url()?;
        let response = self.http.get(url).send().await.map_err(FetchError::from)?;
        if !response.status().is_success() {
            return Err(FetchError::ServerError(format!(
                "entries request returned {}",
                response.status()
            )));
        }
        let body = response.text().await.map_err(FetchError::from)?;
        parse_entries(&body)
    }

    fn name(&self) -> &str {
        "nightscout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(
            normalize_base_url("https://cgm.example.com/pebble?units=mmol"),
            "https://cgm.example.com"
        );
        assert_eq!(
            normalize_base_url("https://cgm.example.com/pebble/"),
            "https://cgm.example.com"
        );
        assert_eq!(
            normalize_base_url("https://cgm.example.com/pebble"),
            "https://cgm.example.com"
        );
        assert_eq!(
            normalize_base_url("  https://cgm.example.com "),
            "https://cgm.example.com"
        );
    }

    #[test]
    fn test_invalid_endpoint_detected_before_network() {
        let source = NightscoutSource::new(reqwest::Client::new(), "not a url");
        assert!(matches!(
            source.entries_url(),
            Err(FetchError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_parse_entries_full_fields() {
        let body = r#"[
            {"type":"sgv","sgv":110,"date":1700000300000,"direction":"Flat",
             "noise":1,"filtered":120000,"unfiltered":125000,"device":"dexcom"},
            {"type":"sgv","sgv":100,"date":1700000000000,"direction":"FortyFiveUp",
             "noise":2,"filtered":110000,"unfiltered":115000,"device":"dexcom"}
        ]"#;
        let readings = parse_entries(body).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].sgv, 110);
        assert_eq!(readings[0].trend, Trend::Flat);
        assert_eq!(readings[0].noise, NoiseLevel::Clean);
        assert_eq!(readings[1].trend, Trend::FortyFiveUp);
        assert!(readings[0].is_sgv);
    }

    #[test]
    fn test_parse_entries_orders_newest_first() {
        let body = r#"[
            {"type":"sgv","sgv":100,"date":1700000000000},
            {"type":"sgv","sgv":110,"date":1700000300000}
        ]"#;
        let readings = parse_entries(body).unwrap();
        assert_eq!(readings[0].date, 1_700_000_300_000);
        assert_eq!(readings[0].sgv, 110);
    }

    #[test]
    fn test_parse_entries_defaults_missing_fields() {
        let body = r#"[{"type":"sgv","sgv":95,"date":1700000000000}]"#;
        let readings = parse_entries(body).unwrap();
        assert_eq!(readings[0].noise, NoiseLevel::NotComputed);
        assert_eq!(readings[0].trend, Trend::NotComputable);
        assert_eq!(readings[0].device, "");
        assert_eq!(readings[0].filtered, 0.0);
    }

    #[test]
    fn test_parse_entries_empty_is_soft_error() {
        assert!(matches!(parse_entries("[]"), Err(FetchError::EmptyData)));
    }

    #[test]
    fn test_parse_entries_malformed_is_server_error() {
        assert!(matches!(
            parse_entries("{\"oops\":true}"),
            Err(FetchError::ServerError(_))
        ));
    }

    #[test]
    fn test_lenient_calibration_values() {
        assert_eq!(lenient_f64(&serde_json::json!(870.3)), Some(870.3));
        assert_eq!(lenient_f64(&serde_json::json!("870.3")), Some(870.3));
        assert_eq!(lenient_f64(&serde_json::json!(null)), None);
    }
}
