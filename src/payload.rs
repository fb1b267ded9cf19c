//! Outbound message payload
//!
//! Fixed field set understood by the watch-display collaborator. Every
//! refresh cycle ends with exactly one payload, whether the fetch worked
//! or not; each failure kind maps to its own sentinel text so the watch
//! can tell a login problem from a timeout from a dead server.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::storage::DEFAULT_ID;

/// Alert ordinals emitted to the watch.
pub const ALERT_NONE: u8 = 0;
pub const ALERT_HIGH: u8 = 1;
pub const ALERT_LOW: u8 = 2;
pub const ALERT_STALE: u8 = 4;

/// The outbound message for the watch-display collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPayload {
    /// 5-minute-normalized rate of change, or a sentinel like "check bg".
    pub delta: String,
    /// Display glucose string, or a sentinel like "low", "hgh", "old".
    pub egv: String,
    /// Trend arrow code 0-7 (0 also covers not-computable/out-of-range).
    pub trend: u8,
    /// 0 none, 1 high, 2 low, 4 stale.
    pub alert: u8,
    /// Vibration intensity; 0 suppresses vibration.
    pub vibe: u32,
    /// Reading id (epoch millis), or 99 for error payloads.
    pub id: i64,
    /// Whole minutes since the reading, -1 for error payloads.
    pub time_delta_int: i64,
    /// Rolling-window glucose values, comma-separated.
    pub bgs: String,
    /// Matching recency markers (45 - minutes ago), comma-separated.
    pub bg_times: String,
}

impl OutputPayload {
    fn sentinel(egv: &str, delta: &str, vibe: u32) -> Self {
        Self {
            delta: delta.to_string(),
            egv: egv.to_string(),
            trend: 0,
            alert: ALERT_STALE,
            vibe,
            id: DEFAULT_ID,
            time_delta_int: -1,
            bgs: String::new(),
            bg_times: String::new(),
        }
    }

    /// Payload shown until the user finishes configuration.
    pub fn unconfigured() -> Self {
        Self::sentinel("set", "setup up required", 1)
    }

    /// Fixed payload for a fetch failure.
    pub fn for_fetch_error(err: &FetchError) -> Self {
        match err {
            FetchError::AuthFailure => Self::sentinel("log", "login err", 1),
            FetchError::Timeout => Self::sentinel("tot", "tout-err", 0),
            FetchError::ServerError(_) => Self::sentinel("svr", "net-err", 0),
            FetchError::InvalidEndpoint(_) => Self::sentinel("exc", "invalid url", 0),
            FetchError::EmptyData => Self::sentinel("exc", "data err", 0),
            FetchError::Unexpected(msg) => Self::sentinel("exc", msg, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_payload_is_fixed() {
        let payload = OutputPayload::for_fetch_error(&FetchError::AuthFailure);
        assert_eq!(payload.egv, "log");
        assert_eq!(payload.delta, "login err");
        assert_eq!(payload.vibe, 1);
        assert_eq!(payload.alert, ALERT_STALE);
        assert_eq!(payload.trend, 0);
        assert_eq!(payload.id, DEFAULT_ID);
        assert_eq!(payload.time_delta_int, -1);
    }

    #[test]
    fn test_each_error_kind_has_distinct_text() {
        let kinds = [
            OutputPayload::for_fetch_error(&FetchError::AuthFailure),
            OutputPayload::for_fetch_error(&FetchError::Timeout),
            OutputPayload::for_fetch_error(&FetchError::ServerError("500".into())),
            OutputPayload::for_fetch_error(&FetchError::InvalidEndpoint("x".into())),
            OutputPayload::for_fetch_error(&FetchError::EmptyData),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!((&a.egv, &a.delta), (&b.egv, &b.delta));
            }
        }
    }

    #[test]
    fn test_unconfigured_payload() {
        let payload = OutputPayload::unconfigured();
        assert_eq!(payload.egv, "set");
        assert_eq!(payload.delta, "setup up required");
        assert_eq!(payload.vibe, 1);
    }

    #[test]
    fn test_serialized_field_names() {
        let payload = OutputPayload::unconfigured();
        let json = serde_json::to_value(&payload).unwrap();
        for key in [
            "delta",
            "egv",
            "trend",
            "alert",
            "vibe",
            "id",
            "time_delta_int",
            "bgs",
            "bg_times",
        ] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
    }
}
