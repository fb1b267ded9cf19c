//! Canonical reading model shared by all data sources
//!
//! Nightscout entries, Dexcom Share values and raw-sensor calibration
//! records all normalize into [`CanonicalReading`] lists ordered newest
//! first. Readings are read-only once constructed; the raw calibrator is
//! the only code that rewrites `sgv` values, and it works on a copy.

use serde::{Deserialize, Serialize};

use crate::units::SENSOR_LOW_FLOOR;

/// Device-reported confidence/interference classification of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseLevel {
    NotComputed,
    Clean,
    Light,
    Medium,
    Heavy,
}

impl NoiseLevel {
    /// Map the Nightscout noise integer (0-4). Anything unrecognized is
    /// treated as heavy/unknown noise.
    pub fn from_int(value: i64) -> Self {
        match value {
            0 => NoiseLevel::NotComputed,
            1 => NoiseLevel::Clean,
            2 => NoiseLevel::Light,
            3 => NoiseLevel::Medium,
            _ => NoiseLevel::Heavy,
        }
    }

    /// Three-letter code shown in the delta suffix and pin body.
    pub fn code(self) -> &'static str {
        match self {
            NoiseLevel::NotComputed => "NCP",
            NoiseLevel::Clean => "CLN",
            NoiseLevel::Light => "LGT",
            NoiseLevel::Medium => "MED",
            NoiseLevel::Heavy => "???",
        }
    }
}

/// Trend direction of a reading.
///
/// Codes 0-7 map directly to the watch's arrow glyphs; 8 and 9 are the
/// not-computable / rate-out-of-range sentinels and display as no trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    None,
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    NotComputable,
    OutOfRange,
}

impl Trend {
    /// Map a Nightscout direction string. Unrecognized strings become
    /// [`Trend::NotComputable`].
    pub fn from_direction(direction: &str) -> Self {
        match direction {
            "NONE" => Trend::None,
            "DoubleUp" => Trend::DoubleUp,
            "SingleUp" => Trend::SingleUp,
            "FortyFiveUp" => Trend::FortyFiveUp,
            "Flat" => Trend::Flat,
            "FortyFiveDown" => Trend::FortyFiveDown,
            "SingleDown" => Trend::SingleDown,
            "DoubleDown" => Trend::DoubleDown,
            "NOT COMPUTABLE" => Trend::NotComputable,
            "RATE OUT OF RANGE" => Trend::OutOfRange,
            _ => Trend::NotComputable,
        }
    }

    /// Map the Dexcom Share trend integer.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Trend::None,
            1 => Trend::DoubleUp,
            2 => Trend::SingleUp,
            3 => Trend::FortyFiveUp,
            4 => Trend::Flat,
            5 => Trend::FortyFiveDown,
            6 => Trend::SingleDown,
            7 => Trend::DoubleDown,
            9 => Trend::OutOfRange,
            _ => Trend::NotComputable,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Trend::None => 0,
            Trend::DoubleUp => 1,
            Trend::SingleUp => 2,
            Trend::FortyFiveUp => 3,
            Trend::Flat => 4,
            Trend::FortyFiveDown => 5,
            Trend::SingleDown => 6,
            Trend::DoubleDown => 7,
            Trend::NotComputable => 8,
            Trend::OutOfRange => 9,
        }
    }

    /// Trend code as shown on the watch: the 8/9 sentinels collapse to 0.
    pub fn display_code(self) -> u8 {
        let code = self.code();
        if code > 7 {
            0
        } else {
            code
        }
    }

    /// Direction label used in the timeline pin body.
    pub fn label(self) -> &'static str {
        match self {
            Trend::None => "NONE",
            Trend::DoubleUp => "DoubleUp",
            Trend::SingleUp => "SingleUp",
            Trend::FortyFiveUp => "FortyFiveUp",
            Trend::Flat => "Flat",
            Trend::FortyFiveDown => "FortyFiveDown",
            Trend::SingleDown => "SingleDown",
            Trend::DoubleDown => "DoubleDown",
            Trend::NotComputable => "NOT COMPUTABLE",
            Trend::OutOfRange => "RATE OUT OF RANGE",
        }
    }
}

/// A single CGM reading in source-independent form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalReading {
    /// Wall-clock timestamp in epoch millis; also the reading id.
    pub date: i64,
    /// Glucose value in device units (mg/dL before raw adjustment).
    pub sgv: i32,
    /// Filtered sensor channel; 0 when the channel is invalid or absent.
    pub filtered: f64,
    /// Unfiltered sensor channel; 0 when absent.
    pub unfiltered: f64,
    pub noise: NoiseLevel,
    pub trend: Trend,
    /// Uploader device tag, e.g. "dexcom" or "xDrip-DexcomShare".
    pub device: String,
    /// Whether this entry is a true sensor glucose value (Nightscout entry
    /// type "sgv"). Non-sgv entries are excluded from the sparkline.
    pub is_sgv: bool,
}

impl CanonicalReading {
    /// Whole minutes elapsed since this reading was taken.
    pub fn age_minutes(&self, now_ms: i64) -> i64 {
        (now_ms - self.date) / 60_000
    }

    /// Virtual/cloud-relay uploaders republish already-calibrated values,
    /// so raw calibration must not be applied to them. The one exception
    /// is the xDrip-DexcomShare bridge, which carries real sensor channels.
    pub fn is_virtual_relay(&self) -> bool {
        self.device.contains("xDrip") && self.device != "xDrip-DexcomShare"
    }

    pub fn below_floor(&self) -> bool {
        self.sgv < SENSOR_LOW_FLOOR
    }
}

/// Linear calibration record for raw-mode reconstruction.
///
/// Fetched once per raw-mode cycle from the source and immutable after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub slope: f64,
    pub intercept: f64,
    pub scale: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device: &str) -> CanonicalReading {
        CanonicalReading {
            date: 1_700_000_000_000,
            sgv: 120,
            filtered: 0.0,
            unfiltered: 0.0,
            noise: NoiseLevel::NotComputed,
            trend: Trend::Flat,
            device: device.to_string(),
            is_sgv: true,
        }
    }

    #[test]
    fn test_direction_lookup() {
        assert_eq!(Trend::from_direction("DoubleUp"), Trend::DoubleUp);
        assert_eq!(Trend::from_direction("Flat"), Trend::Flat);
        assert_eq!(Trend::from_direction("DoubleDown"), Trend::DoubleDown);
        assert_eq!(Trend::from_direction("bogus"), Trend::NotComputable);
    }

    #[test]
    fn test_sentinel_trends_display_as_none() {
        assert_eq!(Trend::NotComputable.display_code(), 0);
        assert_eq!(Trend::OutOfRange.display_code(), 0);
        assert_eq!(Trend::SingleDown.display_code(), 6);
    }

    #[test]
    fn test_noise_mapping() {
        assert_eq!(NoiseLevel::from_int(0), NoiseLevel::NotComputed);
        assert_eq!(NoiseLevel::from_int(1), NoiseLevel::Clean);
        assert_eq!(NoiseLevel::from_int(4), NoiseLevel::Heavy);
        assert_eq!(NoiseLevel::from_int(17), NoiseLevel::Heavy);
        assert_eq!(NoiseLevel::Medium.code(), "MED");
    }

    #[test]
    fn test_virtual_relay_detection() {
        assert!(reading("xDrip-Wixel").is_virtual_relay());
        assert!(!reading("xDrip-DexcomShare").is_virtual_relay());
        assert!(!reading("dexcom").is_virtual_relay());
        assert!(!reading("").is_virtual_relay());
    }

    #[test]
    fn test_age_minutes_truncates() {
        let r = reading("dexcom");
        assert_eq!(r.age_minutes(r.date + 299_000), 4);
        assert_eq!(r.age_minutes(r.date + 300_000), 5);
    }
}
