//! Glucose unit conversion and display formatting
//!
//! CGM sources report glucose in device units (mg/dL). The watch displays
//! either mg/dL or mmol/L depending on the user's preference, so readings
//! are converted once and formatted with per-unit decimal precision.
//!
//! Values below the 39 mg/dL sensor floor get one decimal place no matter
//! which unit is configured (rounded to two decimals first), so near-hypo
//! readings always show fractional precision.

use serde::{Deserialize, Serialize};

/// Sensor low-floor sentinel in device units. A reading of exactly 39 means
/// the sensor clipped at its lower limit, not that the value is 39.
pub const SENSOR_LOW_FLOOR: i32 = 39;

/// Upper sensor limit in device units; anything above is reported as "hgh".
pub const SENSOR_HIGH_CEILING: i32 = 400;

/// mg/dL -> mmol/L conversion factor.
const MMOL_FACTOR: f64 = 0.0555;

/// User's preferred display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mg/dL", alias = "mgdl")]
    #[default]
    MgDl,
    #[serde(rename = "mmol/L", alias = "mmol")]
    MmolL,
}

impl GlucoseUnit {
    /// Multiplier applied to device-unit values for this display unit.
    pub fn factor(self) -> f64 {
        match self {
            GlucoseUnit::MgDl => 1.0,
            GlucoseUnit::MmolL => MMOL_FACTOR,
        }
    }

    /// Decimal places shown for in-range values.
    pub fn decimals(self) -> usize {
        match self {
            GlucoseUnit::MgDl => 0,
            GlucoseUnit::MmolL => 1,
        }
    }

    /// Get the unit label
    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }

    /// Convert a device-unit value to this display unit.
    pub fn convert(self, device_value: f64) -> f64 {
        device_value * self.factor()
    }

    /// The sensor low floor expressed in this display unit.
    pub fn low_floor(self) -> f64 {
        self.convert(f64::from(SENSOR_LOW_FLOOR))
    }

    /// Format a converted glucose value for display.
    ///
    /// Values under the 39 mg/dL-equivalent floor are rounded to two
    /// decimals and printed with one decimal place regardless of unit.
    pub fn format_value(self, converted: f64) -> String {
        if converted < self.low_floor() {
            format!("{:.1}", (converted * 100.0).round() / 100.0)
        } else {
            format!("{:.*}", self.decimals(), converted)
        }
    }

    /// Format a 5-minute-normalized delta with sign prefix and unit suffix,
    /// e.g. "+10mg/dL". `near_low` selects the one-decimal precision used
    /// when the current reading sits below the sensor floor.
    pub fn format_delta(self, delta: f64, near_low: bool) -> String {
        let value = if near_low {
            format!("{:.1}", (delta * 100.0).round() / 100.0)
        } else {
            format!("{:.*}", self.decimals(), delta)
        };
        if delta > 0.0 {
            format!("+{}{}", value, self.label())
        } else {
            format!("{}{}", value, self.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_factors() {
        assert_eq!(GlucoseUnit::MgDl.convert(100.0), 100.0);
        assert!((GlucoseUnit::MmolL.convert(100.0) - 5.55).abs() < 1e-9);
    }

    #[test]
    fn test_format_in_range() {
        assert_eq!(GlucoseUnit::MgDl.format_value(110.0), "110");
        assert_eq!(GlucoseUnit::MmolL.format_value(6.105), "6.1");
    }

    #[test]
    fn test_format_below_floor_always_one_decimal() {
        // 38 mg/dL sits under the floor: one decimal even in mg/dL mode
        assert_eq!(GlucoseUnit::MgDl.format_value(38.0), "38.0");
        // and in mmol/L mode (38 * 0.0555 = 2.109, rounds to 2.11, shown as 2.1)
        assert_eq!(GlucoseUnit::MmolL.format_value(2.109), "2.1");
    }

    #[test]
    fn test_format_is_monotonic_in_value() {
        let samples = [30.0, 39.0, 70.0, 110.0, 250.0, 399.0];
        let mut last = f64::MIN;
        for v in samples {
            let parsed: f64 = GlucoseUnit::MgDl.format_value(v).parse().unwrap();
            assert!(parsed >= last);
            last = parsed;
        }
    }

    #[test]
    fn test_format_delta_sign_and_suffix() {
        assert_eq!(GlucoseUnit::MgDl.format_delta(10.0, false), "+10mg/dL");
        assert_eq!(GlucoseUnit::MgDl.format_delta(-5.0, false), "-5mg/dL");
        assert_eq!(GlucoseUnit::MgDl.format_delta(0.0, false), "0mg/dL");
        assert_eq!(GlucoseUnit::MmolL.format_delta(0.55, false), "+0.6mmol/L");
    }

    #[test]
    fn test_unit_serde_names() {
        assert_eq!(
            serde_json::from_str::<GlucoseUnit>("\"mg/dL\"").unwrap(),
            GlucoseUnit::MgDl
        );
        assert_eq!(
            serde_json::from_str::<GlucoseUnit>("\"mgdl\"").unwrap(),
            GlucoseUnit::MgDl
        );
        assert_eq!(
            serde_json::from_str::<GlucoseUnit>("\"mmol/L\"").unwrap(),
            GlucoseUnit::MmolL
        );
    }
}
