//! Raw-sensor calibration
//!
//! Reconstructs an uncalibrated glucose estimate from the unfiltered sensor
//! channel using a linear calibration record (slope/intercept/scale). Used
//! when the reported value is unreliable: below the sensor floor, missing
//! its filtered channel, or noisy.

use log::debug;

use crate::readings::{CalibrationRecord, CanonicalReading, NoiseLevel};

/// Reconstruct a raw glucose estimate for one reading.
///
/// When the filtered channel is invalid (zero, or the reading clipped at
/// the sensor floor) the plain linear model is applied to the unfiltered
/// channel. Otherwise the filtered/reported ratio rescales the unfiltered
/// estimate so it stays anchored to the official calibration.
pub fn calibrate(reading: &CanonicalReading, cal: &CalibrationRecord) -> f64 {
    if cal.slope == 0.0 {
        // Degenerate record; nothing sane can be reconstructed.
        return 0.0;
    }
    let unfiltered = cal.scale * (reading.unfiltered - cal.intercept) / cal.slope;
    if reading.filtered == 0.0 || reading.below_floor() {
        return unfiltered;
    }
    let ratio = cal.scale * (reading.filtered - cal.intercept) / cal.slope / f64::from(reading.sgv);
    if ratio == 0.0 {
        return unfiltered;
    }
    unfiltered / ratio
}

/// Rewrite the `sgv` of every window entry that needs raw adjustment.
///
/// Entries below the floor or with an invalid filtered channel always get
/// the plain reconstruction; noisy entries with a usable unfiltered channel
/// get the ratio-anchored one, truncated to device units. Clean entries are
/// left untouched.
pub fn adjust_window(readings: &mut [CanonicalReading], cal: &CalibrationRecord) {
    for (i, r) in readings.iter_mut().enumerate() {
        if r.filtered == 0.0 || r.below_floor() {
            r.sgv = calibrate(r, cal) as i32;
            debug!("raw egv {} {}", i, r.sgv);
        } else if r.noise != NoiseLevel::Clean && r.unfiltered != 0.0 {
            r.sgv = calibrate(r, cal) as i32;
            debug!("raw egv {} {}", i, r.sgv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::Trend;

    fn reading(sgv: i32, filtered: f64, unfiltered: f64, noise: NoiseLevel) -> CanonicalReading {
        CanonicalReading {
            date: 1_700_000_000_000,
            sgv,
            filtered,
            unfiltered,
            noise,
            trend: Trend::Flat,
            device: "dexcom".to_string(),
            is_sgv: true,
        }
    }

    #[test]
    fn test_identity_calibration_round_trip() {
        // filtered=0 with slope=1/intercept=0/scale=1 must reproduce the
        // unfiltered channel exactly
        let cal = CalibrationRecord {
            slope: 1.0,
            intercept: 0.0,
            scale: 1.0,
        };
        let r = reading(120, 0.0, 98_765.0, NoiseLevel::Light);
        assert_eq!(calibrate(&r, &cal), 98_765.0);
    }

    #[test]
    fn test_below_floor_ignores_filtered_channel() {
        let cal = CalibrationRecord {
            slope: 1.0,
            intercept: 0.0,
            scale: 1.0,
        };
        let r = reading(20, 50_000.0, 40_000.0, NoiseLevel::Medium);
        assert_eq!(calibrate(&r, &cal), 40_000.0);
    }

    #[test]
    fn test_ratio_anchored_reconstruction() {
        let cal = CalibrationRecord {
            slope: 1000.0,
            intercept: 30_000.0,
            scale: 1.0,
        };
        // filtered estimate = (130_000 - 30_000) / 1000 = 100 = sgv,
        // so ratio is 1 and the unfiltered estimate passes through.
        let r = reading(100, 130_000.0, 150_000.0, NoiseLevel::Light);
        assert!((calibrate(&r, &cal) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_slope() {
        let cal = CalibrationRecord {
            slope: 0.0,
            intercept: 0.0,
            scale: 1.0,
        };
        let r = reading(100, 0.0, 150_000.0, NoiseLevel::Light);
        assert_eq!(calibrate(&r, &cal), 0.0);
    }

    #[test]
    fn test_window_adjustment_skips_clean_entries() {
        let cal = CalibrationRecord {
            slope: 1.0,
            intercept: 0.0,
            scale: 1.0,
        };
        let mut window = vec![
            reading(100, 120.0, 130.0, NoiseLevel::Clean),
            reading(20, 0.0, 90.0, NoiseLevel::Clean),
            reading(100, 100.0, 140.0, NoiseLevel::Medium),
        ];
        adjust_window(&mut window, &cal);
        // Clean in-range entry untouched
        assert_eq!(window[0].sgv, 100);
        // Below-floor entry rebuilt from the unfiltered channel
        assert_eq!(window[1].sgv, 90);
        // Noisy entry rebuilt via the ratio formula: ratio = 100/100 = 1
        assert_eq!(window[2].sgv, 140);
    }
}
