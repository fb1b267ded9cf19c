//! Normalization and alert engine
//!
//! Turns a newest-first canonical reading list plus user configuration and
//! the stored alert state into the outbound payload, the next alert state
//! and the timeline pin content. Pure computation: no I/O, no clock access
//! beyond the `now_ms` argument, so every rule here is directly testable.
//!
//! Display rules, evaluated in order (first match wins):
//! 1. sgv == 39            -> "low"  (sensor clipped at its floor)
//! 2. sgv > 400            -> "hgh"
//! 3. sgv < 39, raw off    -> "???"
//! 4. otherwise the converted value, with a 5-minute-normalized delta
//! Then, unconditionally: readings 15+ minutes old display as "old" with
//! no delta, and every 5 minutes of staleness the stale alert re-fires.

use crate::config::{Config, SourceMode};
use crate::payload::{OutputPayload, ALERT_HIGH, ALERT_LOW, ALERT_NONE, ALERT_STALE};
use crate::raw;
use crate::readings::{CalibrationRecord, CanonicalReading, NoiseLevel};
use crate::storage::AlertState;
use crate::units::{SENSOR_HIGH_CEILING, SENSOR_LOW_FLOOR};

/// Readings at least this old display as "old".
const STALE_AFTER_MINUTES: i64 = 15;

/// Sparkline window; entries outside it are dropped.
const WINDOW_MINUTES: i64 = 45;

/// Title/body/timestamp for the timeline pin; the timeline client wraps
/// this into the full pin document.
#[derive(Debug, Clone, PartialEq)]
pub struct PinContent {
    pub title: String,
    pub body: String,
    pub time_ms: i64,
}

/// Everything one engine pass produces.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub payload: OutputPayload,
    /// Alert state to persist after the payload is delivered.
    pub state: AlertState,
    /// Absent when there was nothing worth pinning (empty input).
    pub pin: Option<PinContent>,
}

/// Run the normalization and alert rules over one fetched reading list.
pub fn evaluate(
    readings: &[CanonicalReading],
    config: &Config,
    state: &AlertState,
    calibration: Option<&CalibrationRecord>,
    now_ms: i64,
) -> Evaluation {
    let Some(current) = readings.first() else {
        // Contract violation by the caller; degrade to the soft-error payload.
        return Evaluation {
            payload: OutputPayload::for_fetch_error(&crate::error::FetchError::EmptyData),
            state: *state,
            pin: None,
        };
    };

    let unit = config.unit;
    let mut rs = readings.to_vec();

    // Pin body reflects the reading as reported, before raw adjustment.
    let body = match config.mode {
        SourceMode::Share => "Dexcom Share".to_string(),
        _ => format!(
            "Trend: {}\nNoise: {}\nRaw(U): {}",
            current.trend.label(),
            current.noise.code(),
            current.unfiltered
        ),
    };

    // Raw mode needs a calibration record and a physical sensor relay.
    let raw_active = config.raw && calibration.is_some() && !current.is_virtual_relay();
    let mut raw_egv = 0.0;
    let mut noise_suffix = String::new();
    if raw_active {
        if let Some(cal) = calibration {
            // A clean current reading keeps its official value, but the
            // window entries still get recalculated below.
            if current.noise != NoiseLevel::Clean {
                raw_egv = raw::calibrate(current, cal);
            }
            raw::adjust_window(&mut rs, cal);
            noise_suffix = format!(" {}", rs[0].noise.code());
        }
    }

    let converted = unit.convert(f64::from(rs[0].sgv));
    let age_minutes = rs[0].age_minutes(now_ms);
    let near_low = converted < unit.low_floor();

    let mut egv;
    let mut delta;
    let mut trend;
    if rs[0].sgv == SENSOR_LOW_FLOOR {
        egv = "low".to_string();
        delta = "check bg".to_string();
        trend = 0;
    } else if rs[0].sgv > SENSOR_HIGH_CEILING {
        egv = "hgh".to_string();
        delta = "check bg".to_string();
        trend = 0;
    } else if rs[0].sgv < SENSOR_LOW_FLOOR && !raw_active {
        egv = "???".to_string();
        delta = "check bg".to_string();
        trend = 0;
    } else {
        egv = unit.format_value(converted);
        delta = match rs.get(1) {
            None => "can't calc".to_string(),
            Some(previous) => {
                let minutes = (rs[0].date - previous.date) as f64 / 60_000.0;
                if minutes <= 0.0 {
                    // Duplicate or out-of-order timestamps; rate undefined.
                    "can't calc".to_string()
                } else {
                    let previous_converted = unit.convert(f64::from(previous.sgv));
                    unit.format_delta((converted - previous_converted) / minutes * 5.0, near_low)
                }
            }
        };
        trend = rs[0].trend.display_code();
    }

    // Vibration de-duplication: a reading already notified stays silent.
    let mut vibe = if rs[0].date == state.last_id {
        0
    } else {
        config.vibe + 1
    };

    let mut alert = if converted <= config.low {
        ALERT_LOW
    } else if converted >= config.high {
        ALERT_HIGH
    } else {
        ALERT_NONE
    };

    // The reconstructed raw estimate wins the display slot when present.
    if raw_egv > 0.0 {
        egv = format!("{:.*}", unit.decimals(), raw_egv * unit.factor());
    }

    // Pin content is frozen before the staleness override; a stale cycle
    // still pins the last real value.
    let title = if config.mode != SourceMode::Share && rs[0].sgv <= SENSOR_LOW_FLOOR {
        format!("Special: {} {} {}", rs[0].sgv, egv, unit.label())
    } else {
        format!("{} {}", egv, unit.label())
    };
    let pin = Some(PinContent {
        title,
        body,
        time_ms: rs[0].date,
    });

    if age_minutes >= STALE_AFTER_MINUTES {
        delta = "no data".to_string();
        trend = 0;
        egv = "old".to_string();
        if age_minutes % 5 == 0 {
            // Periodic reminder: highest-priority alert, and vibration is
            // re-armed even though the reading id has not changed.
            alert = ALERT_STALE;
            vibe = config.vibe + 1;
        }
    }

    let (bgs, bg_times) = build_window(&rs, config.mode, now_ms);

    let payload = OutputPayload {
        delta: format!("{}{}", delta, noise_suffix),
        egv,
        trend,
        alert,
        vibe,
        id: rs[0].date,
        time_delta_int: age_minutes,
        bgs,
        bg_times,
    };
    let state = AlertState {
        last_id: rs[0].date,
        last_vibe: vibe,
    };
    Evaluation {
        payload,
        state,
        pin,
    }
}

/// Build the parallel sparkline arrays from readings inside the 45-minute
/// window. The Nightscout path additionally drops non-sgv entries and
/// below-floor values; Share has no such floor.
fn build_window(
    readings: &[CanonicalReading],
    mode: SourceMode,
    now_ms: i64,
) -> (String, String) {
    let floor_filter = mode == SourceMode::Nightscout;
    let mut bgs = Vec::new();
    let mut marks = Vec::new();
    for r in readings {
        let age = r.age_minutes(now_ms);
        if age >= WINDOW_MINUTES {
            continue;
        }
        if floor_filter && (!r.is_sgv || r.sgv < SENSOR_LOW_FLOOR) {
            continue;
        }
        bgs.push(r.sgv.to_string());
        marks.push((WINDOW_MINUTES - age).to_string());
    }
    (bgs.join(","), marks.join(","))
}
