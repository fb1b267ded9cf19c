//! One refresh cycle
//!
//! fetch (network, may suspend) -> compute (pure) -> deliver (network,
//! fire-and-forget) -> persist. Each trigger runs the pipeline once; there
//! are no retries and no cancellation. Every cycle completes with some
//! payload, whatever the upstream did.
//!
//! AlertState is read at the start and written at the end without a lock;
//! triggers arriving faster than a network round trip can race. The
//! external scheduler fires well below that rate, so the race is accepted
//! rather than guarded.

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::{Config, SourceMode};
use crate::engine;
use crate::error::CgmError;
use crate::nightscout::NightscoutSource;
use crate::payload::OutputPayload;
use crate::source;
use crate::storage::StateStore;
use crate::timeline::TimelineClient;

/// Run one full refresh cycle. `trigger_id` is advisory, passed along by
/// the caller for log correlation only.
pub async fn refresh(
    config: &Config,
    store: &StateStore,
    http: &reqwest::Client,
    timeline: &mut TimelineClient,
    trigger_id: i64,
) -> Result<OutputPayload, CgmError> {
    debug!("Refresh triggered (id {})", trigger_id);

    let Some(data_source) = source::select(config, http) else {
        return Ok(OutputPayload::unconfigured());
    };

    timeline.establish(config.account_identifier()).await;

    // Raw mode needs the calibration record up front; any failure just
    // disables raw for this cycle.
    let calibration = if config.raw && config.mode == SourceMode::Nightscout {
        NightscoutSource::new(http.clone(), &config.api)
            .fetch_calibration()
            .await
    } else {
        None
    };

    let state = store.load()?;

    match data_source.fetch().await {
        Ok(readings) => {
            info!(
                "Fetched {} readings from {}",
                readings.len(),
                data_source.name()
            );
            let now_ms = Utc::now().timestamp_millis();
            let eval = engine::evaluate(&readings, config, &state, calibration.as_ref(), now_ms);
            if let Some(pin) = &eval.pin {
                if let Err(e) = timeline.put_pin(pin).await {
                    warn!("Pin delivery failed: {}", e);
                }
            }
            store.save(&eval.state)?;
            Ok(eval.payload)
        }
        Err(e) => {
            warn!("{} fetch failed: {}", data_source.name(), e);
            Ok(OutputPayload::for_fetch_error(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::API_URL_ROOT;

    #[tokio::test]
    async fn test_unconfigured_cycle_emits_setup_payload() {
        let config = Config::default();
        let store = StateStore::in_memory().unwrap();
        let http = reqwest::Client::new();
        let mut timeline = TimelineClient::new(http.clone(), API_URL_ROOT);
        let payload = refresh(&config, &store, &http, &mut timeline, 99)
            .await
            .unwrap();
        assert_eq!(payload, OutputPayload::unconfigured());
    }

    #[tokio::test]
    async fn test_rogue_cycle_emits_soft_error_without_state_change() {
        let config = Config {
            mode: SourceMode::Rogue,
            ..Config::default()
        };
        let store = StateStore::in_memory().unwrap();
        let before = store.load().unwrap();
        let http = reqwest::Client::new();
        let mut timeline = TimelineClient::new(http.clone(), API_URL_ROOT);
        let payload = refresh(&config, &store, &http, &mut timeline, 99)
            .await
            .unwrap();
        assert_eq!(payload.egv, "exc");
        assert_eq!(payload.delta, "data err");
        // fetch errors never advance the alert state
        assert_eq!(store.load().unwrap(), before);
    }
}
