//! Data source abstraction
//!
//! A source fetches a short series of recent readings from its remote API
//! and maps them into the canonical model, newest first. The engine never
//! sees source-specific shapes.

use async_trait::async_trait;

use crate::config::{Config, SourceMode};
use crate::error::FetchError;
use crate::nightscout::NightscoutSource;
use crate::readings::CanonicalReading;
use crate::share::ShareSource;

/// Contract every remote data source implements.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch the most recent readings, newest first. An empty upstream
    /// result is the soft [`FetchError::EmptyData`], not a success.
    async fn fetch(&self) -> Result<Vec<CanonicalReading>, FetchError>;

    /// Human-readable name for logging (e.g. "nightscout", "share").
    fn name(&self) -> &str;
}

/// Stub for a user-provided source. Kept so the mode exists end to end,
/// but it fetches nothing.
pub struct RogueSource;

#[async_trait]
impl Source for RogueSource {
    async fn fetch(&self) -> Result<Vec<CanonicalReading>, FetchError> {
        Err(FetchError::EmptyData)
    }

    fn name(&self) -> &str {
        "rogue"
    }
}

/// Build the source selected by configuration. `None` means nothing is
/// configured and the cycle should emit the setup payload instead.
pub fn select(config: &Config, http: &reqwest::Client) -> Option<Box<dyn Source>> {
    match config.mode {
        SourceMode::Nightscout => Some(Box::new(NightscoutSource::new(http.clone(), &config.api))),
        SourceMode::Share => Some(Box::new(ShareSource::new(
            http.clone(),
            &config.account_name,
            &config.password,
            &config.region,
        ))),
        SourceMode::Rogue => Some(Box::new(RogueSource)),
        SourceMode::Unconfigured => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rogue_source_is_a_noop() {
        let source = RogueSource;
        assert_eq!(source.name(), "rogue");
        assert!(matches!(source.fetch().await, Err(FetchError::EmptyData)));
    }

    #[test]
    fn test_unconfigured_selects_nothing() {
        let http = reqwest::Client::new();
        assert!(select(&Config::default(), &http).is_none());
    }

    #[test]
    fn test_mode_selects_matching_source() {
        let http = reqwest::Client::new();
        let config = Config {
            mode: SourceMode::Nightscout,
            api: "https://cgm.example.com".to_string(),
            ..Config::default()
        };
        let source = select(&config, &http).unwrap();
        assert_eq!(source.name(), "nightscout");
    }
}
