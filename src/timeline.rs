//! Timeline pin delivery and subscription housekeeping
//!
//! History records go out as timeline pins, keyed by a topic derived from
//! the account identifier. Pin ids are bucketed to the nearest 5 minutes,
//! so several readings inside one bucket overwrite a single history entry
//! instead of piling up. Delivery is fire-and-forget: a failed pin or a
//! failed subscription never blocks the outbound payload.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::PinContent;

/// The timeline public URL root
pub const API_URL_ROOT: &str = "https://timeline-api.getpebble.com/";

/// How long a pin stays relevant, in minutes.
const PIN_DURATION: u32 = 5;

/// Derive the subscription topic from the account identifier.
///
/// Java-style 32-bit string hash (`h = h*31 + unit` over UTF-16 code
/// units, wrapping), rendered in decimal. Must stay stable across
/// versions or every user would be resubscribed to a new topic.
pub fn topic_for(identifier: &str) -> String {
    let mut hash: i32 = 0;
    for unit in identifier.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.to_string()
}

/// Timeline pin document, PUT as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    /// ISO-8601 timestamp of the reading.
    pub time: String,
    pub duration: u32,
    pub layout: PinLayout,
    pub actions: Vec<PinAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinLayout {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "tinyIcon")]
    pub tiny_icon: String,
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinAction {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "launchCode")]
    pub launch_code: u32,
}

fn snooze_actions() -> Vec<PinAction> {
    let action = |title: &str, launch_code| PinAction {
        title: title.to_string(),
        kind: "openWatchApp".to_string(),
        launch_code,
    };
    vec![
        action("Return to SPARK", 1),
        action("Snooze for 15 min", 15),
        action("Snooze for 30 min", 30),
        action("Snooze for 45 min", 45),
        action("Cancel snooze", 2),
    ]
}

/// Wrap engine pin content into the full pin document for a topic.
pub fn build_pin(content: &PinContent, topic: &str) -> Pin {
    let when: DateTime<Utc> =
        DateTime::from_timestamp_millis(content.time_ms).unwrap_or_default();
    // Nearest-5 bucket of the minute-of-hour; collapses same-bucket readings.
    let bucket = 5 * ((f64::from(when.minute()) / 5.0).round() as u32);
    Pin {
        id: format!("pin-egv{}{}", topic, bucket),
        time: when.to_rfc3339_opts(SecondsFormat::Millis, true),
        duration: PIN_DURATION,
        layout: PinLayout {
            kind: "genericPin".to_string(),
            title: content.title.clone(),
            body: content.body.clone(),
            tiny_icon: "system://images/GLUCOSE_MONITOR".to_string(),
            background_color: "#FF5500".to_string(),
        },
        actions: snooze_actions(),
    }
}

/// Client for the subscription registry and pin endpoint.
///
/// At most one topic is active at a time; housekeeping reconciles the
/// registry towards that desired state whenever the account identifier
/// changes.
pub struct TimelineClient {
    http: reqwest::Client,
    root: String,
    topic: Option<String>,
}

impl TimelineClient {
    pub fn new(http: reqwest::Client, root: &str) -> Self {
        Self {
            http,
            root: root.to_string(),
            topic: None,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Establish the subscription for an account identifier.
    ///
    /// On any failure of the token fetch or subscribe call, history
    /// delivery stays disabled for the rest of the session; the payload
    /// path is unaffected. On success, every other active topic is
    /// unsubscribed.
    pub async fn establish(&mut self, identifier: &str) {
        if identifier.is_empty() {
            self.topic = None;
            return;
        }
        let topic = topic_for(identifier);
        if self.topic.as_deref() == Some(topic.as_str()) {
            return;
        }
        match self.subscribe(&topic).await {
            Ok(()) => {
                info!("Subscribed to topic {}", topic);
                if let Err(e) = self.unsubscribe_stale(&topic).await {
                    warn!("Subscription cleanup failed: {}", e);
                }
                self.topic = Some(topic);
            }
            Err(e) => {
                warn!("History delivery disabled: {}", e);
                self.topic = None;
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<(), reqwest::Error> {
        // A delivery token must exist before the registry accepts topics.
        self.http
            .get(format!("{}v1/tokens", self.root))
            .send()
            .await?
            .error_for_status()?;
        self.http
            .put(format!("{}v1/subscriptions/{}", self.root, topic))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Desired-state reconciliation: drop every topic except the current
    /// one. Idempotent; individual delete failures are only logged.
    async fn unsubscribe_stale(&self, current: &str) -> Result<(), reqwest::Error> {
        let topics: Vec<String> = self
            .http
            .get(format!("{}v1/subscriptions", self.root))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        for topic in topics.iter().filter(|t| t.as_str() != current) {
            let result = self
                .http
                .delete(format!("{}v1/subscriptions/{}", self.root, topic))
                .send()
                .await
                .and_then(|r| r.error_for_status());
            if let Err(e) = result {
                warn!("Could not unsubscribe stale topic {}: {}", topic, e);
            }
        }
        Ok(())
    }

    /// Deliver a history pin. Silently skipped when no topic is
    /// established.
    pub async fn put_pin(&self, content: &PinContent) -> Result<(), reqwest::Error> {
        let Some(topic) = self.topic.as_deref() else {
            debug!("No topic established, skipping pin");
            return Ok(());
        };
        let pin = build_pin(content, topic);
        self.http
            .put(format!("{}v1/shared/pins/{}", self.root, pin.id))
            .header("X-API-Key", "")
            .header("X-Pin-Topics", topic)
            .json(&pin)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
