//! Gate notifications and the broadcast hub that fans them out.
//!
//! The gate never prints. Anything that wants to react to presence changes
//! (the stdout bridge, a logger, a downstream trigger) subscribes here.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::gate::NoiseStatistics;
use crate::gate::ThresholdPair;

/// Default number of events a slow subscriber may lag behind.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Observable gate events, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum GateEvent {
    /// Session started; the noise floor is being learned.
    Calibrating { seconds: f64, window_blocks: usize },
    /// Noise window filled; thresholds are live.
    Calibrated {
        noise_mean_db: f64,
        noise_std_db: f64,
        attack_db: f64,
        release_db: f64,
    },
    /// Sound present.
    On { at_ms: u64, energy_db: f64 },
    /// Sound absent again.
    Off { at_ms: u64, energy_db: f64 },
    /// Non-fatal capture problem; processing continues.
    StreamInterrupted { reason: String },
}

impl GateEvent {
    pub fn calibrated(stats: NoiseStatistics, thresholds: ThresholdPair) -> Self {
        Self::Calibrated {
            noise_mean_db: stats.mean,
            noise_std_db: stats.std,
            attack_db: thresholds.attack,
            release_db: thresholds.release,
        }
    }

    pub fn on(at: Duration, energy_db: f64) -> Self {
        Self::On {
            at_ms: at.as_millis() as u64,
            energy_db,
        }
    }

    pub fn off(at: Duration, energy_db: f64) -> Self {
        Self::Off {
            at_ms: at.as_millis() as u64,
            energy_db,
        }
    }
}

/// Fan-out of [`GateEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<GateEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Attach a new consumer. It sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers; returns how many received it.
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: GateEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_sees_events_in_order() {
        let hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let on = GateEvent::on(Duration::from_millis(2000), -10.0);
        let off = GateEvent::off(Duration::from_millis(2100), -60.0);
        assert_eq!(hub.publish(on.clone()), 2);
        hub.publish(off.clone());

        assert_eq!(a.recv().await.unwrap(), on);
        assert_eq!(a.recv().await.unwrap(), off);
        assert_eq!(b.recv().await.unwrap(), on);
        assert_eq!(b.recv().await.unwrap(), off);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::new(4);
        assert_eq!(hub.publish(GateEvent::on(Duration::ZERO, 0.0)), 0);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(GateEvent::on(Duration::from_millis(1500), -3.5)).unwrap();
        assert_eq!(json["event"], "on");
        assert_eq!(json["data"]["at_ms"], 1500);
        assert_eq!(json["data"]["energy_db"], -3.5);
    }
}
