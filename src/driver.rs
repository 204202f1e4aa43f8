//! Driver loop: feeds captured blocks to the gate session in order.
//!
//! The capture callback only fills the block ring. This loop is the single
//! consumer: it pops blocks strictly in capture order, runs each through the
//! session before touching the next, and publishes what happened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::audio::{BlockConsumer, CapturedBlock};
use crate::error::GateError;
use crate::events::{EventHub, GateEvent};
use crate::gate::{GateDecision, GateSession, GateSnapshot};

/// How long the loop sleeps when the ring is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Driver {
    session: GateSession,
    consumer: BlockConsumer,
    errors: mpsc::UnboundedReceiver<GateError>,
    hub: EventHub,
    snapshot_tx: watch::Sender<GateSnapshot>,
    running: Arc<AtomicBool>,
    calibration_announced: bool,
}

impl Driver {
    pub fn new(
        session: GateSession,
        consumer: BlockConsumer,
        errors: mpsc::UnboundedReceiver<GateError>,
        hub: EventHub,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(session.snapshot());
        Self {
            session,
            consumer,
            errors,
            hub,
            snapshot_tx,
            running,
            calibration_announced: false,
        }
    }

    /// Receiver for the latest session snapshot.
    pub fn snapshots(&self) -> watch::Receiver<GateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn session(&self) -> &GateSession {
        &self.session
    }

    /// Process every queued block and backend error. Returns the number of
    /// blocks processed.
    pub fn drain(&mut self) -> usize {
        while let Ok(err) = self.errors.try_recv() {
            warn!("{}", err);
            let reason = match err {
                GateError::StreamInterrupted { reason } => reason,
                other => other.to_string(),
            };
            self.hub.publish(GateEvent::StreamInterrupted { reason });
        }

        let mut processed = 0;
        while let Some(block) = self.consumer.pop() {
            self.handle_block(block);
            processed += 1;
        }
        if processed > 0 {
            self.snapshot_tx.send_replace(self.session.snapshot());
        }
        processed
    }

    fn handle_block(&mut self, block: CapturedBlock) {
        if !block.status.is_clean() {
            let reason = block.status.describe();
            warn!(
                reason = %reason,
                dropped_total = self.consumer.dropped_total(),
                "Audio stream interrupted"
            );
            self.hub.publish(GateEvent::StreamInterrupted { reason });
        }

        let now = block.captured_at;
        let decision = self.session.process(&block.as_block(), now);

        if !self.calibration_announced && self.session.is_calibrated() {
            self.calibration_announced = true;
            let stats = self.session.noise_statistics();
            let thresholds = self.session.thresholds();
            info!(
                noise_mean_db = stats.mean,
                noise_std_db = stats.std,
                attack_db = thresholds.attack,
                release_db = thresholds.release,
                "Noise floor calibrated"
            );
            self.hub.publish(GateEvent::calibrated(stats, thresholds));
        }

        let energy = self.session.last_energy().unwrap_or(f64::NEG_INFINITY);
        match decision {
            GateDecision::Opened => {
                self.hub.publish(GateEvent::on(now, energy));
            }
            GateDecision::Closed => {
                self.hub.publish(GateEvent::off(now, energy));
            }
            GateDecision::NoEvent => {}
        }

        self.consumer.recycle(block.samples);
    }

    /// Run until the shared `running` flag is cleared, then drain what is
    /// left and hand the session back.
    pub async fn run(mut self) -> GateSession {
        info!("Driver loop started");
        while self.running.load(Ordering::Relaxed) {
            if self.drain() == 0 {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        self.drain();
        info!(
            blocks = self.session.snapshot().blocks_processed,
            "Driver loop stopped"
        );
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{block_ring_buffer, BlockProducer, StreamStatus};
    use crate::config::GateConfig;
    use crate::gate::GateState;
    use tokio::sync::broadcast::error::TryRecvError;

    const BLOCK: usize = 64;
    const RATE: u32 = 8_000;

    /// 0.04 s calibration at 8 kHz / 64 frames = 5 blocks. A 5-block window
    /// is dominated by the loud block it admits, so the factors are lower
    /// than the defaults.
    fn config() -> GateConfig {
        GateConfig {
            sample_rate: RATE,
            block_size: BLOCK,
            calibration_seconds: 0.04,
            attack_factor: 1.5,
            release_factor: 0.5,
            ..Default::default()
        }
    }

    struct Rig {
        driver: Driver,
        producer: BlockProducer,
        errors: mpsc::UnboundedSender<GateError>,
        events: tokio::sync::broadcast::Receiver<GateEvent>,
        clock_ms: u64,
    }

    impl Rig {
        fn new() -> Self {
            let session = GateSession::new(&config()).unwrap();
            let (producer, consumer) = block_ring_buffer(Some(64));
            let (errors, err_rx) = mpsc::unbounded_channel();
            let hub = EventHub::default();
            let events = hub.subscribe();
            let running = Arc::new(AtomicBool::new(true));
            Self {
                driver: Driver::new(session, consumer, err_rx, hub, running),
                producer,
                errors,
                events,
                clock_ms: 0,
            }
        }

        fn feed(&mut self, amplitude: f32, status: StreamStatus) {
            let samples = (0..BLOCK)
                .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
                .collect();
            self.producer.push(CapturedBlock {
                samples,
                channels: 1,
                sample_rate: RATE,
                captured_at: Duration::from_millis(self.clock_ms),
                status,
            });
            self.clock_ms += 100;
        }

        fn events(&mut self) -> Vec<GateEvent> {
            let mut out = Vec::new();
            loop {
                match self.events.try_recv() {
                    Ok(e) => out.push(e),
                    Err(TryRecvError::Empty) => return out,
                    Err(e) => panic!("unexpected receive error: {e:?}"),
                }
            }
        }
    }

    #[test]
    fn test_calibration_then_on_off() {
        let mut rig = Rig::new();
        for _ in 0..4 {
            rig.feed(0.001, StreamStatus::default());
        }
        assert_eq!(rig.driver.drain(), 4);
        assert!(rig.events().is_empty());

        rig.feed(0.001, StreamStatus::default());
        rig.driver.drain();
        let events = rig.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GateEvent::Calibrated { .. }));

        rig.feed(0.9, StreamStatus::default());
        rig.feed(0.001, StreamStatus::default());
        assert_eq!(rig.driver.drain(), 2);
        let events = rig.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GateEvent::On { at_ms: 500, .. }));
        assert!(matches!(events[1], GateEvent::Off { at_ms: 600, .. }));
        assert_eq!(rig.driver.session().state(), GateState::Off);
    }

    #[test]
    fn test_status_flags_are_reported_and_processing_continues() {
        let mut rig = Rig::new();
        rig.feed(
            0.001,
            StreamStatus {
                input_overflow: true,
                input_discontinuity: false,
            },
        );
        rig.errors
            .send(GateError::StreamInterrupted {
                reason: "device hiccup".into(),
            })
            .unwrap();
        assert_eq!(rig.driver.drain(), 1);

        let events = rig.events();
        assert_eq!(
            events,
            vec![
                GateEvent::StreamInterrupted {
                    reason: "device hiccup".into()
                },
                GateEvent::StreamInterrupted {
                    reason: "input overflow".into()
                },
            ]
        );
        assert_eq!(rig.driver.session().window_len(), 1);
    }

    #[test]
    fn test_snapshot_published() {
        let mut rig = Rig::new();
        let rx = rig.driver.snapshots();
        assert_eq!(rx.borrow().blocks_processed, 0);
        rig.feed(0.001, StreamStatus::default());
        rig.feed(0.001, StreamStatus::default());
        rig.driver.drain();
        assert_eq!(rx.borrow().blocks_processed, 2);
        assert_eq!(rx.borrow().window_len, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_flag_and_drains() {
        let mut rig = Rig::new();
        rig.feed(0.001, StreamStatus::default());
        rig.driver.running.store(false, Ordering::Relaxed);
        let session = rig.driver.run().await;
        assert_eq!(session.window_len(), 1);
    }
}
