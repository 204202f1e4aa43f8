//! Adaptive sound-activity gate.
//!
//! A [`GateSession`] owns the noise window, the hysteresis machine and the
//! checked configuration for one capture session. Each block goes through
//! the same steps, in order:
//!
//! 1. reduce the block to one energy value (dB)
//! 2. if the gate is OFF, push that energy into the noise window
//! 3. recompute attack/release thresholds from the window
//! 4. let the state machine decide whether to open or close
//!
//! The session does no I/O, so it can be driven from a real-time callback,
//! a dedicated thread or a test.

pub mod noise_floor;
pub mod preprocess;
pub mod state;
pub mod threshold;

use std::time::Duration;

use serde::Serialize;
use tracing::{info, trace};

use crate::audio::AudioBlock;
use crate::config::{GateConfig, GateParams};
use crate::error::GateResult;

pub use noise_floor::{NoiseStatistics, NoiseWindow};
pub use preprocess::Preprocessor;
pub use state::{GateMachine, GateState, Transition};
pub use threshold::ThresholdPair;

/// Result of processing one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    NoEvent,
    Opened,
    Closed,
}

impl From<Option<Transition>> for GateDecision {
    fn from(t: Option<Transition>) -> Self {
        match t {
            Some(Transition::Opened) => Self::Opened,
            Some(Transition::Closed) => Self::Closed,
            None => Self::NoEvent,
        }
    }
}

/// Point-in-time view of a session, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateSnapshot {
    pub state: GateState,
    pub calibrated: bool,
    pub window_len: usize,
    pub window_capacity: usize,
    /// `None` while calibrating.
    pub attack_db: Option<f64>,
    pub release_db: Option<f64>,
    pub noise_mean_db: f64,
    pub noise_std_db: f64,
    pub last_energy_db: Option<f64>,
    pub blocks_processed: u64,
}

/// One gate session: configuration, noise window and hysteresis state.
#[derive(Debug, Clone)]
pub struct GateSession {
    params: GateParams,
    preprocessor: Preprocessor,
    window: NoiseWindow,
    machine: GateMachine,
    thresholds: ThresholdPair,
    last_energy: Option<f64>,
    blocks_processed: u64,
}

impl GateSession {
    /// Validate `config` and start a fresh session in the OFF state.
    pub fn new(config: &GateConfig) -> GateResult<Self> {
        Ok(Self::from_params(config.validate()?))
    }

    pub fn from_params(params: GateParams) -> Self {
        Self {
            preprocessor: Preprocessor::new(params.preemphasis, params.block_size),
            window: NoiseWindow::new(params.window_capacity),
            machine: GateMachine::new(params.min_on_time, params.min_off_time),
            thresholds: ThresholdPair::UNCALIBRATED,
            last_energy: None,
            blocks_processed: 0,
            params,
        }
    }

    /// Run one block through the gate. `now` is a monotonic timestamp.
    pub fn process(&mut self, block: &AudioBlock<'_>, now: Duration) -> GateDecision {
        let energy = self.preprocessor.energy(block);
        self.process_energy(energy, now)
    }

    /// Same as [`process`](Self::process) for an energy computed elsewhere.
    pub fn process_energy(&mut self, energy: f64, now: Duration) -> GateDecision {
        self.blocks_processed += 1;
        self.last_energy = Some(energy);

        // Energy measured while ON must not raise the noise floor.
        if self.machine.state() == GateState::Off {
            self.window.push(energy);
        }

        self.thresholds = threshold::compute(
            self.window.statistics(),
            self.params.attack_factor,
            self.params.release_factor,
            self.window.len(),
            self.window.capacity(),
        );

        let decision = GateDecision::from(self.machine.evaluate(energy, self.thresholds, now));

        trace!(
            energy,
            attack = self.thresholds.attack,
            release = self.thresholds.release,
            state = %self.machine.state(),
            "Block processed"
        );
        if decision != GateDecision::NoEvent {
            info!(
                ?decision,
                energy,
                attack = self.thresholds.attack,
                release = self.thresholds.release,
                at_ms = now.as_millis() as u64,
                "Gate transition"
            );
        }

        decision
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    pub fn state(&self) -> GateState {
        self.machine.state()
    }

    /// Thresholds computed for the most recent block.
    pub fn thresholds(&self) -> ThresholdPair {
        self.thresholds
    }

    pub fn noise_statistics(&self) -> NoiseStatistics {
        self.window.statistics()
    }

    /// True once the noise window has filled.
    pub fn is_calibrated(&self) -> bool {
        self.window.is_full()
    }

    pub fn window(&self) -> &NoiseWindow {
        &self.window
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window_capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn last_energy(&self) -> Option<f64> {
        self.last_energy
    }

    pub fn last_transition(&self) -> Option<Duration> {
        self.machine.last_transition()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let stats = self.noise_statistics();
        let finite = |v: f64| v.is_finite().then_some(v);
        GateSnapshot {
            state: self.state(),
            calibrated: self.is_calibrated(),
            window_len: self.window_len(),
            window_capacity: self.window_capacity(),
            attack_db: finite(self.thresholds.attack),
            release_db: finite(self.thresholds.release),
            noise_mean_db: stats.mean,
            noise_std_db: stats.std,
            last_energy_db: self.last_energy,
            blocks_processed: self.blocks_processed,
        }
    }
}
