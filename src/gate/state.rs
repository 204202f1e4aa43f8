//! Two-state hysteresis gate with dwell-time debounce.
//!
//! Owned by a single session and driven block by block, so plain fields
//! are enough; there is no shared state to synchronize.

use std::time::Duration;

use serde::Serialize;

use super::threshold::ThresholdPair;

/// Gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No sound above the noise floor. Energy feeds the noise window.
    #[default]
    Off,
    /// Sound present.
    On,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
        }
    }
}

/// A state change the machine just made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    Closed,
}

/// Debounced OFF/ON machine.
#[derive(Debug, Clone)]
pub struct GateMachine {
    state: GateState,
    last_transition: Option<Duration>,
    min_on_time: Duration,
    min_off_time: Duration,
}

impl GateMachine {
    pub fn new(min_on_time: Duration, min_off_time: Duration) -> Self {
        Self {
            state: GateState::Off,
            last_transition: None,
            min_on_time,
            min_off_time,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Time of the most recent transition, `None` before the first one.
    pub fn last_transition(&self) -> Option<Duration> {
        self.last_transition
    }

    /// Time spent in the current state as of `now`. A `now` earlier than the
    /// last transition counts as zero.
    fn dwell(&self, now: Duration) -> Option<Duration> {
        self.last_transition.map(|t| now.saturating_sub(t))
    }

    fn dwell_satisfied(&self, now: Duration, minimum: Duration) -> bool {
        self.dwell(now).map_or(true, |d| d >= minimum)
    }

    /// Evaluate one block's energy. A threshold crossing that arrives before
    /// the dwell time has elapsed is dropped, not deferred.
    pub fn evaluate(
        &mut self,
        energy: f64,
        thresholds: ThresholdPair,
        now: Duration,
    ) -> Option<Transition> {
        match self.state {
            GateState::Off => {
                if energy > thresholds.attack && self.dwell_satisfied(now, self.min_off_time) {
                    self.enter(GateState::On, now);
                    return Some(Transition::Opened);
                }
            }
            GateState::On => {
                if energy < thresholds.release && self.dwell_satisfied(now, self.min_on_time) {
                    self.enter(GateState::Off, now);
                    return Some(Transition::Closed);
                }
            }
        }
        None
    }

    fn enter(&mut self, state: GateState, now: Duration) {
        self.state = state;
        // Never move the stamp backwards.
        self.last_transition = Some(match self.last_transition {
            Some(prev) => prev.max(now),
            None => now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: ThresholdPair = ThresholdPair {
        attack: 6.0,
        release: 2.5,
    };

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn machine() -> GateMachine {
        GateMachine::new(ms(80), ms(50))
    }

    #[test]
    fn test_hysteresis_band() {
        let mut gate = machine();
        assert_eq!(gate.evaluate(7.0, TH, ms(1000)), Some(Transition::Opened));
        assert_eq!(gate.state(), GateState::On);
        // Between thresholds: stays on.
        assert_eq!(gate.evaluate(4.0, TH, ms(1200)), None);
        assert_eq!(gate.state(), GateState::On);
        assert_eq!(gate.evaluate(2.0, TH, ms(1300)), Some(Transition::Closed));
        assert_eq!(gate.state(), GateState::Off);
    }

    #[test]
    fn test_first_transition_needs_no_dwell() {
        let mut gate = machine();
        assert_eq!(gate.last_transition(), None);
        assert_eq!(gate.evaluate(7.0, TH, Duration::ZERO), Some(Transition::Opened));
        assert_eq!(gate.last_transition(), Some(Duration::ZERO));
    }

    #[test]
    fn test_min_off_time_enforced() {
        let mut gate = machine();
        gate.evaluate(7.0, TH, ms(1000));
        gate.evaluate(0.0, TH, ms(1100));
        assert_eq!(gate.state(), GateState::Off);
        let t0 = ms(1100);

        assert_eq!(gate.evaluate(9.0, TH, t0 + ms(10)), None);
        assert_eq!(gate.state(), GateState::Off);
        assert_eq!(gate.last_transition(), Some(t0));

        assert_eq!(
            gate.evaluate(9.0, TH, t0 + ms(51)),
            Some(Transition::Opened)
        );
    }

    #[test]
    fn test_min_on_time_enforced() {
        let mut gate = machine();
        let t0 = ms(500);
        gate.evaluate(7.0, TH, t0);

        assert_eq!(gate.evaluate(0.0, TH, t0 + ms(79)), None);
        assert_eq!(gate.state(), GateState::On);
        assert_eq!(gate.evaluate(0.0, TH, t0 + ms(80)), Some(Transition::Closed));
    }

    #[test]
    fn test_infinite_thresholds_never_open() {
        let mut gate = machine();
        for i in 0..100 {
            assert_eq!(
                gate.evaluate(1e9, ThresholdPair::UNCALIBRATED, ms(i * 23)),
                None
            );
        }
        assert_eq!(gate.state(), GateState::Off);
    }

    #[test]
    fn test_clock_going_backwards_blocks_transition() {
        let mut gate = machine();
        gate.evaluate(7.0, TH, ms(1000));
        assert_eq!(gate.evaluate(0.0, TH, ms(900)), None);
        assert_eq!(gate.last_transition(), Some(ms(1000)));
    }

    #[test]
    fn test_display() {
        assert_eq!(GateState::Off.to_string(), "off");
        assert_eq!(GateState::On.to_string(), "on");
    }
}
