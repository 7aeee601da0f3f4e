//! The `Adaptive` strategy: a fallback curve nudged by a point estimate
//! learned from a bounded history of recent `(delay, success, latency)`
//! observations, the same "blend a model estimate with a safe default"
//! shape the teacher's own confidence-weighted layers use elsewhere.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::error::BackoffConfigError;
use crate::strategy::Strategy;

/// One recorded attempt: the delay that preceded it, whether it
/// succeeded, and how long it took.
type Observation = (Duration, bool, Duration);

/// Blends a wrapped fallback strategy with a point estimate learned from
/// a ring buffer of recent outcomes.
#[derive(Debug, Clone)]
pub struct Adaptive {
    fallback: Box<Strategy>,
    learning_rate: f64,
    memory_window: usize,
    history: VecDeque<Observation>,
}

impl Adaptive {
    /// `learning_rate` must be in `(0.0, 1.0]` (weight given to the
    /// learned point estimate over the fallback); `memory_window` must be
    /// `> 0` (how many recent observations are kept).
    pub fn new(fallback: Strategy, learning_rate: f64, memory_window: usize) -> Result<Self, BackoffConfigError> {
        if learning_rate <= 0.0 || learning_rate > 1.0 {
            return Err(BackoffConfigError::InvalidLearningRate(learning_rate));
        }
        if memory_window == 0 {
            return Err(BackoffConfigError::ZeroMemoryWindow);
        }
        Ok(Self { fallback: Box::new(fallback), learning_rate, memory_window, history: VecDeque::new() })
    }

    /// The shortest recorded delay whose empirical in-window success
    /// ratio exceeds 50%, or `None` if no delay clears that bar.
    fn point_estimate(&self) -> Option<Duration> {
        let mut by_delay: BTreeMap<Duration, (u32, u32)> = BTreeMap::new();
        for (delay, success, _latency) in &self.history {
            let entry = by_delay.entry(*delay).or_insert((0, 0));
            entry.1 += 1;
            if *success {
                entry.0 += 1;
            }
        }
        by_delay
            .into_iter()
            .find(|(_, (successes, total))| (*successes as f64) / (*total as f64) > 0.5)
            .map(|(delay, _)| delay)
    }

    /// A convex combination, weight `(1 - learning_rate)` on the
    /// fallback's own delay and `learning_rate` on the learned point
    /// estimate, falling back entirely to the fallback when no tuple in
    /// the window has cleared the 50% success bar yet.
    pub fn delay(&mut self, attempt: u32, previous_delay: Option<Duration>) -> Duration {
        let fallback_delay = self.fallback.delay_raw(attempt, previous_delay);
        let Some(estimate) = self.point_estimate() else {
            return fallback_delay;
        };
        let blended =
            fallback_delay.as_secs_f64() * (1.0 - self.learning_rate) + estimate.as_secs_f64() * self.learning_rate;
        Duration::from_secs_f64(blended.max(0.0))
    }

    /// Pushes `(delay_used, success, latency)` onto the ring buffer,
    /// evicting the oldest entry once `memory_window` is reached.
    pub fn record_outcome(&mut self, delay_used: Duration, success: bool, latency: Duration) {
        if self.history.len() >= self.memory_window {
            self.history.pop_front();
        }
        self.history.push_back((delay_used, success, latency));
    }
}
