//! The `Strategy` enum: a single tagged union over all ten backoff
//! strategies, dispatched by `match` rather than trait objects, per the
//! closed, enumerable strategy family this crate implements.

use std::time::Duration;

use patience_core::{AttemptIndex, BackoffContext, CapturedOutput};

use crate::adaptive::Adaptive;
use crate::diophantine::Diophantine;
use crate::http_aware::HttpAware;
use crate::simple::{DecorrelatedJitter, Exponential, Fibonacci, Fixed, FullJitter, Linear, Polynomial};

/// One of the ten backoff strategies. Variants carry their own
/// validated configuration; `Adaptive` additionally carries mutable
/// feedback state.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Constant delay.
    Fixed(Fixed),
    /// Delay grows linearly with the attempt index.
    Linear(Linear),
    /// Delay grows geometrically with the attempt index.
    Exponential(Exponential),
    /// Delay grows as a power of the attempt index.
    Polynomial(Polynomial),
    /// Delay follows the Fibonacci sequence.
    Fibonacci(Fibonacci),
    /// Uniform random delay up to an exponential ceiling.
    FullJitter(FullJitter),
    /// AWS-style decorrelated jitter, using the previous delay as state.
    DecorrelatedJitter(DecorrelatedJitter),
    /// Prefers a server-advertised delay, falling back to a wrapped
    /// strategy.
    HttpAware(HttpAware),
    /// Widens or relaxes based on outcome feedback rather than attempt
    /// index.
    Adaptive(Adaptive),
    /// Delays follow successive differences of a fixed offset table.
    Diophantine(Diophantine),
}

impl Strategy {
    /// Computes the delay before the next attempt described by `ctx`.
    pub fn delay(&mut self, ctx: &BackoffContext<'_>) -> Duration {
        self.delay_raw(ctx.attempt.get(), ctx.previous_delay)
    }

    pub(crate) fn delay_raw(&mut self, attempt: u32, previous_delay: Option<Duration>) -> Duration {
        let idx = AttemptIndex::new(attempt).unwrap_or(AttemptIndex::FIRST);
        match self {
            Strategy::Fixed(s) => s.delay(idx),
            Strategy::Linear(s) => s.delay(idx),
            Strategy::Exponential(s) => s.delay(idx),
            Strategy::Polynomial(s) => s.delay(idx),
            Strategy::Fibonacci(s) => s.delay(idx),
            Strategy::FullJitter(s) => s.delay(idx),
            Strategy::DecorrelatedJitter(s) => s.delay(previous_delay),
            Strategy::HttpAware(s) => s.delay(attempt, previous_delay),
            Strategy::Adaptive(s) => s.delay(attempt, previous_delay),
            Strategy::Diophantine(s) => s.delay(attempt),
        }
    }

    /// Lets strategies that read response content (`HttpAware`) inspect
    /// the most recent attempt's captured output. A no-op for every other
    /// variant.
    pub fn observe_output(&mut self, output: &CapturedOutput) {
        if let Strategy::HttpAware(s) = self {
            s.observe_output(output);
        }
    }

    /// Lets strategies that adapt to feedback (`Adaptive`) record the
    /// delay used, whether the attempt succeeded, and how long it took. A
    /// no-op for every other variant.
    pub fn record_outcome(&mut self, delay_used: Duration, success: bool, latency: Duration) {
        if let Strategy::Adaptive(s) = self {
            s.record_outcome(delay_used, success, latency);
        }
    }

    /// `true` for the strategy that reads attempt output.
    pub fn observes_output(&self) -> bool {
        matches!(self, Strategy::HttpAware(_))
    }

    /// `true` for the strategy that adapts to outcome feedback.
    pub fn adapts_to_outcome(&self) -> bool {
        matches!(self, Strategy::Adaptive(_))
    }

    /// The full planned offset table, for the one strategy (`Diophantine`)
    /// whose schedule is known entirely up front. `None` for every other
    /// variant, whose delays depend on runtime feedback.
    pub fn retry_offsets(&self) -> Option<&[Duration]> {
        match self {
            Strategy::Diophantine(s) => Some(s.offsets()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patience_core::AttemptIndex as Idx;

    fn ctx(attempt: u32, previous_delay: Option<Duration>) -> BackoffContext<'static> {
        BackoffContext { attempt: Idx::new(attempt).unwrap(), previous_delay, last_output: None }
    }

    #[test]
    fn fixed_dispatches_through_enum() {
        let mut strategy = Strategy::Fixed(Fixed::new(Duration::from_millis(25)));
        assert_eq!(strategy.delay(&ctx(1, None)), Duration::from_millis(25));
        assert_eq!(strategy.delay(&ctx(5, None)), Duration::from_millis(25));
    }

    #[test]
    fn only_http_aware_observes_output() {
        let fixed = Strategy::Fixed(Fixed::new(Duration::from_millis(10)));
        assert!(!fixed.observes_output());
        let wrapped = Strategy::HttpAware(HttpAware::new(
            Strategy::Fixed(Fixed::new(Duration::from_millis(10))),
            Duration::from_secs(5),
        ));
        assert!(wrapped.observes_output());
    }

    #[test]
    fn only_adaptive_adapts_to_outcome() {
        let linear = Strategy::Linear(Linear::new(Duration::from_millis(10), Duration::from_secs(1)));
        assert!(!linear.adapts_to_outcome());
        let adaptive = Strategy::Adaptive(
            Adaptive::new(Strategy::Fixed(Fixed::new(Duration::from_millis(10))), 0.5, 5).unwrap(),
        );
        assert!(adaptive.adapts_to_outcome());
    }

    #[test]
    fn decorrelated_jitter_dispatch_uses_previous_delay() {
        let mut strategy = Strategy::DecorrelatedJitter(
            DecorrelatedJitter::new(Duration::from_millis(100), 3.0, Duration::from_secs(1)).unwrap(),
        );
        assert_eq!(strategy.delay(&ctx(1, None)), Duration::from_millis(100));
        let second = strategy.delay(&ctx(2, Some(Duration::from_millis(100))));
        assert!(second >= Duration::from_millis(100) && second <= Duration::from_secs(1));
    }
}
