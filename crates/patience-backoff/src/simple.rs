//! The non-adaptive, stateless-except-for-RNG backoff strategies:
//! `Fixed`, `Linear`, `Exponential`, `Polynomial`, `Fibonacci`,
//! `FullJitter`, `DecorrelatedJitter`.

use std::time::Duration;

use patience_core::AttemptIndex;
use rand::Rng;

use crate::error::BackoffConfigError;

fn check_multiplier(mult: f64) -> Result<(), BackoffConfigError> {
    if mult > 0.0 {
        Ok(())
    } else {
        Err(BackoffConfigError::NonPositiveMultiplier(mult))
    }
}

/// `min(base * factor, max)`, computed entirely in `f64` seconds so a huge
/// `factor` (large exponential/polynomial exponent) saturates to `max`
/// instead of panicking the way `Duration::mul_f64` would on overflow.
/// Assumes `factor >= 0`.
fn scale_duration_saturating(base: Duration, factor: f64, max: Duration) -> Duration {
    let base_secs = base.as_secs_f64();
    if base_secs == 0.0 {
        return Duration::ZERO;
    }
    let max_secs = max.as_secs_f64();
    let product_secs = base_secs * factor;
    if !product_secs.is_finite() || product_secs >= max_secs {
        return max;
    }
    Duration::from_secs_f64(product_secs)
}

/// Always returns the same delay.
#[derive(Debug, Clone, Copy)]
pub struct Fixed {
    delay: Duration,
}

impl Fixed {
    /// Builds a fixed-delay strategy.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// `d`.
    pub fn delay(&self, _attempt: AttemptIndex) -> Duration {
        self.delay
    }
}

/// `min(base * attempt, max)`.
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    base: Duration,
    max: Duration,
}

impl Linear {
    /// Builds a linear backoff, capped at `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// `min(base * attempt, max)`.
    pub fn delay(&self, attempt: AttemptIndex) -> Duration {
        self.base.saturating_mul(attempt.get()).min(self.max)
    }
}

/// `min(base * mult^(attempt-1), max)`; overflow saturates at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    base: Duration,
    mult: f64,
    max: Duration,
}

impl Exponential {
    /// Builds an exponential backoff. Rejects `mult <= 0`.
    pub fn new(base: Duration, mult: f64, max: Duration) -> Result<Self, BackoffConfigError> {
        check_multiplier(mult)?;
        Ok(Self { base, mult, max })
    }

    /// `min(base * mult^(attempt-1), max)`.
    pub fn delay(&self, attempt: AttemptIndex) -> Duration {
        let exponent = (attempt.get() - 1) as i32;
        let factor = self.mult.powi(exponent);
        scale_duration_saturating(self.base, factor, self.max)
    }
}

/// `min(base * attempt^exp, max)`; requires `exp >= 0`, `base > 0`,
/// `base <= max`.
#[derive(Debug, Clone, Copy)]
pub struct Polynomial {
    base: Duration,
    exp: f64,
    max: Duration,
}

impl Polynomial {
    /// Builds a polynomial backoff, validating `exp >= 0` and `0 < base <= max`.
    pub fn new(base: Duration, exp: f64, max: Duration) -> Result<Self, BackoffConfigError> {
        if exp < 0.0 {
            return Err(BackoffConfigError::NegativeExponent(exp));
        }
        if base.is_zero() {
            return Err(BackoffConfigError::NonPositiveBase(base));
        }
        if base > max {
            return Err(BackoffConfigError::BaseExceedsMax { base, max });
        }
        Ok(Self { base, exp, max })
    }

    /// `min(base * attempt^exp, max)`.
    pub fn delay(&self, attempt: AttemptIndex) -> Duration {
        let factor = (attempt.get() as f64).powf(self.exp);
        scale_duration_saturating(self.base, factor, self.max)
    }
}

/// 1-indexed Fibonacci sequence: `F(1) = F(2) = 1`, `F(n) = F(n-1) + F(n-2)`.
fn fibonacci(n: u32) -> u64 {
    if n <= 2 {
        return 1;
    }
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 3..=n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}

/// `min(base * F(attempt), max)`.
#[derive(Debug, Clone, Copy)]
pub struct Fibonacci {
    base: Duration,
    max: Duration,
}

impl Fibonacci {
    /// Builds a Fibonacci backoff.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// `min(base * F(attempt), max)`.
    pub fn delay(&self, attempt: AttemptIndex) -> Duration {
        self.base.saturating_mul(fibonacci(attempt.get()) as u32).min(self.max)
    }
}

/// Uniform random delay in `[0, min(base*mult^(attempt-1), max)]`.
#[derive(Debug, Clone, Copy)]
pub struct FullJitter {
    base: Duration,
    mult: f64,
    max: Duration,
}

impl FullJitter {
    /// Builds a full-jitter backoff. Rejects `mult <= 0`.
    pub fn new(base: Duration, mult: f64, max: Duration) -> Result<Self, BackoffConfigError> {
        check_multiplier(mult)?;
        Ok(Self { base, mult, max })
    }

    fn ceiling(&self, attempt: AttemptIndex) -> Duration {
        let exponent = (attempt.get() - 1) as i32;
        let factor = self.mult.powi(exponent);
        scale_duration_saturating(self.base, factor, self.max)
    }

    /// A uniform sample in `[0, ceiling(attempt)]`.
    pub fn delay(&self, attempt: AttemptIndex) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling.is_zero() {
            return Duration::ZERO;
        }
        let sampled: f64 = rand::rng().random_range(0.0..=ceiling.as_secs_f64());
        Duration::from_secs_f64(sampled)
    }
}

/// AWS decorrelated jitter: `d_1 = base`;
/// `d_{n+1} = uniform(base, min(max, d_n * mult))`.
#[derive(Debug, Clone, Copy)]
pub struct DecorrelatedJitter {
    base: Duration,
    mult: f64,
    max: Duration,
}

impl DecorrelatedJitter {
    /// Builds a decorrelated-jitter backoff. Rejects `mult <= 0`.
    pub fn new(base: Duration, mult: f64, max: Duration) -> Result<Self, BackoffConfigError> {
        check_multiplier(mult)?;
        Ok(Self { base, mult, max })
    }

    /// `previous_delay` is the delay used before the current attempt
    /// (`None` before the first attempt, giving `d_1 = base`).
    pub fn delay(&self, previous_delay: Option<Duration>) -> Duration {
        let Some(prev) = previous_delay else {
            return self.base;
        };
        let ceiling = scale_duration_saturating(prev, self.mult, self.max).max(self.base);
        let sampled = rand::rng().random_range(self.base.as_secs_f64()..=ceiling.as_secs_f64());
        Duration::from_secs_f64(sampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(n: u32) -> AttemptIndex {
        AttemptIndex::new(n).unwrap()
    }

    #[test]
    fn fixed_always_same() {
        let f = Fixed::new(Duration::from_millis(50));
        assert_eq!(f.delay(attempt(1)), Duration::from_millis(50));
        assert_eq!(f.delay(attempt(9)), Duration::from_millis(50));
    }

    #[test]
    fn linear_grows_and_caps() {
        let l = Linear::new(Duration::from_millis(100), Duration::from_millis(250));
        assert_eq!(l.delay(attempt(1)), Duration::from_millis(100));
        assert_eq!(l.delay(attempt(2)), Duration::from_millis(200));
        assert_eq!(l.delay(attempt(3)), Duration::from_millis(250));
    }

    #[test]
    fn exponential_grows_and_caps() {
        let e = Exponential::new(Duration::from_millis(10), 2.0, Duration::from_millis(100)).unwrap();
        assert_eq!(e.delay(attempt(1)), Duration::from_millis(10));
        assert_eq!(e.delay(attempt(2)), Duration::from_millis(20));
        assert_eq!(e.delay(attempt(3)), Duration::from_millis(40));
        assert_eq!(e.delay(attempt(10)), Duration::from_millis(100));
    }

    #[test]
    fn exponential_rejects_nonpositive_multiplier() {
        assert!(Exponential::new(Duration::from_millis(10), 0.0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn exponential_saturates_instead_of_overflowing_at_high_attempt_counts() {
        let e = Exponential::new(Duration::from_millis(100), 2.0, Duration::from_secs(30)).unwrap();
        for n in [69, 100, 1000] {
            assert_eq!(e.delay(attempt(n)), Duration::from_secs(30));
        }
    }

    #[test]
    fn polynomial_validates_constraints() {
        assert!(Polynomial::new(Duration::ZERO, 2.0, Duration::from_secs(1)).is_err());
        assert!(Polynomial::new(Duration::from_secs(2), 2.0, Duration::from_secs(1)).is_err());
        assert!(Polynomial::new(Duration::from_millis(10), -1.0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn polynomial_computes_power_curve() {
        let p = Polynomial::new(Duration::from_millis(10), 2.0, Duration::from_secs(10)).unwrap();
        assert_eq!(p.delay(attempt(3)), Duration::from_millis(90));
    }

    #[test]
    fn polynomial_saturates_instead_of_overflowing_at_high_attempt_counts() {
        let p = Polynomial::new(Duration::from_millis(100), 5.0, Duration::from_secs(30)).unwrap();
        assert_eq!(p.delay(attempt(1000)), Duration::from_secs(30));
    }

    #[test]
    fn fibonacci_sequence_matches_1_1_2_3_5() {
        assert_eq!(fibonacci(1), 1);
        assert_eq!(fibonacci(2), 1);
        assert_eq!(fibonacci(3), 2);
        assert_eq!(fibonacci(4), 3);
        assert_eq!(fibonacci(5), 5);
    }

    #[test]
    fn fibonacci_strategy_caps() {
        let f = Fibonacci::new(Duration::from_millis(100), Duration::from_millis(300));
        assert_eq!(f.delay(attempt(1)), Duration::from_millis(100));
        assert_eq!(f.delay(attempt(4)), Duration::from_millis(300));
    }

    #[test]
    fn full_jitter_stays_within_range() {
        let fj = FullJitter::new(Duration::from_millis(100), 2.0, Duration::from_secs(1)).unwrap();
        for _ in 0..50 {
            let d = fj.delay(attempt(3));
            assert!(d <= Duration::from_millis(400));
        }
    }

    #[test]
    fn full_jitter_ceiling_saturates_instead_of_overflowing_at_high_attempt_counts() {
        let fj = FullJitter::new(Duration::from_millis(100), 2.0, Duration::from_secs(30)).unwrap();
        for n in [69, 1000] {
            assert!(fj.delay(attempt(n)) <= Duration::from_secs(30));
        }
    }

    #[test]
    fn decorrelated_jitter_first_delay_is_base() {
        let dj = DecorrelatedJitter::new(Duration::from_millis(100), 3.0, Duration::from_secs(5)).unwrap();
        assert_eq!(dj.delay(None), Duration::from_millis(100));
    }

    #[test]
    fn decorrelated_jitter_stays_in_bounds() {
        let dj = DecorrelatedJitter::new(Duration::from_millis(100), 3.0, Duration::from_secs(1)).unwrap();
        for _ in 0..50 {
            let d = dj.delay(Some(Duration::from_millis(200)));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_secs(1));
        }
    }
}
