//! Property tests for the backoff strategy family.
//!
//! Invariants tested:
//! - Exponential/linear/polynomial delays never exceed their configured cap
//! - Exponential delays are monotonically non-decreasing in the attempt
//! - Full-jitter samples never exceed their ceiling
//! - Decorrelated-jitter samples stay within `[base, max]`

use std::time::Duration;

use patience_backoff::{DecorrelatedJitter, Exponential, Fixed, FullJitter, Linear, Strategy};
use patience_core::{AttemptIndex, BackoffContext};
use proptest::prelude::*;

fn ctx(attempt: u32, previous_delay: Option<Duration>) -> BackoffContext<'static> {
    BackoffContext { attempt: AttemptIndex::new(attempt).unwrap(), previous_delay, last_output: None }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn exponential_never_exceeds_cap(
        base_ms in 1u64..500,
        mult in 1.0f64..5.0,
        max_ms in 500u64..5000,
        attempt in 1u32..30,
    ) {
        let strategy = Exponential::new(Duration::from_millis(base_ms), mult, Duration::from_millis(max_ms)).unwrap();
        let delay = strategy.delay(AttemptIndex::new(attempt).unwrap());
        prop_assert!(delay <= Duration::from_millis(max_ms));
    }

    #[test]
    fn exponential_is_monotonic_in_attempt(
        base_ms in 1u64..500,
        mult in 1.0f64..5.0,
        max_ms in 500u64..50_000,
        attempt in 1u32..29,
    ) {
        let strategy = Exponential::new(Duration::from_millis(base_ms), mult, Duration::from_millis(max_ms)).unwrap();
        let this_delay = strategy.delay(AttemptIndex::new(attempt).unwrap());
        let next_delay = strategy.delay(AttemptIndex::new(attempt + 1).unwrap());
        prop_assert!(next_delay >= this_delay);
    }

    #[test]
    fn linear_never_exceeds_cap(
        base_ms in 1u64..500,
        max_ms in 500u64..5000,
        attempt in 1u32..100,
    ) {
        let strategy = Linear::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms));
        let delay = strategy.delay(AttemptIndex::new(attempt).unwrap());
        prop_assert!(delay <= Duration::from_millis(max_ms));
    }

    #[test]
    fn full_jitter_never_exceeds_ceiling(
        base_ms in 1u64..500,
        mult in 1.0f64..4.0,
        max_ms in 500u64..5000,
        attempt in 1u32..20,
    ) {
        let strategy = FullJitter::new(Duration::from_millis(base_ms), mult, Duration::from_millis(max_ms)).unwrap();
        let delay = strategy.delay(AttemptIndex::new(attempt).unwrap());
        prop_assert!(delay <= Duration::from_millis(max_ms));
    }

    #[test]
    fn decorrelated_jitter_stays_within_base_and_max(
        base_ms in 1u64..500,
        mult in 1.0f64..4.0,
        max_ms in 500u64..5000,
        previous_ms in 0u64..5000,
    ) {
        let strategy = DecorrelatedJitter::new(Duration::from_millis(base_ms), mult, Duration::from_millis(max_ms)).unwrap();
        let delay = strategy.delay(Some(Duration::from_millis(previous_ms)));
        prop_assert!(delay >= Duration::from_millis(base_ms));
        prop_assert!(delay <= Duration::from_millis(max_ms.max(base_ms)));
    }

    #[test]
    fn strategy_enum_dispatch_matches_direct_call(
        delay_ms in 0u64..10_000,
        attempt in 1u32..20,
    ) {
        let direct = Fixed::new(Duration::from_millis(delay_ms));
        let mut via_enum = Strategy::Fixed(direct);
        prop_assert_eq!(via_enum.delay(&ctx(attempt, None)), Duration::from_millis(delay_ms));
    }
}
