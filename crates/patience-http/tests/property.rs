//! Property tests for retry-hint extraction.

use std::time::Duration;

use patience_http::RetryHintParser;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn parsing_never_panics_on_arbitrary_bytes(
        stdout in ".{0,500}",
        stderr in ".{0,500}",
        exit_code in any::<i32>(),
    ) {
        let parser = RetryHintParser::new(Duration::from_secs(60));
        let _ = parser.parse(&stdout, &stderr, exit_code, &[]);
    }

    #[test]
    fn a_derived_delay_never_exceeds_the_configured_ceiling(
        seconds in 0u64..1000,
        max_secs in 1u64..120,
    ) {
        let stdout = format!("Retry-After: {seconds}\n");
        let parser = RetryHintParser::new(Duration::from_secs(max_secs));
        let hint = parser.parse(&stdout, "", 429, &[]);
        if let Some(delay) = hint.delay {
            prop_assert!(delay <= Duration::from_secs(max_secs));
        }
    }
}
