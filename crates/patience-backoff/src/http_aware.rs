//! The `HTTPAware` strategy: prefers a server-advertised delay
//! (`Retry-After`, vendor rate-limit headers, JSON body hints) over its own
//! curve, falling back to a wrapped strategy when the last attempt's
//! output carried no hint.

use std::time::Duration;

use patience_core::CapturedOutput;
use patience_http::RetryHintParser;

use crate::strategy::Strategy;

/// Wraps a fallback [`Strategy`] and overrides its next delay whenever
/// [`observe_output`](Self::observe_output) found a usable hint.
#[derive(Debug, Clone)]
pub struct HttpAware {
    fallback: Box<Strategy>,
    parser: RetryHintParser,
    pending_override: Option<Duration>,
}

impl HttpAware {
    /// `fallback` is consulted when the most recent output carried no
    /// hint; `max_delay` bounds any hint-derived delay.
    pub fn new(fallback: Strategy, max_delay: Duration) -> Self {
        Self { fallback: Box::new(fallback), parser: RetryHintParser::new(max_delay), pending_override: None }
    }

    /// Parses the previous attempt's output for a retry hint, to be
    /// consumed by the next [`delay`](Self::delay) call.
    pub fn observe_output(&mut self, output: &CapturedOutput) {
        let hint = self.parser.parse(&output.stdout, &output.stderr, output.exit_code, &[]);
        self.pending_override = hint.delay;
    }

    /// The hint-derived delay if one was observed since the last call,
    /// otherwise the fallback strategy's delay.
    pub fn delay(&mut self, attempt: u32, previous_delay: Option<Duration>) -> Duration {
        match self.pending_override.take() {
            Some(delay) => delay,
            None => self.fallback.delay_raw(attempt, previous_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::Fixed;

    fn output_with(stdout: &str) -> CapturedOutput {
        CapturedOutput { exit_code: 0, stdout: stdout.to_string(), stderr: String::new(), ..Default::default() }
    }

    #[test]
    fn uses_fallback_when_no_hint_observed() {
        let mut http_aware = HttpAware::new(Strategy::Fixed(Fixed::new(Duration::from_millis(50))), Duration::from_secs(60));
        assert_eq!(http_aware.delay(1, None), Duration::from_millis(50));
    }

    #[test]
    fn prefers_observed_hint_over_fallback() {
        let mut http_aware = HttpAware::new(Strategy::Fixed(Fixed::new(Duration::from_millis(50))), Duration::from_secs(60));
        http_aware.observe_output(&output_with("Retry-After: 3\r\n"));
        assert_eq!(http_aware.delay(1, None), Duration::from_secs(3));
    }

    #[test]
    fn hint_is_consumed_once() {
        let mut http_aware = HttpAware::new(Strategy::Fixed(Fixed::new(Duration::from_millis(50))), Duration::from_secs(60));
        http_aware.observe_output(&output_with("Retry-After: 3\r\n"));
        assert_eq!(http_aware.delay(1, None), Duration::from_secs(3));
        assert_eq!(http_aware.delay(2, None), Duration::from_millis(50));
    }
}
