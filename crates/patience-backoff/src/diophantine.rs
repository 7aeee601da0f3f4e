//! The `Diophantine` strategy: delays follow the successive differences of
//! a fixed, user-supplied offset table rather than a closed-form curve.

use std::time::Duration;

use crate::error::BackoffConfigError;

/// `delay(1) = 0`; for `k > 1`,
/// `delay(k) = offsets[min(k-1, len-1)] - offsets[min(k-2, len-1)]`.
#[derive(Debug, Clone)]
pub struct Diophantine {
    offsets: Vec<Duration>,
}

impl Diophantine {
    /// `offsets` must be non-empty; it is taken as-is, in attempt order.
    pub fn new(offsets: Vec<Duration>) -> Result<Self, BackoffConfigError> {
        if offsets.is_empty() {
            return Err(BackoffConfigError::EmptyList("retry_offsets"));
        }
        Ok(Self { offsets })
    }

    /// The full offset table this strategy was built from, in attempt
    /// order, for callers that need to see the whole planned schedule
    /// rather than one attempt's delay (e.g. registering it with a
    /// coordination daemon).
    pub fn offsets(&self) -> &[Duration] {
        &self.offsets
    }

    /// The delay before attempt `k` (1-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let last = self.offsets.len() - 1;
        let hi = ((attempt - 1) as usize).min(last);
        let lo = ((attempt - 2) as usize).min(last);
        self.offsets[hi].checked_sub(self.offsets[lo]).unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|&v| Duration::from_millis(v)).collect()
    }

    #[test]
    fn first_attempt_has_no_delay() {
        let d = Diophantine::new(ms(&[100, 300, 700])).unwrap();
        assert_eq!(d.delay(1), Duration::ZERO);
    }

    #[test]
    fn subsequent_attempts_take_successive_differences() {
        let d = Diophantine::new(ms(&[100, 300, 700])).unwrap();
        assert_eq!(d.delay(2), Duration::from_millis(100));
        assert_eq!(d.delay(3), Duration::from_millis(200));
        assert_eq!(d.delay(4), Duration::from_millis(400));
    }

    #[test]
    fn attempts_beyond_table_reuse_final_difference() {
        let d = Diophantine::new(ms(&[100, 300, 700])).unwrap();
        assert_eq!(d.delay(5), d.delay(4));
        assert_eq!(d.delay(10), d.delay(4));
    }

    #[test]
    fn rejects_empty_offsets() {
        assert!(Diophantine::new(Vec::new()).is_err());
    }
}
