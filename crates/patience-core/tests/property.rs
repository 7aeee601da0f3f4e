//! Property tests for the shared attempt-index type.

use patience_core::AttemptIndex;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn new_accepts_only_strictly_positive_values(n in 0u32..10_000) {
        let built = AttemptIndex::new(n);
        if n == 0 {
            prop_assert!(built.is_none());
        } else {
            prop_assert_eq!(built.unwrap().get(), n);
        }
    }

    #[test]
    fn next_never_produces_a_non_positive_index(n in 1u32..u32::MAX) {
        let idx = AttemptIndex::new(n).unwrap();
        prop_assert!(idx.next().get() >= 1);
    }

    #[test]
    fn next_is_strictly_increasing_except_at_saturation(n in 1u32..u32::MAX) {
        let idx = AttemptIndex::new(n).unwrap();
        let next = idx.next();
        prop_assert!(next.get() >= idx.get());
        if n < u32::MAX {
            prop_assert_eq!(next.get(), n + 1);
        }
    }
}
