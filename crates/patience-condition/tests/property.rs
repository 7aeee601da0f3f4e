//! Property tests for classification precedence.

use patience_condition::ConditionEvaluator;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn failure_pattern_always_wins_when_both_match(
        exit_code in any::<i32>(),
        stdout in "[a-z]{0,20}",
    ) {
        let evaluator = ConditionEvaluator::new(Some("[a-z]"), Some("[a-z]"), false).unwrap();
        if !stdout.is_empty() {
            let result = evaluator.eval(exit_code, &stdout, "");
            prop_assert!(result.is_hard_failure());
        }
    }

    #[test]
    fn without_any_pattern_classification_depends_only_on_exit_code(
        exit_code in any::<i32>(),
        stdout in ".{0,40}",
        stderr in ".{0,40}",
    ) {
        let evaluator = ConditionEvaluator::new(None, None, false).unwrap();
        let result = evaluator.eval(exit_code, &stdout, &stderr);
        prop_assert_eq!(result.is_success(), exit_code == 0);
    }

    #[test]
    fn case_insensitive_matching_is_never_stricter_than_case_sensitive(
        stdout in "[A-Za-z]{1,20}",
    ) {
        let sensitive = ConditionEvaluator::new(None, Some("xyz"), false).unwrap();
        let insensitive = ConditionEvaluator::new(None, Some("xyz"), true).unwrap();
        if sensitive.eval(1, &stdout, "").is_hard_failure() {
            prop_assert!(insensitive.eval(1, &stdout, "").is_hard_failure());
        }
    }
}
