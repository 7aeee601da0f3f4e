//! End-to-end scenarios driving real subprocesses through the full
//! attempt loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use patience_backoff::{Diophantine, Fixed, HttpAware, Strategy};
use patience_condition::ConditionEvaluator;
use patience_daemon::{Daemon, DaemonClient, DaemonConfig};
use patience_driver::{CoordinationConfig, DriverConfig, RetryDriver};
use patience_runner::ChildRunner;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn config(argv: Vec<String>, max_attempts: u32, strategy: Strategy, condition: ConditionEvaluator) -> DriverConfig {
    DriverConfig {
        argv,
        per_attempt_deadline: None,
        max_attempts,
        strategy,
        condition,
        runner: ChildRunner::default(),
        coordination: None,
        daemon_client: None,
        discovery: None,
    }
}

#[tokio::test]
async fn trivial_success_stops_after_one_attempt() {
    let mut driver = RetryDriver::new(config(
        sh("exit 0"),
        3,
        Strategy::Fixed(Fixed::new(Duration::from_millis(10))),
        ConditionEvaluator::new(None, None, false).unwrap(),
    ));

    let result = driver.run().await.unwrap();
    assert!(result.success);
    assert_eq!(result.attempt_count, 1);
    assert_eq!(result.reason, "exit code 0");
}

#[tokio::test]
async fn exhausted_failure_reports_max_retries_reached() {
    let mut driver = RetryDriver::new(config(
        sh("exit 1"),
        3,
        Strategy::Fixed(Fixed::new(Duration::from_millis(5))),
        ConditionEvaluator::new(None, None, false).unwrap(),
    ));

    let result = driver.run().await.unwrap();
    assert!(!result.success);
    assert_eq!(result.attempt_count, 3);
    assert_eq!(result.reason, "max retries reached (exit code 1)");
}

#[tokio::test]
async fn success_pattern_overrides_a_nonzero_exit_code() {
    let mut driver = RetryDriver::new(config(
        sh("echo 'deployment successful'; exit 1"),
        3,
        Strategy::Fixed(Fixed::new(Duration::from_millis(5))),
        ConditionEvaluator::new(Some("deployment successful"), None, false).unwrap(),
    ));

    let result = driver.run().await.unwrap();
    assert!(result.success);
    assert_eq!(result.attempt_count, 1);
    assert_eq!(result.reason, "success pattern matched");
}

#[tokio::test]
async fn failure_pattern_overrides_a_zero_exit_code() {
    let mut driver = RetryDriver::new(config(
        sh("echo 'fatal: disk full'; exit 0"),
        3,
        Strategy::Fixed(Fixed::new(Duration::from_millis(5))),
        ConditionEvaluator::new(None, Some("fatal"), false).unwrap(),
    ));

    let result = driver.run().await.unwrap();
    assert!(!result.success);
    assert_eq!(result.attempt_count, 1);
    assert_eq!(result.reason, "failure pattern matched");
}

#[tokio::test]
async fn http_aware_honors_a_zero_second_retry_after_instead_of_the_fallback_delay() {
    let fallback = Strategy::Fixed(Fixed::new(Duration::from_secs(30)));
    let strategy = Strategy::HttpAware(HttpAware::new(fallback, Duration::from_secs(60)));

    let mut driver = RetryDriver::new(config(
        sh("echo 'Retry-After: 0'; exit 1"),
        2,
        strategy,
        ConditionEvaluator::new(None, None, false).unwrap(),
    ));

    let start = std::time::Instant::now();
    let result = driver.run().await.unwrap();
    assert!(!result.success);
    assert_eq!(result.attempt_count, 2);
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "retry honored the 0s hint rather than the 30s fallback delay"
    );
}

#[tokio::test]
async fn diophantine_admission_registers_the_full_planned_schedule_with_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path: PathBuf = dir.path().join("d.sock");
    let daemon_config = DaemonConfig {
        socket_path: socket_path.clone(),
        pid_path: dir.path().join("d.pid"),
        max_ledger_entries: 10_000,
    };
    let (daemon, listener) = Daemon::bind(daemon_config).unwrap();
    tokio::spawn(Arc::new(daemon).serve(listener));

    let client = Arc::new(DaemonClient::new(socket_path.clone(), Duration::from_secs(5)));

    // Two offsets mean registering the full table should leave two
    // entries in the ledger, not one.
    let strategy = Strategy::Diophantine(Diophantine::new(vec![Duration::ZERO, Duration::ZERO]).unwrap());

    let mut cfg = config(sh("exit 0"), 1, strategy, ConditionEvaluator::new(None, None, false).unwrap());
    cfg.coordination = Some(CoordinationConfig {
        resource_id: "scenario-resource".to_string(),
        limit: 2,
        window: Duration::from_secs(10),
    });
    cfg.daemon_client = Some(client.clone());

    let mut driver = RetryDriver::new(cfg);
    let result = driver.run().await.unwrap();
    assert!(result.success);

    let answer = client.can_schedule("scenario-resource", 2, Duration::from_secs(10)).await.unwrap();
    assert!(!answer.can_schedule, "both planned offsets should already fill the limit-2 window");
}
