//! The `patience` binary: parses flags, resolves layered configuration,
//! builds a [`RetryDriver`], and translates its [`RunResult`] into a
//! process exit code. The only crate in the workspace allowed
//! to call `std::process::exit`.

mod cli;
mod config;
mod daemon;
mod strategy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use patience_core::{Outcome, PatienceError, RateLimitFact, RunResult};
use patience_discovery::DiscoveryStore;
use patience_driver::{CoordinationConfig, DriverConfig, RetryDriver};
use patience_runner::ChildRunner;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if cli.common.daemon_foreground {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => fail(&format!("could not start async runtime: {err}")),
        };
        if let Err(err) = runtime.block_on(daemon::run_foreground(&cli.common)) {
            fail(&format!("daemon exited with error: {err}"));
        }
        return;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => fail(&format!("could not start async runtime: {err}")),
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => std::process::exit(code),
        Err(err) => fail(&err.to_string()),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("patience: {message}");
    std::process::exit(1)
}

async fn run(cli: Cli) -> Result<i32, PatienceError> {
    let resolved = config::resolve(&cli)?;

    if cli.common.debug_config {
        eprintln!("{}", resolved.debug_dump());
        return Ok(0);
    }

    let argv = strategy::command_argv(cli.strategy.as_ref())?;
    let strategy = strategy::build_strategy(cli.strategy.as_ref(), &resolved)?;
    let condition = strategy::build_condition(&resolved)?;

    let daemon_client =
        daemon::connect_if_requested(resolved.daemon, resolved.daemon_auto_start, &resolved.daemon_socket, resolved.daemon_timeout)
            .await;

    let coordination = match (&resolved.resource_id, resolved.rate_limit) {
        (Some(resource_id), Some(limit)) => Some(CoordinationConfig {
            resource_id: resource_id.clone(),
            limit,
            window: resolved.rate_window.unwrap_or(Duration::from_secs(60)),
        }),
        _ => None,
    };

    let discovery = match &resolved.discovery_db {
        Some(path) => Some(Arc::new(open_discovery_store(path)?)),
        None => None,
    };

    let driver_config = DriverConfig {
        argv,
        per_attempt_deadline: resolved.timeout,
        max_attempts: resolved.attempts,
        strategy,
        condition,
        runner: ChildRunner::default(),
        coordination,
        daemon_client,
        discovery,
    };

    let mut driver = RetryDriver::new(driver_config);
    let result = driver.run().await?;
    Ok(exit_code_for(&result))
}

fn open_discovery_store(path: &PathBuf) -> Result<DiscoveryStore, PatienceError> {
    DiscoveryStore::open(path, RateLimitFact::EXPIRY).map_err(|e| PatienceError::Config(e.to_string()))
}

/// Translates a [`RunResult`] into a process exit code:
/// `0` on success, `1` on a hard failure, otherwise the child's last exit
/// code with the `-1` timeout sentinel rendered as `255`.
fn exit_code_for(result: &RunResult) -> i32 {
    if result.success {
        return 0;
    }
    if result.stats.outcome == Outcome::HardFailed {
        return 1;
    }
    if result.timed_out {
        return 255;
    }
    if result.exit_code < 0 {
        return 1;
    }
    result.exit_code
}

#[cfg(test)]
mod tests {
    use super::*;
    use patience_core::RunMetrics;
    use patience_core::RunStats;

    fn result(success: bool, timed_out: bool, exit_code: i32, outcome: Outcome) -> RunResult {
        let mut stats = RunStats::default();
        stats.outcome = outcome;
        RunResult { success, attempt_count: 1, exit_code, timed_out, reason: "test".to_string(), stats, metrics: RunMetrics::default() }
    }

    #[test]
    fn success_is_exit_0() {
        assert_eq!(exit_code_for(&result(true, false, 0, Outcome::Succeeded)), 0);
    }

    #[test]
    fn timeout_renders_as_255() {
        assert_eq!(exit_code_for(&result(false, true, -1, Outcome::Exhausted)), 255);
    }

    #[test]
    fn otherwise_uses_childs_exit_code() {
        assert_eq!(exit_code_for(&result(false, false, 7, Outcome::Exhausted)), 7);
    }

    #[test]
    fn negative_exit_code_without_timeout_falls_back_to_1() {
        assert_eq!(exit_code_for(&result(false, false, -1, Outcome::Exhausted)), 1);
    }

    #[test]
    fn hard_failure_is_exit_1_regardless_of_child_exit_code() {
        assert_eq!(exit_code_for(&result(false, false, 0, Outcome::HardFailed)), 1);
    }
}
