//! Configuration a [`RetryDriver`](crate::driver::RetryDriver) is built
//! from.

use std::sync::Arc;
use std::time::Duration;

use patience_backoff::Strategy;
use patience_condition::ConditionEvaluator;
use patience_daemon::DaemonClient;
use patience_discovery::DiscoveryStore;
use patience_runner::ChildRunner;

/// Coordination settings used only when the configured strategy is
/// `Diophantine` and a daemon client is present.
#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    /// The resource identifier the schedule is registered against.
    pub resource_id: String,
    /// The rate limit enforced by the daemon's window ledger.
    pub limit: u64,
    /// The sliding window the limit applies to.
    pub window: Duration,
}

/// Everything one [`RetryDriver`](crate::driver::RetryDriver) run needs.
pub struct DriverConfig {
    /// The command to invoke, program first.
    pub argv: Vec<String>,
    /// Per-attempt deadline; `None` disables it.
    pub per_attempt_deadline: Option<Duration>,
    /// Maximum attempts, `1..=1000`.
    pub max_attempts: u32,
    /// The backoff strategy.
    pub strategy: Strategy,
    /// The success/failure condition evaluator.
    pub condition: ConditionEvaluator,
    /// The child runner.
    pub runner: ChildRunner,
    /// Diophantine coordination settings, if this run participates in
    /// daemon-mediated admission control.
    pub coordination: Option<CoordinationConfig>,
    /// The coordination daemon client, if `--daemon` was requested. Every
    /// RPC failure is absorbed and coordination is disabled for the rest
    /// of the run.
    pub daemon_client: Option<Arc<DaemonClient>>,
    /// The rate-limit discovery store, if persistence was requested.
    /// Writes are best-effort; a `DiscoveryWriteError` is logged, never
    /// fatal.
    pub discovery: Option<Arc<DiscoveryStore>>,
}
