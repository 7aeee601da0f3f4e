//! Layered configuration resolution: built-in
//! defaults, overridden by a discovered config file, overridden by the six
//! named environment variables, overridden by explicit CLI flags.
//!
//! Each layer is represented as a plain `Option<T>` bag; merging is a
//! left-to-right `.or()` chain rather than a value-equality comparison
//! against the default, since a user who explicitly passes `--attempts 3`
//! must not be indistinguishable from a user who passed nothing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use patience_core::PatienceError;
use serde::Deserialize;

use crate::cli::Cli;

/// One layer's view of the handful of settings that are also promoted to
/// environment variables and config-file keys (§6).
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    attempts: Option<u32>,
    timeout: Option<String>,
    success_pattern: Option<String>,
    failure_pattern: Option<String>,
    case_insensitive: Option<bool>,
    #[serde(default)]
    backoff: BackoffFileSection,
    #[serde(default)]
    daemon: DaemonFileSection,
}

/// The `[backoff]` table: strategy choice plus the parameters
/// `RETRY_DELAY`/`RETRY_MULTIPLIER`/`RETRY_MAX_DELAY` can also override.
#[derive(Debug, Default, Deserialize)]
struct BackoffFileSection {
    strategy: Option<String>,
    base: Option<String>,
    delay: Option<String>,
    min: Option<String>,
    max: Option<String>,
    mult: Option<f64>,
    exp: Option<f64>,
    learning_rate: Option<f64>,
    memory_window: Option<usize>,
    retry_offsets: Option<Vec<String>>,
}

/// The `[daemon]` table.
#[derive(Debug, Default, Deserialize)]
struct DaemonFileSection {
    enabled: Option<bool>,
    socket: Option<PathBuf>,
    timeout: Option<String>,
    auto_start: Option<bool>,
    http: Option<String>,
    resource_id: Option<String>,
    rate_limit: Option<u64>,
    rate_window: Option<String>,
    discovery_db: Option<PathBuf>,
}

/// The names probed in order, in each candidate directory.
const CANDIDATE_NAMES: &[&str] = &[".retry.toml", "retry.toml", ".retry.yaml", "retry.yaml"];

/// Locates and parses the config file, honoring an explicit `--config`
/// override. Returns `Ok(None)` if none was found and none was requested.
fn discover_and_parse(explicit: Option<&Path>) -> Result<Option<(ConfigFile, PathBuf)>, PatienceError> {
    if let Some(path) = explicit {
        let parsed = parse_file(path)?;
        return Ok(Some((parsed, path.to_path_buf())));
    }

    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CANDIDATE_NAMES.iter().map(|name| cwd.join(name)));
    }
    if let Some(base_dirs) = BaseDirs::new() {
        candidates.extend(CANDIDATE_NAMES.iter().map(|name| base_dirs.home_dir().join(name)));
    }

    for path in candidates {
        if path.is_file() {
            let parsed = parse_file(&path)?;
            return Ok(Some((parsed, path)));
        }
    }
    Ok(None)
}

fn parse_file(path: &Path) -> Result<ConfigFile, PatienceError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PatienceError::Config(format!("could not read config file {}: {e}", path.display())))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
            .map_err(|e| PatienceError::Config(format!("invalid YAML in {}: {e}", path.display()))),
        _ => toml::from_str(&contents)
            .map_err(|e| PatienceError::Config(format!("invalid TOML in {}: {e}", path.display()))),
    }
}

/// The outcome of merging all four layers: every field resolved to a
/// concrete value (or `None` for those that are genuinely optional),
/// plus the provenance `--debug-config` reports.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub attempts: u32,
    pub timeout: Option<Duration>,
    pub success_pattern: Option<String>,
    pub failure_pattern: Option<String>,
    pub case_insensitive: bool,
    pub config_path: Option<PathBuf>,

    pub backoff_strategy_name: Option<String>,
    pub backoff_base: Option<String>,
    pub backoff_mult: Option<f64>,
    pub backoff_max: Option<String>,
    /// Only meaningful when no strategy subcommand was given and the
    /// strategy is instead named by `backoff_strategy_name`: these come
    /// from the config file's `[backoff]` table alone; no environment
    /// variable overrides them.
    pub backoff_exp: Option<f64>,
    pub backoff_learning_rate: Option<f64>,
    pub backoff_memory_window: Option<usize>,
    pub backoff_retry_offsets: Option<Vec<String>>,

    pub daemon: bool,
    pub daemon_socket: PathBuf,
    pub daemon_timeout: Duration,
    pub daemon_auto_start: bool,
    pub daemon_http: Option<String>,
    pub resource_id: Option<String>,
    pub rate_limit: Option<u64>,
    pub rate_window: Option<Duration>,
    pub discovery_db: Option<PathBuf>,
}

fn parse_duration(label: &str, value: &str) -> Result<Duration, PatienceError> {
    humantime::parse_duration(value).map_err(|e| PatienceError::Config(format!("invalid {label} {value:?}: {e}")))
}

/// Reads one of the six named environment variables, treating an empty
/// string the same as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Merges built-in defaults, the discovered config file, the named
/// environment variables, and the parsed CLI flags, in that precedence
/// order.
pub fn resolve(cli: &Cli) -> Result<ResolvedConfig, PatienceError> {
    let common = &cli.common;
    let file = discover_and_parse(common.config.as_deref())?;
    let (file, config_path) = match file {
        Some((f, path)) => (f, Some(path)),
        None => (ConfigFile::default(), None),
    };

    let attempts = common
        .attempts
        .or_else(|| env_var("RETRY_ATTEMPTS").and_then(|v| v.parse().ok()))
        .or(file.attempts)
        .unwrap_or(3);
    if !(1..=1000).contains(&attempts) {
        return Err(PatienceError::Config(format!("attempts must be in 1..=1000, got {attempts}")));
    }

    let timeout_raw = common.timeout.clone().or_else(|| env_var("RETRY_TIMEOUT")).or_else(|| file.timeout.clone());
    let timeout = match timeout_raw {
        Some(raw) => {
            let d = parse_duration("timeout", &raw)?;
            if d.is_zero() { None } else { Some(d) }
        }
        None => None,
    };

    let (cli_base, cli_mult, cli_max) = strategy_base_mult_max(cli);
    let backoff_base = cli_base
        .or_else(|| env_var("RETRY_DELAY"))
        .or_else(|| file.backoff.base.clone().or(file.backoff.delay.clone()).or(file.backoff.min.clone()));
    let backoff_mult =
        cli_mult.or_else(|| env_var("RETRY_MULTIPLIER").and_then(|v| v.parse().ok())).or(file.backoff.mult);
    let backoff_max = cli_max.or_else(|| env_var("RETRY_MAX_DELAY")).or_else(|| file.backoff.max.clone());
    let backoff_strategy_name =
        strategy_name_from_cli(cli).or_else(|| env_var("RETRY_BACKOFF")).or_else(|| file.backoff.strategy.clone());

    let daemon = common.daemon || file.daemon.enabled.unwrap_or(false);
    let daemon_socket = common
        .daemon_socket
        .clone()
        .or_else(|| file.daemon.socket.clone())
        .unwrap_or_else(|| PathBuf::from("/tmp/patience-daemon.sock"));
    let daemon_timeout_raw =
        common.daemon_timeout.clone().or_else(|| file.daemon.timeout.clone()).unwrap_or_else(|| "5s".to_string());
    let daemon_timeout = parse_duration("daemon-timeout", &daemon_timeout_raw)?;
    let daemon_auto_start = common.daemon_auto_start || file.daemon.auto_start.unwrap_or(false);
    let daemon_http = common.daemon_http.clone().or_else(|| file.daemon.http.clone());
    let resource_id = common.resource_id.clone().or_else(|| file.daemon.resource_id.clone());
    let rate_limit = common.rate_limit.or(file.daemon.rate_limit);
    let rate_window = match common.rate_window.clone().or_else(|| file.daemon.rate_window.clone()) {
        Some(raw) => Some(parse_duration("rate-window", &raw)?),
        None => None,
    };
    let discovery_db = common.discovery_db.clone().or_else(|| file.daemon.discovery_db.clone());

    Ok(ResolvedConfig {
        attempts,
        timeout,
        success_pattern: common.success_pattern.clone().or_else(|| file.success_pattern.clone()),
        failure_pattern: common.failure_pattern.clone().or_else(|| file.failure_pattern.clone()),
        case_insensitive: common.case_insensitive || file.case_insensitive.unwrap_or(false),
        config_path,
        backoff_strategy_name,
        backoff_base,
        backoff_mult,
        backoff_max,
        backoff_exp: file.backoff.exp,
        backoff_learning_rate: file.backoff.learning_rate,
        backoff_memory_window: file.backoff.memory_window,
        backoff_retry_offsets: file.backoff.retry_offsets.clone(),
        daemon,
        daemon_socket,
        daemon_timeout,
        daemon_auto_start,
        daemon_http,
        resource_id,
        rate_limit,
        rate_window,
        discovery_db,
    })
}

/// Pulls whichever strategy subcommand was chosen's `base`/`delay`/`min`,
/// `mult`, and `max` flags out of the enum, since `RETRY_DELAY`/
/// `RETRY_MULTIPLIER`/`RETRY_MAX_DELAY` override all of them uniformly
/// regardless of which strategy is in play.
fn strategy_base_mult_max(cli: &Cli) -> (Option<String>, Option<f64>, Option<String>) {
    use crate::cli::StrategyCommand::*;
    match &cli.strategy {
        Some(HttpAware(a)) => (a.base.clone(), a.mult, a.max.clone()),
        Some(Exponential(a)) => (a.base.clone(), a.mult, a.max.clone()),
        Some(Linear(a)) => (a.base.clone(), None, a.max.clone()),
        Some(Fixed(a)) => (a.delay.clone(), None, None),
        Some(Jitter(a)) => (a.base.clone(), a.mult, a.max.clone()),
        Some(DecorrelatedJitter(a)) => (a.base.clone(), a.mult, a.max.clone()),
        Some(Fibonacci(a)) => (a.base.clone(), None, a.max.clone()),
        Some(Polynomial(a)) => (a.base.clone(), None, a.max.clone()),
        Some(Adaptive(a)) => (a.base.clone(), a.mult, a.max.clone()),
        Some(Diophantine(_)) | None => (None, None, None),
    }
}

fn strategy_name_from_cli(cli: &Cli) -> Option<String> {
    use crate::cli::StrategyCommand::*;
    cli.strategy.as_ref().map(|s| match s {
        HttpAware(_) => "http-aware",
        Exponential(_) => "exponential",
        Linear(_) => "linear",
        Fixed(_) => "fixed",
        Jitter(_) => "jitter",
        DecorrelatedJitter(_) => "decorrelated-jitter",
        Fibonacci(_) => "fibonacci",
        Polynomial(_) => "polynomial",
        Adaptive(_) => "adaptive",
        Diophantine(_) => "diophantine",
    }.to_string())
}

impl ResolvedConfig {
    /// Renders a `--debug-config` dump.
    pub fn debug_dump(&self) -> String {
        let config_source = self.config_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "none".to_string());
        format!(
            "resolved configuration:\n  \
             config file: {config_source}\n  \
             attempts: {}\n  \
             timeout: {:?}\n  \
             success_pattern: {:?}\n  \
             failure_pattern: {:?}\n  \
             case_insensitive: {}\n  \
             backoff.strategy: {:?}\n  \
             backoff.base: {:?}\n  \
             backoff.mult: {:?}\n  \
             backoff.max: {:?}\n  \
             backoff.exp: {:?}\n  \
             backoff.learning_rate: {:?}\n  \
             backoff.memory_window: {:?}\n  \
             backoff.retry_offsets: {:?}\n  \
             daemon: {}\n  \
             daemon_socket: {}\n  \
             daemon_timeout: {:?}\n  \
             daemon_auto_start: {}\n  \
             daemon_http: {:?}\n  \
             resource_id: {:?}\n  \
             rate_limit: {:?}\n  \
             rate_window: {:?}\n  \
             discovery_db: {:?}",
            self.attempts,
            self.timeout,
            self.success_pattern,
            self.failure_pattern,
            self.case_insensitive,
            self.backoff_strategy_name,
            self.backoff_base,
            self.backoff_mult,
            self.backoff_max,
            self.backoff_exp,
            self.backoff_learning_rate,
            self.backoff_memory_window,
            self.backoff_retry_offsets,
            self.daemon,
            self.daemon_socket.display(),
            self.daemon_timeout,
            self.daemon_auto_start,
            self.daemon_http,
            self.resource_id,
            self.rate_limit,
            self.rate_window,
            self.discovery_db,
        )
    }
}
