//! Flag parsing: `<prog> <strategy> [strategy-opts] [--]
//! COMMAND [ARGS...]`.
//!
//! The six named environment variables (`RETRY_ATTEMPTS`,
//! `RETRY_DELAY`, `RETRY_TIMEOUT`, `RETRY_BACKOFF`, `RETRY_MULTIPLIER`,
//! `RETRY_MAX_DELAY`) sit between the config file and the flags in the
//! precedence chain, so the fields they can
//! override are left as `Option` here with no `clap` default: a `None`
//! means "fall through to the next layer", resolved explicitly in
//! [`crate::config`] rather than through `clap`'s own flag-or-env-or-
//! default fallback (which only has two layers, not four).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// A retrying command supervisor.
#[derive(Parser, Debug)]
#[command(name = "patience", version, about = "Runs a command, retrying it according to a chosen backoff strategy")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub strategy: Option<StrategyCommand>,
}

/// Options shared by every strategy, plus the hidden flags
/// [`crate::daemon`] uses to relaunch this same binary as the
/// coordination daemon.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Maximum number of attempts, `1..=1000`. Layered: flag > env
    /// (`RETRY_ATTEMPTS`) > config file > built-in default of 3.
    #[arg(short = 'a', long, global = true)]
    pub attempts: Option<u32>,

    /// Per-attempt deadline (`0` disables it). Accepts `ms|s|m|h`.
    /// Layered: flag > env (`RETRY_TIMEOUT`) > config file > disabled.
    #[arg(short = 't', long, global = true)]
    pub timeout: Option<String>,

    /// A regex that, if matched in stdout/stderr, marks the attempt a
    /// success regardless of exit code.
    #[arg(long, global = true)]
    pub success_pattern: Option<String>,

    /// A regex that, if matched in stdout/stderr, marks the attempt a
    /// permanent failure (no further retries).
    #[arg(long, global = true)]
    pub failure_pattern: Option<String>,

    /// Match `success_pattern`/`failure_pattern` case-insensitively.
    #[arg(long, global = true)]
    pub case_insensitive: bool,

    /// Path to a config file, bypassing autodiscovery.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the fully resolved configuration and exit without running
    /// the command.
    #[arg(long, global = true)]
    pub debug_config: bool,

    /// Coordinate admission and rate-limit discovery through a daemon.
    #[arg(long, global = true)]
    pub daemon: bool,

    /// UNIX socket the daemon listens on.
    #[arg(long, global = true)]
    pub daemon_socket: Option<PathBuf>,

    /// Deadline for each daemon RPC. Accepts `ms|s|m|h`.
    #[arg(long, global = true)]
    pub daemon_timeout: Option<String>,

    /// Spawn the daemon if it is not already reachable at `daemon_socket`.
    #[arg(long, global = true)]
    pub daemon_auto_start: bool,

    /// Bind the daemon's read-only admin HTTP surface at `addr` (only
    /// meaningful with `--daemon-foreground`).
    #[arg(long, global = true)]
    pub daemon_http: Option<String>,

    /// The resource this run's attempts coordinate admission against.
    /// Required for `--daemon` to have an effect.
    #[arg(long, global = true)]
    pub resource_id: Option<String>,

    /// The admitted-attempts-per-window limit enforced by the daemon for
    /// `resource_id`.
    #[arg(long, global = true)]
    pub rate_limit: Option<u64>,

    /// The sliding window `rate_limit` applies to. Accepts `ms|s|m|h`.
    #[arg(long, global = true)]
    pub rate_window: Option<String>,

    /// Path to the rate-limit discovery SQLite database. Omit to disable
    /// discovery persistence.
    #[arg(long, global = true)]
    pub discovery_db: Option<PathBuf>,

    /// Run as the coordination daemon itself instead of supervising a
    /// command. Used internally to relaunch this binary when
    /// `--daemon-auto-start` finds no daemon listening.
    #[arg(long, hide = true, global = true)]
    pub daemon_foreground: bool,

    /// PID file the foreground daemon claims on start.
    #[arg(long, hide = true, global = true)]
    pub daemon_pid_file: Option<PathBuf>,
}

/// The ten backoff strategies (and their aliases), each carrying its own
/// parameters plus the trailing `COMMAND [ARGS...]`. When
/// no subcommand is given, `RETRY_BACKOFF` (or a config file's
/// `backoff.strategy`) names the strategy instead.
#[derive(Subcommand, Debug)]
pub enum StrategyCommand {
    /// Server-advertised delay, falling back to an exponential curve.
    #[command(visible_alias = "ha")]
    HttpAware(HttpAwareArgs),
    /// `min(base * mult^(attempt-1), max)`.
    #[command(visible_alias = "exp")]
    Exponential(ExponentialArgs),
    /// `min(base * attempt, max)`.
    #[command(visible_alias = "lin")]
    Linear(LinearArgs),
    /// Constant delay.
    #[command(visible_alias = "fix")]
    Fixed(FixedArgs),
    /// Uniform random delay up to an exponential ceiling.
    #[command(visible_alias = "jit")]
    Jitter(FullJitterArgs),
    /// AWS-style decorrelated jitter.
    #[command(visible_alias = "dj")]
    DecorrelatedJitter(DecorrelatedJitterArgs),
    /// Delay follows the Fibonacci sequence.
    #[command(visible_alias = "fib")]
    Fibonacci(FibonacciArgs),
    /// `min(base * attempt^exp, max)`.
    #[command(visible_alias = "poly")]
    Polynomial(PolynomialArgs),
    /// Widens on failure, relaxes on success.
    #[command(visible_alias = "adapt")]
    Adaptive(AdaptiveArgs),
    /// Delays follow successive differences of a fixed offset table.
    #[command(visible_aliases = ["dioph", "dio"])]
    Diophantine(DiophantineArgs),
}

/// The trailing `[--] COMMAND [ARGS...]`, shared by every strategy.
#[derive(Args, Debug, Clone)]
pub struct TrailingCommand {
    /// The command to run, and its arguments.
    #[arg(required = true, num_args = 1.., last = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HttpAwareArgs {
    /// Base delay of the exponential fallback curve.
    #[arg(long)]
    pub base: Option<String>,
    /// Multiplier of the exponential fallback curve.
    #[arg(long)]
    pub mult: Option<f64>,
    /// Ceiling applied to both the fallback curve and any server hint.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct ExponentialArgs {
    /// Base delay before the first retry.
    #[arg(long)]
    pub base: Option<String>,
    /// Growth multiplier per attempt.
    #[arg(long)]
    pub mult: Option<f64>,
    /// Delay ceiling.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct LinearArgs {
    /// Delay added per attempt.
    #[arg(long)]
    pub base: Option<String>,
    /// Delay ceiling.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct FixedArgs {
    /// The constant delay between attempts.
    #[arg(long)]
    pub delay: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct FullJitterArgs {
    /// Base of the exponential ceiling random delays are sampled under.
    #[arg(long)]
    pub base: Option<String>,
    /// Growth multiplier of the ceiling per attempt.
    #[arg(long)]
    pub mult: Option<f64>,
    /// Ceiling cap.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct DecorrelatedJitterArgs {
    /// The first attempt's delay, and the floor of every later sample.
    #[arg(long)]
    pub base: Option<String>,
    /// Growth multiplier applied to the previous delay.
    #[arg(long)]
    pub mult: Option<f64>,
    /// Delay ceiling.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct FibonacciArgs {
    /// Multiplied by the 1-indexed Fibonacci sequence.
    #[arg(long)]
    pub base: Option<String>,
    /// Delay ceiling.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct PolynomialArgs {
    /// Base delay; must be `> 0` and `<= max`.
    #[arg(long)]
    pub base: Option<String>,
    /// The power attempt count is raised to.
    #[arg(long, default_value_t = 2.0)]
    pub exp: f64,
    /// Delay ceiling.
    #[arg(long)]
    pub max: Option<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct AdaptiveArgs {
    /// Base delay of the exponential fallback curve, used whenever the
    /// in-window success history has no verdict yet.
    #[arg(long)]
    pub base: Option<String>,
    /// Growth multiplier of the exponential fallback curve.
    #[arg(long)]
    pub mult: Option<f64>,
    /// Ceiling applied to the fallback curve.
    #[arg(long)]
    pub max: Option<String>,
    /// Weight given to the learned point estimate over the fallback curve,
    /// in `(0.0, 1.0]`.
    #[arg(long, default_value_t = 0.3)]
    pub learning_rate: f64,
    /// How many recent `(delay, success, latency)` observations to keep.
    #[arg(long, default_value_t = 20)]
    pub memory_window: usize,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}

#[derive(Args, Debug)]
pub struct DiophantineArgs {
    /// Comma-separated offsets from the run's start, in attempt order
    /// (e.g. `1s,3s,7s`).
    #[arg(long, value_delimiter = ',', required = true)]
    pub retry_offsets: Vec<String>,
    #[command(flatten)]
    pub trailing: TrailingCommand,
}
