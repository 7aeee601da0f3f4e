//! Builds a [`Strategy`] and [`ConditionEvaluator`] from the resolved
//! configuration.

use std::time::Duration;

use patience_backoff::{
    Adaptive, DecorrelatedJitter, Diophantine, Exponential, Fibonacci, Fixed, FullJitter, HttpAware, Linear,
    Polynomial, Strategy,
};
use patience_condition::ConditionEvaluator;
use patience_core::PatienceError;

use crate::cli::StrategyCommand;
use crate::config::ResolvedConfig;

/// The default base delay for an unconfigured strategy, matching the
/// 100ms convention used throughout the backoff family's own tests and
/// docs.
const DEFAULT_BASE: Duration = Duration::from_millis(100);
/// A generous default ceiling; every strategy still honors an explicit
/// `--max`/`RETRY_MAX_DELAY` override.
const DEFAULT_MAX: Duration = Duration::from_secs(30);
const DEFAULT_MULT: f64 = 2.0;

fn duration_or(raw: &Option<String>, default: Duration, label: &str) -> Result<Duration, PatienceError> {
    match raw {
        Some(s) => humantime::parse_duration(s).map_err(|e| PatienceError::Config(format!("invalid {label} {s:?}: {e}"))),
        None => Ok(default),
    }
}

/// Builds the strategy named by the chosen subcommand, folding in the
/// merged `base`/`mult`/`max` from [`ResolvedConfig`]. When no subcommand was given, the strategy is instead chosen
/// by name (`resolved.backoff_strategy_name`, e.g. from `RETRY_BACKOFF`
/// or a config file), with every strategy-specific parameter drawn from
/// `resolved` alone.
pub fn build_strategy(command: Option<&StrategyCommand>, resolved: &ResolvedConfig) -> Result<Strategy, PatienceError> {
    let base = duration_or(&resolved.backoff_base, DEFAULT_BASE, "base/delay/min")?;
    let max = duration_or(&resolved.backoff_max, DEFAULT_MAX, "max")?;
    let mult = resolved.backoff_mult.unwrap_or(DEFAULT_MULT);

    let strategy = match command {
        Some(StrategyCommand::HttpAware(_)) => {
            let fallback = Strategy::Exponential(
                Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?,
            );
            Strategy::HttpAware(HttpAware::new(fallback, max))
        }
        Some(StrategyCommand::Exponential(_)) => {
            Strategy::Exponential(Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        Some(StrategyCommand::Linear(_)) => Strategy::Linear(Linear::new(base, max)),
        Some(StrategyCommand::Fixed(_)) => Strategy::Fixed(Fixed::new(base)),
        Some(StrategyCommand::Jitter(_)) => {
            Strategy::FullJitter(FullJitter::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        Some(StrategyCommand::DecorrelatedJitter(_)) => Strategy::DecorrelatedJitter(
            DecorrelatedJitter::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?,
        ),
        Some(StrategyCommand::Fibonacci(_)) => Strategy::Fibonacci(Fibonacci::new(base, max)),
        Some(StrategyCommand::Polynomial(args)) => {
            Strategy::Polynomial(Polynomial::new(base, args.exp, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        Some(StrategyCommand::Adaptive(args)) => {
            let fallback = Strategy::Exponential(
                Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?,
            );
            Strategy::Adaptive(
                Adaptive::new(fallback, args.learning_rate, args.memory_window)
                    .map_err(|e| PatienceError::Config(e.to_string()))?,
            )
        }
        Some(StrategyCommand::Diophantine(args)) => {
            let offsets = parse_offsets(&args.retry_offsets)?;
            Strategy::Diophantine(Diophantine::new(offsets).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        None => build_named_strategy(resolved, base, mult, max)?,
    };
    Ok(strategy)
}

fn parse_offsets(raw: &[String]) -> Result<Vec<Duration>, PatienceError> {
    raw.iter().map(|s| duration_or(&Some(s.clone()), Duration::ZERO, "retry-offsets")).collect()
}

/// Builds a strategy purely from `resolved`, used when no strategy
/// subcommand was given at all.
fn build_named_strategy(resolved: &ResolvedConfig, base: Duration, mult: f64, max: Duration) -> Result<Strategy, PatienceError> {
    let name = resolved.backoff_strategy_name.as_deref().unwrap_or("exponential");
    let strategy = match name {
        "http-aware" | "ha" => {
            let fallback =
                Strategy::Exponential(Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?);
            Strategy::HttpAware(HttpAware::new(fallback, max))
        }
        "exponential" | "exp" => {
            Strategy::Exponential(Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        "linear" | "lin" => Strategy::Linear(Linear::new(base, max)),
        "fixed" | "fix" => Strategy::Fixed(Fixed::new(base)),
        "jitter" | "jit" => {
            Strategy::FullJitter(FullJitter::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        "decorrelated-jitter" | "dj" => Strategy::DecorrelatedJitter(
            DecorrelatedJitter::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?,
        ),
        "fibonacci" | "fib" => Strategy::Fibonacci(Fibonacci::new(base, max)),
        "polynomial" | "poly" => {
            let exp = resolved.backoff_exp.unwrap_or(2.0);
            Strategy::Polynomial(Polynomial::new(base, exp, max).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        "adaptive" | "adapt" => {
            let learning_rate = resolved.backoff_learning_rate.unwrap_or(0.3);
            let memory_window = resolved.backoff_memory_window.unwrap_or(20);
            let fallback =
                Strategy::Exponential(Exponential::new(base, mult, max).map_err(|e| PatienceError::Config(e.to_string()))?);
            Strategy::Adaptive(
                Adaptive::new(fallback, learning_rate, memory_window).map_err(|e| PatienceError::Config(e.to_string()))?,
            )
        }
        "diophantine" | "dioph" | "dio" => {
            let raw = resolved
                .backoff_retry_offsets
                .as_ref()
                .ok_or_else(|| PatienceError::Config("diophantine strategy requires backoff.retry_offsets".to_string()))?;
            let offsets = parse_offsets(raw)?;
            Strategy::Diophantine(Diophantine::new(offsets).map_err(|e| PatienceError::Config(e.to_string()))?)
        }
        other => return Err(PatienceError::Config(format!("unknown backoff strategy {other:?}"))),
    };
    Ok(strategy)
}

/// Builds the condition evaluator from the merged success/failure
/// patterns.
pub fn build_condition(resolved: &ResolvedConfig) -> Result<ConditionEvaluator, PatienceError> {
    ConditionEvaluator::new(
        resolved.success_pattern.as_deref(),
        resolved.failure_pattern.as_deref(),
        resolved.case_insensitive,
    )
    .map_err(|e| PatienceError::PatternCompile(e.to_string()))
}

/// The trailing `COMMAND [ARGS...]` argv for whichever strategy subcommand
/// was chosen. A missing subcommand is a configuration error: there is no
/// command to run.
pub fn command_argv(command: Option<&StrategyCommand>) -> Result<Vec<String>, PatienceError> {
    let argv = match command {
        Some(StrategyCommand::HttpAware(a)) => &a.trailing.command,
        Some(StrategyCommand::Exponential(a)) => &a.trailing.command,
        Some(StrategyCommand::Linear(a)) => &a.trailing.command,
        Some(StrategyCommand::Fixed(a)) => &a.trailing.command,
        Some(StrategyCommand::Jitter(a)) => &a.trailing.command,
        Some(StrategyCommand::DecorrelatedJitter(a)) => &a.trailing.command,
        Some(StrategyCommand::Fibonacci(a)) => &a.trailing.command,
        Some(StrategyCommand::Polynomial(a)) => &a.trailing.command,
        Some(StrategyCommand::Adaptive(a)) => &a.trailing.command,
        Some(StrategyCommand::Diophantine(a)) => &a.trailing.command,
        None => return Err(PatienceError::Config("no command given to run".to_string())),
    };
    Ok(argv.clone())
}
