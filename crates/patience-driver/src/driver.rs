//! The retry driver state machine:
//! `Idle → Admitting → Running → Classifying → (Succeeded | Retrying |
//! Exhausted | HardFailed)`.

use std::time::{Duration, Instant};

use chrono::Utc;
use patience_core::{
    AttemptIndex, AttemptMetric, BackoffContext, CapturedOutput, ConditionResult, FactSource, Outcome, PatienceError,
    Result, RunMetrics, RunResult, RunStats,
};
use patience_discovery::LearningEntry;

use crate::config::DriverConfig;

/// The bound on how long the asynchronous metrics submission to the
/// daemon may delay process exit.
const METRICS_SEND_DEADLINE: Duration = Duration::from_millis(500);

/// Drives one `Run`: repeatedly invokes the child, classifies its
/// output, and consults the backoff strategy, until the run terminates.
pub struct RetryDriver {
    config: DriverConfig,
    coordination_enabled: bool,
}

impl RetryDriver {
    /// Builds a driver from a fully resolved configuration.
    pub fn new(config: DriverConfig) -> Self {
        let coordination_enabled = config.daemon_client.is_some() && config.coordination.is_some();
        Self { config, coordination_enabled }
    }

    /// Runs the attempt loop to completion. Only a child-spawn failure is
    /// returned as an `Err`; every other outcome, including exhaustion and
    /// hard failure, comes back as a `RunResult`.
    pub async fn run(&mut self) -> Result<RunResult> {
        self.admit_schedule().await;

        let mut stats = RunStats::default();
        let mut metrics = RunMetrics::default();
        let mut previous_delay: Option<Duration> = None;
        let mut last_output: Option<CapturedOutput> = None;
        let mut attempt: u32 = 1;

        let result = loop {
            let attempt_index = AttemptIndex::new(attempt).unwrap_or(AttemptIndex::FIRST);
            let attempt_start = Instant::now();

            let output = self
                .config
                .runner
                .run(&self.config.argv, self.config.per_attempt_deadline)
                .await
                .map_err(|e| PatienceError::Spawn(e.to_string()))?;

            let attempt_duration = attempt_start.elapsed();
            let condition_result = self.config.condition.eval(output.exit_code, &output.stdout, &output.stderr);

            stats.attempts = attempt;
            stats.total_duration += attempt_duration;
            match &condition_result {
                ConditionResult::Success(_) => stats.successful_runs += 1,
                ConditionResult::Retryable(_) | ConditionResult::HardFailure(_) => stats.failed_runs += 1,
            }
            stats.final_reason = Some(condition_result.reason().to_string());

            metrics.attempts.push(AttemptMetric {
                attempt: attempt_index,
                duration: attempt_duration,
                exit_code: output.exit_code,
                success: condition_result.is_success(),
            });

            self.config.strategy.observe_output(&output);
            self.config.strategy.record_outcome(
                previous_delay.unwrap_or(Duration::ZERO),
                condition_result.is_success(),
                attempt_duration,
            );
            self.record_discovery_observation(&output, attempt_duration).await;

            match condition_result {
                ConditionResult::Success(reason) => {
                    stats.outcome = Outcome::Succeeded;
                    break RunResult {
                        success: true,
                        attempt_count: attempt,
                        exit_code: output.exit_code,
                        timed_out: false,
                        reason,
                        stats,
                        metrics,
                    };
                }
                ConditionResult::HardFailure(_) => {
                    stats.outcome = Outcome::HardFailed;
                    break RunResult {
                        success: false,
                        attempt_count: attempt,
                        exit_code: output.exit_code,
                        timed_out: output.timed_out,
                        reason: "failure pattern matched".to_string(),
                        stats,
                        metrics,
                    };
                }
                ConditionResult::Retryable(reason) => {
                    if attempt >= self.config.max_attempts {
                        stats.outcome = Outcome::Exhausted;
                        let cause = if output.timed_out { "timeout".to_string() } else { reason };
                        let final_reason = if self.config.max_attempts > 1 {
                            format!("max retries reached ({cause})")
                        } else {
                            cause
                        };
                        break RunResult {
                            success: false,
                            attempt_count: attempt,
                            exit_code: output.exit_code,
                            timed_out: output.timed_out,
                            reason: final_reason,
                            stats,
                            metrics,
                        };
                    }

                    let ctx = BackoffContext { attempt: attempt_index, previous_delay, last_output: last_output.as_ref() };
                    let delay = self.config.strategy.delay(&ctx);
                    tokio::time::sleep(delay).await;
                    stats.total_duration += delay;
                    previous_delay = Some(delay);
                    last_output = Some(output);
                    attempt += 1;
                }
            }
        };

        let mut result = result;
        result.metrics.success = result.success;
        result.metrics.total_duration = result.stats.total_duration;
        self.send_metrics(&result).await;
        Ok(result)
    }

    /// Admitting: if this run participates in daemon-mediated scheduling,
    /// asks whether its schedule is admissible and registers it. Any RPC
    /// failure disables coordination for the remainder of the run rather
    /// than failing it.
    async fn admit_schedule(&mut self) {
        if !self.coordination_enabled {
            return;
        }
        let Some(client) = self.config.daemon_client.clone() else { return };
        let Some(coordination) = self.config.coordination.clone() else { return };

        let zero = [Duration::from_secs(0)];
        let offsets = self.config.strategy.retry_offsets().unwrap_or(&zero);
        match client
            .schedule_and_register(&coordination.resource_id, coordination.limit, coordination.window, offsets)
            .await
        {
            Ok((answer, _accepted)) => {
                if !answer.can_schedule {
                    tokio::time::sleep(answer.wait).await;
                }
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "daemon unavailable, falling back to local-only scheduling");
                self.coordination_enabled = false;
            }
        }
    }

    /// Best-effort discovery store write: extracts a candidate rate-limit
    /// fact from the attempt's output and merges it via `ShouldUpdate`
    ///. Never fails the run.
    async fn record_discovery_observation(&self, output: &CapturedOutput, response_time: Duration) {
        let Some(store) = self.config.discovery.clone() else { return };
        let Some(candidate) =
            patience_http::extract_candidate_fact(&output.stdout, &output.stderr, output.exit_code, &self.config.argv)
        else {
            return;
        };

        let resource_id = candidate.resource_id.clone();
        let (host, path) = match resource_id.split_once('/') {
            Some((h, p)) => (h.to_string(), format!("/{p}")),
            None => (resource_id.clone(), "/".to_string()),
        };
        let command = self.config.argv.join(" ");
        let now = Utc::now();
        let success = !candidate.is_429;

        let entry = LearningEntry {
            resource_id: resource_id.clone(),
            request_time: now,
            response_code: output.exit_code,
            success,
            response_time,
            command,
            host: host.clone(),
            path: path.clone(),
        };

        let write_result = tokio::task::spawn_blocking(move || {
            store.record_learning_entry(&entry)?;
            if let (Some(limit), Some(window)) = (candidate.limit, candidate.window) {
                store.observe_fact(
                    &resource_id,
                    &host,
                    &path,
                    limit,
                    window,
                    candidate.remaining.unwrap_or(0),
                    candidate.source,
                    candidate.is_429,
                    now,
                )?;
            }
            if candidate.is_429 {
                if let Some(estimate) = patience_discovery::learn_from_429(&store, &resource_id, now)? {
                    store.observe_fact(
                        &resource_id,
                        &host,
                        &path,
                        estimate.limit,
                        estimate.window,
                        0,
                        FactSource::Learned,
                        true,
                        now,
                    )?;
                }
            }
            Ok::<(), patience_discovery::DiscoveryError>(())
        })
        .await;

        if let Ok(Err(_err)) = write_result {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "discovery store write failed");
        }
    }

    /// Fire-and-forget run metrics submission, bounded to
    /// [`METRICS_SEND_DEADLINE`] so it can never meaningfully delay
    /// process exit.
    async fn send_metrics(&self, result: &RunResult) {
        let Some(client) = self.config.daemon_client.clone() else { return };
        let payload = serde_json::json!({
            "success": result.success,
            "attempt_count": result.attempt_count,
            "exit_code": result.exit_code,
            "timed_out": result.timed_out,
            "reason": result.reason,
            "total_duration_ms": result.stats.total_duration.as_millis(),
        });
        let _ = tokio::time::timeout(METRICS_SEND_DEADLINE, client.send_metrics(payload)).await;
    }
}
