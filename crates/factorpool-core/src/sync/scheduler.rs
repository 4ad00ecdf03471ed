//! Sequential per-code driver that keeps vendor calls under a per-minute quota.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::SecurityCode;
use crate::sync::pipeline::{NoOpReason, Outcome};

/// Suspension seam so pacing can be observed without waiting.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Pause owed after a call that took `elapsed`: the rest of the per-call
/// interval plus `margin`, or nothing when the call already used the interval.
pub fn pacing_delay(elapsed: Duration, quota_per_minute: u32, margin: Duration) -> Option<Duration> {
    let interval = Duration::from_secs(60) / quota_per_minute.max(1);
    if elapsed < interval {
        Some(interval - elapsed + margin)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCode {
    pub code: String,
    pub error_code: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub processed: usize,
    pub persisted_rows: usize,
    pub already_synced: usize,
    pub empty: usize,
    pub skipped: usize,
    pub failed: Vec<FailedCode>,
}

impl SchedulerReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct RateLimitedScheduler<S = ThreadSleeper> {
    quota_per_minute: u32,
    safety_margin: Duration,
    sleeper: S,
}

impl RateLimitedScheduler<ThreadSleeper> {
    pub fn new(quota_per_minute: u32, safety_margin: Duration) -> Self {
        Self::with_sleeper(quota_per_minute, safety_margin, ThreadSleeper)
    }
}

impl<S: Sleeper> RateLimitedScheduler<S> {
    pub fn with_sleeper(quota_per_minute: u32, safety_margin: Duration, sleeper: S) -> Self {
        Self {
            quota_per_minute: quota_per_minute.max(1),
            safety_margin,
            sleeper,
        }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Runs `ingest` for every code in order. Codes for which `skip` holds are
    /// passed over without a pacing pause. Failures never stop the run.
    pub fn run<F, K>(&self, codes: &[SecurityCode], mut ingest: F, skip: K) -> SchedulerReport
    where
        F: FnMut(&SecurityCode) -> Outcome,
        K: Fn(&SecurityCode) -> bool,
    {
        let run_started = Instant::now();
        let mut report = SchedulerReport::default();

        for code in codes {
            if skip(code) {
                debug!(%code, "skipping code with stored rows");
                report.skipped += 1;
                continue;
            }

            let started = Instant::now();
            let outcome = ingest(code);
            let elapsed = started.elapsed();
            report.processed += 1;

            match outcome {
                Outcome::Persisted(rows) => report.persisted_rows += rows,
                Outcome::NoOp(NoOpReason::AlreadySynced) => report.already_synced += 1,
                Outcome::NoOp(NoOpReason::EmptyResult) => report.empty += 1,
                Outcome::Failed(failure) => {
                    warn!(%code, error_code = failure.code(), "code failed; continuing");
                    report.failed.push(FailedCode {
                        code: code.to_string(),
                        error_code: failure.code().to_owned(),
                        message: failure.to_string(),
                        retryable: failure.retryable(),
                    });
                }
            }

            if let Some(delay) = pacing_delay(elapsed, self.quota_per_minute, self.safety_margin) {
                self.sleeper.sleep(delay);
            }
        }

        info!(
            processed = report.processed,
            persisted_rows = report.persisted_rows,
            skipped = report.skipped,
            failed = report.failed.len(),
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "sync run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::provider::FetchFailure;
    use crate::sync::pipeline::IngestFailure;

    #[derive(Default)]
    struct RecordingSleeper {
        pauses: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }

    fn codes(values: &[&str]) -> Vec<SecurityCode> {
        values
            .iter()
            .map(|value| SecurityCode::parse(value).expect("code"))
            .collect()
    }

    #[test]
    fn fast_calls_wait_out_the_interval_plus_margin() {
        let delay = pacing_delay(Duration::from_millis(100), 60, Duration::from_millis(100));
        assert_eq!(delay, Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn slow_calls_do_not_wait() {
        assert_eq!(
            pacing_delay(Duration::from_secs(2), 60, Duration::from_millis(100)),
            None
        );
        assert_eq!(
            pacing_delay(Duration::from_millis(300), 200, Duration::from_millis(100)),
            None
        );
    }

    #[test]
    fn skipped_codes_cost_no_pause_and_failures_continue() {
        let scheduler = RateLimitedScheduler::with_sleeper(
            60,
            Duration::from_millis(100),
            RecordingSleeper::default(),
        );
        let mut seen = Vec::new();

        let report = scheduler.run(
            &codes(&["600000.SH", "000001.SZ", "000002.SZ"]),
            |code| {
                seen.push(code.to_string());
                if code.as_str() == "000001.SZ" {
                    Outcome::Failed(IngestFailure::Fetch(FetchFailure::transport("reset")))
                } else {
                    Outcome::Persisted(5)
                }
            },
            |code| code.as_str() == "600000.SH",
        );

        assert_eq!(seen, vec!["000001.SZ", "000002.SZ"]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 2);
        assert_eq!(report.persisted_rows, 5);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "000001.SZ");
        assert_eq!(report.failed[0].error_code, "fetch.transport");
        assert!(report.failed[0].retryable);

        let pauses = scheduler.sleeper().pauses.borrow();
        assert_eq!(pauses.len(), 2);
        for pause in pauses.iter() {
            assert!(*pause > Duration::from_millis(900));
            assert!(*pause <= Duration::from_millis(1_100));
        }
    }
}
