//! Drives one asynchronous batch geocoding job to completion.
//!
//! Submit, wait out the expected processing time, then poll on a fixed
//! interval with a bounded attempt count. Every wait is a cooperative
//! `tokio::time::sleep` — nothing holds a thread while the job runs
//! server-side.

use std::time::Duration;

use common::config::GeocodingConfig;
use common::{Error, GeocodeJobApi, GeocodeResult, PollStatus, Result};
use tokio::time::sleep;
use tracing::{debug, info};

/// Timing and bound settings for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Expected server-side processing time per submitted key; the delay
    /// before the first status check is `item_cost * keys.len()`.
    pub item_cost: Duration,
    /// Fixed delay between status checks. No backoff — the job API bills
    /// per item, not per status check.
    pub poll_interval: Duration,
    /// Status checks allowed before a still-pending job is abandoned.
    pub max_attempts: u32,
}

impl From<&GeocodingConfig> for PollerConfig {
    fn from(cfg: &GeocodingConfig) -> Self {
        Self {
            item_cost: Duration::from_millis(cfg.ms_per_address),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            max_attempts: cfg.max_attempts,
        }
    }
}

/// Bounded-retry poller over a [`GeocodeJobApi`] transport.
pub struct JobPoller<G> {
    api: G,
    cfg: PollerConfig,
}

impl<G: GeocodeJobApi> JobPoller<G> {
    pub fn new(api: G, cfg: PollerConfig) -> Self {
        Self { api, cfg }
    }

    /// Run one batch job to a terminal state.
    ///
    /// Fails without retrying on a rejected submission and on any job
    /// status other than ready/pending; only a pending job is retried, up
    /// to `max_attempts` status checks.
    pub async fn run(&self, keys: &[String]) -> Result<Vec<GeocodeResult>> {
        let job_id = self.api.submit(keys).await?;

        // A check right after submission is guaranteed pending; amortize
        // the expected processing time instead.
        let first_delay = self.cfg.item_cost * keys.len() as u32;
        info!(
            "Submitted batch of {} keys as job {}; first status check in {:?}",
            keys.len(),
            job_id,
            first_delay
        );
        sleep(first_delay).await;

        let mut attempt: u32 = 1;
        loop {
            debug!(
                "Checking batch job {} for {} keys: attempt #{}",
                job_id,
                keys.len(),
                attempt
            );
            match self.api.poll_status(&job_id).await? {
                PollStatus::Ready(results) => {
                    info!(
                        "Batch job {} ready with {} results after {} attempt(s)",
                        job_id,
                        results.len(),
                        attempt
                    );
                    return Ok(results);
                }
                PollStatus::Pending => {
                    if attempt >= self.cfg.max_attempts {
                        return Err(Error::PollExhausted { attempts: attempt });
                    }
                    sleep(self.cfg.poll_interval).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::GeocodeQuery;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// One scripted poll outcome.
    enum Step {
        Ready(Vec<GeocodeResult>),
        Pending,
        Fail(String),
    }

    struct ScriptedApi {
        reject_submission: bool,
        steps: Mutex<VecDeque<Step>>,
        submits: AtomicU32,
        polls: AtomicU32,
        first_poll_at: Mutex<Option<Instant>>,
    }

    impl ScriptedApi {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                reject_submission: false,
                steps: Mutex::new(steps.into()),
                submits: AtomicU32::new(0),
                polls: AtomicU32::new(0),
                first_poll_at: Mutex::new(None),
            }
        }

        fn rejecting() -> Self {
            let mut api = Self::new(Vec::new());
            api.reject_submission = true;
            api
        }
    }

    #[async_trait]
    impl GeocodeJobApi for ScriptedApi {
        async fn submit(&self, _keys: &[String]) -> Result<String> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.reject_submission {
                return Err(Error::SubmissionRejected {
                    status: 401,
                    message: "bad api key".into(),
                });
            }
            Ok("job-1".into())
        }

        async fn poll_status(&self, _job_id: &str) -> Result<PollStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.first_poll_at
                .lock()
                .expect("lock")
                .get_or_insert_with(Instant::now);
            match self.steps.lock().expect("lock").pop_front() {
                Some(Step::Ready(results)) => Ok(PollStatus::Ready(results)),
                Some(Step::Pending) | None => Ok(PollStatus::Pending),
                Some(Step::Fail(msg)) => Err(Error::JobFailed(msg)),
            }
        }
    }

    fn result_for(key: &str, lat: f64, lon: f64) -> GeocodeResult {
        GeocodeResult {
            query: GeocodeQuery { text: key.into() },
            lat: Some(lat),
            lon: Some(lon),
            formatted: None,
            postcode: None,
            city: None,
            country: None,
            result_type: None,
        }
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("H{i}H{i}H{i}")).collect()
    }

    fn cfg(max_attempts: u32) -> PollerConfig {
        PollerConfig {
            item_cost: Duration::from_millis(250),
            poll_interval: Duration::from_millis(1000),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_check_waits_out_expected_processing_time() {
        let poller = JobPoller::new(
            ScriptedApi::new(vec![Step::Ready(vec![result_for("H0H0H0", 45.0, -73.0)])]),
            cfg(10),
        );

        let started = Instant::now();
        let results = poller.run(&keys(4)).await.expect("job should complete");

        assert_eq!(results.len(), 1);
        let first_poll = poller
            .api
            .first_poll_at
            .lock()
            .expect("lock")
            .expect("at least one poll");
        // 4 keys at 250ms each: the first check must not come before 1s.
        assert!(first_poll - started >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_job_exhausts_after_exactly_max_attempts() {
        let poller = JobPoller::new(ScriptedApi::new(Vec::new()), cfg(3));

        let err = poller.run(&keys(2)).await.expect_err("must exhaust");
        assert!(matches!(err, Error::PollExhausted { attempts: 3 }));
        // Exactly 3 status checks, no 4th request.
        assert_eq!(poller.api.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_is_fatal_without_polling() {
        let poller = JobPoller::new(ScriptedApi::rejecting(), cfg(10));

        let err = poller.run(&keys(1)).await.expect_err("must reject");
        assert!(matches!(err, Error::SubmissionRejected { status: 401, .. }));
        assert_eq!(poller.api.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_aborts_mid_loop() {
        let poller = JobPoller::new(
            ScriptedApi::new(vec![Step::Pending, Step::Fail("quota exceeded".into())]),
            cfg(10),
        );

        let err = poller.run(&keys(1)).await.expect_err("must fail");
        assert!(matches!(err, Error::JobFailed(_)));
        // Failed on the 2nd check and stopped there.
        assert_eq!(poller.api.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_a_later_attempt_returns_results() {
        let poller = JobPoller::new(
            ScriptedApi::new(vec![
                Step::Pending,
                Step::Pending,
                Step::Ready(vec![result_for("H1H1H1", 46.0, -72.0)]),
            ]),
            cfg(5),
        );

        let results = poller.run(&keys(3)).await.expect("job should complete");
        assert_eq!(results[0].query.text, "H1H1H1");
        assert_eq!(poller.api.polls.load(Ordering::SeqCst), 3);
    }
}
