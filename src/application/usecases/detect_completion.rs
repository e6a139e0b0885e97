// Use case: detect_completion.

use crate::application::context::AppContext;
use crate::application::usecases::keep_alive::{LeaseError, LeaseKeeper};
use crate::domain::workflows::completion::{
    CompletionPolicy, CompletionReport, IdleTracker, StartupTracker, WaitOutcome,
};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Decides when a navigation has settled from the growth of the screen
/// recording. Both phases share one deadline measured from [`Self::begin`].
pub struct CompletionDetector {
    policy: CompletionPolicy,
    startup_deadline: Instant,
    deadline: Instant,
    last_size: u64,
    polls: u32,
}

impl CompletionDetector {
    /// Take the baseline video size and start the clocks.
    pub async fn begin(ctx: &AppContext) -> Self {
        let policy = ctx.settings.completion_policy();
        let started = Instant::now();
        let deadline = started + policy.total_timeout;
        let startup_deadline = (started + policy.startup_timeout).min(deadline);

        let last_size = match timeout_at(deadline, ctx.device.video_size()).await {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                warn!(error = %e, "video_size_failed");
                0
            }
            Err(_) => 0,
        };
        // Reset the received-bytes counter so later deltas cover this page only.
        if let Ok(Err(e)) = timeout_at(deadline, ctx.device.bytes_received_delta()).await {
            debug!(error = %e, "bytes_received_failed");
        }

        Self {
            policy,
            startup_deadline,
            deadline,
            last_size,
            polls: 0,
        }
    }

    /// Wait for a single poll whose growth exceeds the startup threshold.
    /// Reaching the startup ceiling is a soft signal.
    pub async fn wait_for_start(
        &mut self,
        ctx: &AppContext,
        keeper: &LeaseKeeper,
    ) -> Result<WaitOutcome, LeaseError> {
        let mut tracker = StartupTracker::new(self.policy.startup_threshold_bytes);
        let outcome = loop {
            let Some(delta) = self.sample(ctx, self.startup_deadline).await else {
                break WaitOutcome::Ceiling;
            };
            keeper.touch().await?;
            if tracker.observe(delta) {
                break WaitOutcome::Signalled;
            }
        };
        debug!(outcome = ?outcome, polls = self.polls, "page_started");
        Ok(outcome)
    }

    /// Wait for enough consecutive idle polls, or the overall ceiling.
    pub async fn wait_for_settle(
        &mut self,
        ctx: &AppContext,
        keeper: &LeaseKeeper,
    ) -> Result<WaitOutcome, LeaseError> {
        let mut tracker =
            IdleTracker::new(self.policy.idle_threshold_bytes, self.policy.settle_idle_polls);
        let outcome = loop {
            let Some(delta) = self.sample(ctx, self.deadline).await else {
                break WaitOutcome::Ceiling;
            };
            // Logged only; settling is decided on video growth alone.
            match timeout_at(self.deadline, ctx.device.bytes_received_delta()).await {
                Ok(Ok(bytes)) => debug!(delta, bytes_received = bytes, "settle_poll"),
                _ => debug!(delta, "settle_poll"),
            }
            keeper.touch().await?;
            if tracker.observe(delta) {
                break WaitOutcome::Signalled;
            }
        };
        debug!(outcome = ?outcome, polls = self.polls, "page_settled");
        Ok(outcome)
    }

    /// Summary of both phases once they are done.
    pub fn report(&self, startup: WaitOutcome, settle: WaitOutcome) -> CompletionReport {
        CompletionReport {
            startup,
            settle,
            polls: self.polls,
        }
    }

    /// Sleep one interval, then read the video growth since the last poll.
    /// `None` once `until` is reached; a failed read counts as no growth.
    async fn sample(&mut self, ctx: &AppContext, until: Instant) -> Option<i64> {
        let now = Instant::now();
        if now >= until {
            return None;
        }
        tokio::time::sleep_until((now + self.policy.poll_interval).min(until)).await;
        if Instant::now() >= until && self.policy.poll_interval > until - now {
            return None;
        }

        let size = match timeout_at(until, ctx.device.video_size()).await {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                warn!(error = %e, "video_size_failed");
                self.last_size
            }
            Err(_) => return None,
        };
        self.polls += 1;
        let delta = size as i64 - self.last_size as i64;
        self.last_size = size;
        debug!(size, delta, "video_size");
        Some(delta)
    }
}

/// Waits for received traffic to drop off, used as a barrier on the neutral page.
pub struct WaitForNetworkIdleUseCase;

impl WaitForNetworkIdleUseCase {
    pub async fn execute(ctx: &AppContext, keeper: &LeaseKeeper) -> Result<WaitOutcome, LeaseError> {
        let policy = ctx.settings.network_idle_policy();
        let deadline = Instant::now() + policy.timeout;
        let mut tracker = IdleTracker::new(policy.threshold_bytes, policy.idle_polls);

        // Step 1: Reset the counter baseline.
        if let Ok(Err(e)) = timeout_at(deadline, ctx.device.bytes_received_delta()).await {
            debug!(error = %e, "bytes_received_failed");
        }

        // Step 2: Poll until enough quiet intervals in a row, or the ceiling.
        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!("network_idle_ceiling");
                return Ok(WaitOutcome::Ceiling);
            }
            tokio::time::sleep_until((now + policy.poll_interval).min(deadline)).await;

            let bytes = match timeout_at(deadline, ctx.device.bytes_received_delta()).await {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    debug!(error = %e, "bytes_received_failed");
                    continue;
                }
                Err(_) => return Ok(WaitOutcome::Ceiling),
            };
            debug!(bytes_received = bytes, "network_poll");
            keeper.touch().await?;
            if tracker.observe(bytes) {
                return Ok(WaitOutcome::Signalled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::{keeper, test_context};
    use crate::domain::value_objects::ids::QueueJobId;
    use std::sync::Arc;
    use std::time::Duration;

    async fn load_page(ctx: &AppContext, keeper: &LeaseKeeper) -> Result<CompletionReport, LeaseError> {
        let mut detector = CompletionDetector::begin(ctx).await;
        let startup = detector.wait_for_start(ctx, keeper).await?;
        let settle = detector.wait_for_settle(ctx, keeper).await?;
        Ok(detector.report(startup, settle))
    }

    fn with_default_timings(
        root: &std::path::Path,
    ) -> (
        Arc<AppContext>,
        Arc<crate::application::context::test_support::FakeQueue>,
        Arc<crate::application::context::test_support::FakeDevice>,
    ) {
        let (ctx, queue, device) = test_context(root);
        let mut ctx = Arc::try_unwrap(ctx).ok().unwrap();
        let defaults = crate::config::test_support::settings(root);
        ctx.settings.detector = defaults.detector;
        ctx.settings.network_idle = defaults.network_idle;
        (Arc::new(ctx), queue, device)
    }

    #[tokio::test(start_paused = true)]
    async fn given_flat_video_when_detecting_should_hit_startup_ceiling_then_settle() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, device) = with_default_timings(dir.path());
        device.script_video_sizes([1_000]);
        let keeper = LeaseKeeper::detached(queue.clone());
        let started = Instant::now();

        let report = load_page(&ctx, &keeper).await.unwrap();

        assert_eq!(report.startup, WaitOutcome::Ceiling);
        assert_eq!(report.settle, WaitOutcome::Signalled);
        // Six startup polls up to 30s, then four idle polls.
        assert_eq!(report.polls, 10);
        assert_eq!(started.elapsed(), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn given_busy_then_quiet_video_when_detecting_should_settle_on_fourth_idle_sample() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, device) = with_default_timings(dir.path());
        // Baseline, a startup jump, then 20000 / 5000 x4.
        device.script_video_sizes([0, 100_000, 120_000, 125_000, 130_000, 135_000, 140_000]);
        let keeper = keeper(&queue, 1);

        let mut detector = CompletionDetector::begin(&ctx).await;
        assert_eq!(
            detector.wait_for_start(&ctx, &keeper).await.unwrap(),
            WaitOutcome::Signalled
        );
        let settle_started = Instant::now();
        let settle = detector.wait_for_settle(&ctx, &keeper).await.unwrap();

        assert_eq!(settle, WaitOutcome::Signalled);
        assert_eq!(settle_started.elapsed(), Duration::from_secs(25));
        assert_eq!(queue.touched().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn given_video_that_never_settles_when_detecting_should_stop_at_total_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, device) = with_default_timings(dir.path());
        device.script_video_sizes((0..100).map(|i| i * 20_000));
        let keeper = LeaseKeeper::detached(queue.clone());
        let started = Instant::now();

        let report = load_page(&ctx, &keeper).await.unwrap();

        assert_eq!(report.startup, WaitOutcome::Ceiling);
        assert_eq!(report.settle, WaitOutcome::Ceiling);
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn given_lost_lease_when_detecting_should_stop_early() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, _device) = with_default_timings(dir.path());
        queue.lose_reservations();
        let keeper = keeper(&queue, 2);

        let err = load_page(&ctx, &keeper).await.unwrap_err();

        assert_eq!(err, LeaseError::Lost(QueueJobId(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn given_quiet_network_when_waiting_should_signal_after_five_polls() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, device) = with_default_timings(dir.path());
        device.script_rx([0, 50_000, 51_000]);
        let keeper = LeaseKeeper::detached(queue.clone());
        let started = Instant::now();

        let outcome = WaitForNetworkIdleUseCase::execute(&ctx, &keeper).await.unwrap();

        assert_eq!(outcome, WaitOutcome::Signalled);
        // One busy second, then five quiet ones.
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn given_busy_network_when_waiting_should_stop_at_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, device) = with_default_timings(dir.path());
        device.script_rx((0..200).map(|i| i * 20_000));
        let keeper = LeaseKeeper::detached(queue.clone());
        let started = Instant::now();

        let outcome = WaitForNetworkIdleUseCase::execute(&ctx, &keeper).await.unwrap();

        assert_eq!(outcome, WaitOutcome::Ceiling);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }
}
