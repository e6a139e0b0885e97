// Use case: orchestrator_loop.

use crate::application::context::AppContext;
use crate::application::usecases::acquire_lease::{AcquireLeaseError, AcquireLeaseUseCase};
use crate::application::usecases::complete_lease::CompleteLeaseUseCase;
use crate::application::usecases::install_browser::InstallBrowserUseCase;
use crate::application::usecases::keep_alive::{KeepAliveUseCase, LeaseKeeper};
use crate::application::usecases::run_test::RunTestUseCase;
use crate::application::usecases::wait_for_device::WaitForDeviceUseCase;
use crate::domain::entities::lease::LeaseOutcome;
use crate::domain::entities::test_job::LeasedWork;
use crate::domain::value_objects::ids::TestId;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Top-level cycle: wait for the device, lease a job, run it, repeat.
pub struct OrchestratorLoopUseCase;

#[derive(Debug)]
pub enum OrchestratorLoopError {
    Status(String),
}

/// What one pass of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Idle,
    Dropped,
    Completed { test_id: TestId, outcome: LeaseOutcome },
}

impl OrchestratorLoopUseCase {
    /// Run until `shutdown` flips, then persist the durable status.
    pub async fn run(
        ctx: Arc<AppContext>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), OrchestratorLoopError> {
        // Step 1: Restore state from the previous session.
        let restored = ctx.status_store.load().await;
        info!(last_apk = restored.last_apk.as_deref().unwrap_or(""), "status_loaded");
        *ctx.status.lock().await = restored;

        // Step 2: Start the independent keep-alive cycle.
        let renewer = tokio::spawn(KeepAliveUseCase::run(
            Arc::clone(&ctx.queue),
            ctx.active_lease.subscribe(),
            ctx.settings.lease_policy().keep_alive_interval(),
            shutdown.clone(),
        ));

        // Step 3: Clear shaping left behind by an earlier session.
        if let Some(shaper) = &ctx.shaper {
            if let Err(e) = shaper.reset().await {
                warn!(error = %e, "traffic_shaping_reset_failed");
            }
        }

        // Step 4: Loop until shutdown; stop requests are honoured between jobs.
        loop {
            if *shutdown.borrow() {
                break;
            }
            if WaitForDeviceUseCase::execute(&ctx, &mut shutdown).await.is_none() {
                break;
            }
            Self::run_once(&ctx).await;
        }
        info!("orchestrator_stopping");

        // Step 5: Wait for the keep-alive cycle to notice the shutdown.
        if let Err(e) = renewer.await {
            warn!(error = %e, "keep_alive_join_failed");
        }

        // Step 6: Persist the durable status once.
        let status = ctx.status.lock().await.clone();
        ctx.status_store
            .save(&status)
            .await
            .map_err(|e| OrchestratorLoopError::Status(format!("{e:?}")))?;
        Ok(())
    }

    /// Lease one job and drive it to a terminal state.
    #[instrument(skip(ctx))]
    pub async fn run_once(ctx: &Arc<AppContext>) -> CycleOutcome {
        // Step 1: Try to lease a job.
        let reserve_timeout = Duration::from_secs(ctx.settings.queue.reserve_timeout_seconds);
        let acquired = match AcquireLeaseUseCase::execute(ctx, reserve_timeout).await {
            Ok(Some(acquired)) => acquired,
            Ok(None) => return CycleOutcome::Idle,
            Err(AcquireLeaseError::Malformed { job_id, reason }) => {
                warn!(job_id = job_id.0, reason = %reason, "job_dropped");
                return CycleOutcome::Dropped;
            }
            Err(AcquireLeaseError::Queue(e)) => {
                error!(error = %e, "queue_reserve_failed");
                tokio::time::sleep(Duration::from_millis(ctx.settings.queue.error_backoff_ms))
                    .await;
                return CycleOutcome::Idle;
            }
        };

        // Step 2: Run the work under the lease.
        let keeper = LeaseKeeper::new(Arc::clone(&ctx.queue), acquired.lease.clone());
        let outcome = match acquired.work {
            LeasedWork::Test(job) => RunTestUseCase::execute(ctx, job, keeper.clone())
                .await
                .disposition
                .lease_outcome(),
            LeasedWork::RefreshLatest { package_reference } => {
                Self::refresh_latest(ctx, &package_reference).await
            }
        };

        // Step 3: Hand the job back to the queue.
        let lease = keeper.lease().unwrap_or(acquired.lease);
        if let Err(e) = CompleteLeaseUseCase::execute(ctx, &lease, outcome).await {
            warn!(error = ?e, "lease_complete_failed");
        }

        CycleOutcome::Completed {
            test_id: lease.test_id,
            outcome,
        }
    }

    /// Install the most recent build without running a test.
    async fn refresh_latest(ctx: &AppContext, package: &Path) -> LeaseOutcome {
        let installed = match InstallBrowserUseCase::package_hash(package).await {
            Ok(hash) => InstallBrowserUseCase::execute(ctx, package, &hash).await,
            Err(e) => Err(e),
        };
        match installed {
            Ok(outcome) => {
                info!(outcome = ?outcome, "latest_refreshed");
                LeaseOutcome::Succeeded
            }
            Err(e) => {
                warn!(error = ?e, "latest_refresh_failed");
                LeaseOutcome::Failed
            }
        }
    }
}
