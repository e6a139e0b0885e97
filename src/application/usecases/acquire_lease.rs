// Use case: acquire_lease.

use crate::application::context::AppContext;
use crate::domain::entities::lease::Lease;
use crate::domain::entities::test_job::{package_path, LeasedWork, TestJob};
use crate::domain::value_objects::ids::{QueueJobId, TestId, LATEST_SENTINEL};
use crate::infrastructure::storage::result_dir::ResultDir;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Reserves the next job and resolves it into work for this device.
pub struct AcquireLeaseUseCase;

#[derive(Debug)]
pub enum AcquireLeaseError {
    Queue(String),
    /// Left reserved and untouched so the queue's own timeout redelivers it.
    Malformed { job_id: QueueJobId, reason: String },
}

#[derive(Debug)]
pub struct AcquiredLease {
    pub lease: Lease,
    pub work: LeasedWork,
}

impl AcquireLeaseUseCase {
    /// Reserve a job, validate its id and load its descriptor.
    #[instrument(skip(ctx))]
    pub async fn execute(
        ctx: &AppContext,
        reserve_timeout: Duration,
    ) -> Result<Option<AcquiredLease>, AcquireLeaseError> {
        // Step 1: Reserve the next job; a timeout is the normal idle case.
        let reserved = ctx
            .queue
            .reserve(reserve_timeout)
            .await
            .map_err(|e| AcquireLeaseError::Queue(format!("{e:?}")))?;
        let Some(reserved) = reserved else {
            return Ok(None);
        };

        // Step 2: Only allow-listed ids ever reach path construction.
        let test_id = TestId::parse(reserved.body.trim()).map_err(|e| {
            warn!(job_id = reserved.id.0, "malformed_job_id");
            AcquireLeaseError::Malformed {
                job_id: reserved.id,
                reason: format!("{e:?}"),
            }
        })?;

        // Step 3: Resolve the work the id stands for.
        let work = if test_id.is_latest() {
            LeasedWork::RefreshLatest {
                package_reference: package_path(&ctx.settings.paths.apk_dir, LATEST_SENTINEL),
            }
        } else {
            let results = ResultDir::new(test_id.result_dir(&ctx.settings.paths.results_dir));
            let descriptor = results.load_descriptor().await.map_err(|e| {
                warn!(job_id = reserved.id.0, test_id = %test_id, "descriptor_unreadable");
                AcquireLeaseError::Malformed {
                    job_id: reserved.id,
                    reason: e.to_string(),
                }
            })?;
            let job = TestJob::from_descriptor(
                test_id.clone(),
                descriptor,
                &ctx.settings.paths.results_dir,
                &ctx.settings.paths.apk_dir,
            )
            .map_err(|e| {
                warn!(job_id = reserved.id.0, test_id = %test_id, "descriptor_invalid");
                AcquireLeaseError::Malformed {
                    job_id: reserved.id,
                    reason: format!("{e:?}"),
                }
            })?;
            LeasedWork::Test(job)
        };

        // Step 4: Publish the reservation to the keep-alive cycle.
        ctx.active_lease.send_replace(Some(reserved.id));
        info!(job_id = reserved.id.0, test_id = %test_id, "lease_acquired");

        Ok(Some(AcquiredLease {
            lease: Lease::new(reserved.id, test_id),
            work,
        }))
    }
}
