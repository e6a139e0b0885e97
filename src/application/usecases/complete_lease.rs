// Use case: complete_lease.

use crate::application::context::AppContext;
use crate::domain::entities::lease::{Lease, LeaseOutcome};
use crate::domain::value_objects::timestamps::Timestamp;
use crate::infrastructure::queue::QueueError;
use tracing::{info, instrument, warn};

/// Hands a finished job back to the queue.
pub struct CompleteLeaseUseCase;

#[derive(Debug)]
pub enum CompleteLeaseError {
    LeaseLost,
    Queue(String),
}

impl CompleteLeaseUseCase {
    /// Optionally forward the id downstream, then always delete the reservation.
    #[instrument(skip(ctx, lease), fields(job_id = lease.job_id.0))]
    pub async fn execute(
        ctx: &AppContext,
        lease: &Lease,
        outcome: LeaseOutcome,
    ) -> Result<(), CompleteLeaseError> {
        // Step 1: Stop the keep-alive cycle from renewing this job.
        ctx.active_lease.send_replace(None);

        // Step 2: Forward successful jobs when a downstream tube is configured.
        if outcome == LeaseOutcome::Succeeded {
            if let Some(tube) = &ctx.settings.queue.downstream_tube {
                if let Err(e) = ctx.queue.put(tube, lease.test_id.as_str()).await {
                    warn!(tube = %tube, error = %e, "downstream_put_failed");
                }
            }
        }

        // Step 3: Delete the reservation whatever the outcome.
        ctx.queue.delete(lease.job_id).await.map_err(|e| match e {
            QueueError::NotFound => CompleteLeaseError::LeaseLost,
            other => CompleteLeaseError::Queue(format!("{other:?}")),
        })?;

        let now = Timestamp::now_utc();
        info!(
            test_id = %lease.test_id,
            outcome = ?outcome,
            held_seconds = lease.acquired_at.until(now).whole_seconds(),
            since_touch_seconds = lease.last_touch.until(now).whole_seconds(),
            "lease_completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::test_context;
    use crate::domain::value_objects::ids::{QueueJobId, TestId};
    use std::sync::Arc;

    fn lease() -> Lease {
        Lease::new(QueueJobId(4), TestId::parse("20240101_abc").unwrap())
    }

    #[tokio::test]
    async fn given_failed_job_when_completing_should_delete_without_forwarding() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, _device) = test_context(dir.path());
        ctx.active_lease.send_replace(Some(QueueJobId(4)));

        CompleteLeaseUseCase::execute(&ctx, &lease(), LeaseOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(queue.deleted(), vec![QueueJobId(4)]);
        assert!(queue.put_bodies().is_empty());
        assert_eq!(*ctx.active_lease.borrow(), None);
    }

    #[tokio::test]
    async fn given_downstream_tube_when_job_succeeds_should_forward_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, queue, _device) = test_context(dir.path());
        let mut ctx = Arc::try_unwrap(ctx).ok().unwrap();
        ctx.settings.queue.downstream_tube = Some("analyze".to_string());

        CompleteLeaseUseCase::execute(&ctx, &lease(), LeaseOutcome::Succeeded)
            .await
            .unwrap();

        assert_eq!(
            queue.put_bodies(),
            vec![("analyze".to_string(), "20240101_abc".to_string())]
        );
        assert_eq!(queue.deleted(), vec![QueueJobId(4)]);
    }
}
