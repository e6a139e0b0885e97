// Use case: keep_alive.

use crate::domain::entities::lease::Lease;
use crate::domain::value_objects::ids::QueueJobId;
use crate::infrastructure::queue::{JobQueue, QueueError};
use metrics::counter;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseError {
    /// The queue no longer knows the job; another worker may own it now.
    Lost(QueueJobId),
}

/// Touches one reservation on behalf of the job workflow and records when it
/// was last renewed.
#[derive(Clone)]
pub struct LeaseKeeper {
    queue: Arc<dyn JobQueue>,
    lease: Option<Arc<Mutex<Lease>>>,
}

impl LeaseKeeper {
    pub fn new(queue: Arc<dyn JobQueue>, lease: Lease) -> Self {
        Self {
            queue,
            lease: Some(Arc::new(Mutex::new(lease))),
        }
    }

    /// A keeper with nothing to renew.
    pub fn detached(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue, lease: None }
    }

    /// Current view of the lease, including the last renewal.
    pub fn lease(&self) -> Option<Lease> {
        let lease = self.lease.as_ref()?;
        Some(lock(lease).clone())
    }

    /// Renew the reservation. Only a lost reservation is an error; transient
    /// queue failures are left to the next touch.
    pub async fn touch(&self) -> Result<(), LeaseError> {
        let Some(lease) = &self.lease else {
            return Ok(());
        };
        let job_id = lock(lease).job_id;

        match self.queue.touch(job_id).await {
            Ok(()) => {
                counter!("lease_touch_total").increment(1);
                lock(lease).record_touch();
                Ok(())
            }
            Err(QueueError::NotFound) => {
                counter!("lease_touch_failures_total").increment(1);
                warn!(job_id = job_id.0, "lease_lost");
                Err(LeaseError::Lost(job_id))
            }
            Err(e) => {
                counter!("lease_touch_failures_total").increment(1);
                warn!(job_id = job_id.0, error = %e, "lease_touch_failed");
                Ok(())
            }
        }
    }
}

fn lock(lease: &Mutex<Lease>) -> MutexGuard<'_, Lease> {
    lease.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Renews whichever reservation is active on a fixed cadence, independent of
/// the job workflow.
pub struct KeepAliveUseCase;

impl KeepAliveUseCase {
    /// Run until `shutdown` flips. An unset lease skips the tick.
    pub async fn run(
        queue: Arc<dyn JobQueue>,
        active: watch::Receiver<Option<QueueJobId>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            // Step 1: Wait for the next tick or shutdown.
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            // Step 2: Renew the current reservation, if any.
            let current = *active.borrow();
            let Some(job_id) = current else {
                continue;
            };
            match queue.touch(job_id).await {
                Ok(()) => {
                    counter!("lease_touch_total").increment(1);
                    debug!(job_id = job_id.0, "lease_renewed");
                }
                Err(e) => {
                    // The job workflow finds out on its own next touch.
                    counter!("lease_touch_failures_total").increment(1);
                    warn!(job_id = job_id.0, error = %e, "lease_renew_failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::{keeper, FakeQueue};
    use crate::domain::value_objects::ids::TestId;
    use crate::domain::value_objects::timestamps::Timestamp;

    #[tokio::test]
    async fn given_lost_reservation_when_touched_should_report_lost() {
        let queue = Arc::new(FakeQueue::default());
        let keeper = keeper(&queue, 7);
        keeper.touch().await.unwrap();

        queue.lose_reservations();

        assert_eq!(keeper.touch().await, Err(LeaseError::Lost(QueueJobId(7))));
        assert_eq!(queue.touched(), vec![QueueJobId(7)]);
    }

    #[tokio::test]
    async fn given_successful_touch_when_renewed_should_advance_last_touch() {
        let queue = Arc::new(FakeQueue::default());
        let mut lease = Lease::new(QueueJobId(5), TestId::parse("20240101_abc").unwrap());
        let stale = Timestamp(lease.last_touch.0 - time::Duration::seconds(30));
        lease.last_touch = stale;
        let keeper = LeaseKeeper::new(queue.clone(), lease);

        keeper.touch().await.unwrap();

        let renewed = keeper.lease().unwrap();
        assert!(renewed.last_touch > stale);
        assert_eq!(queue.touched(), vec![QueueJobId(5)]);
    }

    #[tokio::test]
    async fn given_lost_reservation_when_touched_should_keep_previous_touch_time() {
        let queue = Arc::new(FakeQueue::default());
        let keeper = keeper(&queue, 6);
        let before = keeper.lease().unwrap().last_touch;
        queue.lose_reservations();

        assert!(keeper.touch().await.is_err());

        assert_eq!(keeper.lease().unwrap().last_touch, before);
    }

    #[tokio::test]
    async fn given_detached_keeper_when_touched_should_not_call_queue() {
        let queue = Arc::new(FakeQueue::default());
        let keeper = LeaseKeeper::detached(queue.clone());

        keeper.touch().await.unwrap();

        assert!(queue.touched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn given_active_lease_when_ticking_should_renew_until_cleared() {
        let queue = Arc::new(FakeQueue::default());
        let (active_tx, active_rx) = watch::channel(Some(QueueJobId(3)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let renewer = tokio::spawn(KeepAliveUseCase::run(
            queue.clone(),
            active_rx,
            Duration::from_secs(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        active_tx.send_replace(None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        shutdown_tx.send_replace(true);
        renewer.await.unwrap();

        assert_eq!(queue.touched(), vec![QueueJobId(3), QueueJobId(3)]);
    }
}
