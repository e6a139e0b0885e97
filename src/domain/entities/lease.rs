use crate::domain::value_objects::ids::{QueueJobId, TestId};
use crate::domain::value_objects::timestamps::Timestamp;

/// Exclusive ownership of one reserved queue job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub job_id: QueueJobId,
    pub test_id: TestId,
    pub acquired_at: Timestamp,
    pub last_touch: Timestamp,
}

impl Lease {
    pub fn new(job_id: QueueJobId, test_id: TestId) -> Self {
        let now = Timestamp::now_utc();
        Self {
            job_id,
            test_id,
            acquired_at: now,
            last_touch: now,
        }
    }

    pub fn record_touch(&mut self) {
        self.last_touch = Timestamp::now_utc();
    }
}

/// How a leased job ended, as reported back to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseOutcome {
    Succeeded,
    Failed,
}
