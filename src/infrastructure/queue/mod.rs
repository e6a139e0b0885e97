pub mod beanstalk;
pub mod job_queue;

pub use beanstalk::BeanstalkQueue;
pub use job_queue::{JobQueue, QueueError, ReservedJob};
