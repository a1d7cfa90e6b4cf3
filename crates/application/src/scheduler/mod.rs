mod backoff;
mod projector_scheduler;
mod queue;

pub use backoff::BackoffPolicy;
pub use projector_scheduler::{ProjectorScheduler, SchedulerHandle, SchedulerSettings};
pub use queue::{CommandQueue, PushOutcome};
