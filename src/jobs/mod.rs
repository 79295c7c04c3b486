//! Background validation jobs: the queue that runs them, the status they
//! publish, the validators they run and the poll view over all of it.

pub mod queue;
pub mod runner;
pub mod status;
pub mod tracker;
pub mod validators;

pub use queue::{JobHandle, JobQueue, QueueConfig, QueueStats};
pub use runner::{CheckState, ValidationJob, ValidationJobRunner, ValidatorProgress, VALIDATION_JOB_NAME};
pub use status::{JobState, JobStatusRecord, JobStatusStore};
pub use tracker::{JobStatusTracker, StatusSnapshot};
pub use validators::{ValidationContext, Validator, ValidatorRegistry, ValidatorReport};
