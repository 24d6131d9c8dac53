//! Job records and identifiers.

pub mod id;
pub mod model;

pub use id::{suffixed_id, timestamp_job_id};
pub use model::{parse_timestamp, Job, JobStatus, NewJob, PROCESSOR_FIELDS};
