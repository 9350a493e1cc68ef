pub mod assigner;
pub mod job;
pub mod machine;

pub use job::{Job, JobStatus, Mechanic};
