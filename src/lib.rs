pub mod board;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod poll;
pub mod queue;
pub mod reconcile;
pub mod remote;

pub use error::{Result, SyncError};
