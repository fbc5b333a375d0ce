pub mod scheduler;

pub use scheduler::{RefreshError, RefreshScheduler, RefreshState, TaskStatus};
