//! Periodic control task as a tokio task.

pub mod control;

pub use control::AsyncController;
