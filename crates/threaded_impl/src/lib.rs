//! Periodic control task on a dedicated OS thread.

pub mod control;
pub mod schedule;

pub use control::ThreadedController;
pub use schedule::Ticker;
