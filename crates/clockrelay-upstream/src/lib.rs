//! ClockRelay upstream — bounded-backoff retry runner and the thin
//! bearer-token client for the time-tracker API.

pub mod retry;
pub mod tracker;

pub use retry::{RetryError, RetryPolicy};
pub use tracker::TrackerClient;
