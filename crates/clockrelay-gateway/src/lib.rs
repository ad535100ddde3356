//! ClockRelay gateway — the HTTP surface and the asynchronous command
//! dispatcher that fronts slow data operations behind a fast ack.

pub mod command;
pub mod dispatch;
pub mod jobs;
pub mod routes;
pub mod server;

pub use dispatch::report_for_topic;
pub use server::{build_router, start, AppState};
