//! Process-wide log setup shared by the uptrack binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, init_tracing_with};
