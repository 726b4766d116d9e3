//! Shared utilities for the equity analysis workspace

pub mod logging;

pub use logging::{LogFormat, init_tracing};
