//! Logging and frame timing

pub mod frames;
pub mod logging;

pub use frames::{FrameStats, FrameTimer};
pub use logging::{init_logging, LogConfig, LogGuard};
