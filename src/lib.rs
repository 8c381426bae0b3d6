#![forbid(unsafe_code)]

//! Supervision of a networked `probe-rs` process: flash firmware, reset the
//! target, and stream its boot log from an attach-under-reset session with
//! bounded time and guaranteed teardown.

pub mod banner;
pub mod command;
pub mod config;
pub mod driver;
pub mod errors;
pub mod process;

pub use config::GlobalConfig;
pub use driver::ProbeDriver;
pub use errors::{AppError, Result};
