//! # Configuration
//!
//! Operator-level settings loaded from environment variables.

mod controller;

pub use controller::{ControllerConfig, LogFormat};
