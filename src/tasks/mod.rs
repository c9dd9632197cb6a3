//! Background Tasks Module
//!
//! Periodic housekeeping that runs alongside the host.
//!
//! # Tasks
//! - Expiry sweep: applies age-based eviction to every store between writes

mod cleanup;

pub use cleanup::spawn_sweep_task;
