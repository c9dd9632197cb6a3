//! Routing Module
//!
//! Decides which route rule, if any, governs a request.

mod matcher;

pub use matcher::Matcher;
