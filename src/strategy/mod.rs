//! Strategy Module
//!
//! Fetch strategies choosing between network and cache per request.

mod background;
mod executor;

pub use background::BackgroundTasks;
pub use executor::{ResponseSource, StrategyExecutor, StrategyResponse};
