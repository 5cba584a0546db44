pub mod engine;
pub mod models;
pub mod performance;

#[cfg(test)]
mod tests;

pub use engine::{BacktestEngine, Strategy, ValueStrategy};
pub use models::*;
pub use performance::{performance_metrics, period_returns};
