use std::time::Duration;

use chrono::NaiveDate;

use crate::{AnalysisError, FinancialDataProvider, FinancialStatements, PriceBar};

/// Exponential backoff policy applied around provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (0-based), capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|d| d.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T, AnalysisError>
    where
        F: FnMut() -> Result<T, AnalysisError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let wait = self.backoff_for(attempt - 1);
                    tracing::warn!(
                        "{} failed: {} - retrying in {}ms ({}/{})",
                        operation,
                        e,
                        wait.as_millis(),
                        attempt,
                        attempts
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wraps a provider so every fetch goes through a [`RetryPolicy`].
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: FinancialDataProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: FinancialDataProvider> FinancialDataProvider for RetryingProvider<P> {
    fn get_financial_statements(&self, symbol: &str) -> Result<FinancialStatements, AnalysisError> {
        self.policy
            .run(&format!("financial statements for {}", symbol), || {
                self.inner.get_financial_statements(symbol)
            })
    }

    fn get_latest_price(&self, symbol: &str) -> Result<f64, AnalysisError> {
        self.policy
            .run(&format!("latest price for {}", symbol), || {
                self.inner.get_latest_price(symbol)
            })
    }

    fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        self.policy
            .run(&format!("price history for {}", symbol), || {
                self.inner.get_price_history(symbol, start, end)
            })
    }
}
