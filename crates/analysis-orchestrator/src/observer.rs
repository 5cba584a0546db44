use analysis_core::AnalysisError;

use crate::screener::ScreeningReport;

/// Receives progress events from a screening run.
///
/// Injected into [`crate::ValueScreener`] so callers decide where per-symbol
/// failures go. All hooks except `on_symbol_failed` default to no-ops.
pub trait ScreenObserver: Send + Sync {
    fn on_start(&self, _total: usize) {}

    fn on_symbol_failed(&self, symbol: &str, error: &AnalysisError);

    fn on_complete(&self, _report: &ScreeningReport) {}
}

/// Default observer: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScreenObserver for TracingObserver {
    fn on_start(&self, total: usize) {
        tracing::info!("📊 Starting value screen of {} symbols", total);
    }

    fn on_symbol_failed(&self, symbol: &str, error: &AnalysisError) {
        tracing::warn!("Failed to analyze {}: {}", symbol, error);
    }

    fn on_complete(&self, report: &ScreeningReport) {
        tracing::info!(
            "✅ Screen complete: {}/{} symbols passed, {} skipped",
            report.rows.len(),
            report.total_analyzed,
            report.skipped.len()
        );
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScreenObserver for NoopObserver {
    fn on_symbol_failed(&self, _symbol: &str, _error: &AnalysisError) {}
}
