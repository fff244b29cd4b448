//! Shared application state.

use std::sync::Arc;

use flexlm_core::LicenseMetrics;

/// State handed to every HTTP handler.
///
/// Handlers only read the pre-rendered exposition, so no lock is shared
/// with the poll loop.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) metrics: Arc<LicenseMetrics>,
}

impl AppState {
    pub(crate) fn new(metrics: Arc<LicenseMetrics>) -> Self {
        Self { metrics }
    }
}
