//! Application state for the provider service.

use common::config::AppConfig;

use crate::reconciler::{
    ContinuousQueryReconciler, DatabaseReconciler, SharedExecutor, UserReconciler,
};

/// Application state shared across handlers.
///
/// Holds the single connection handle; reconcilers are cheap views over it.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// InfluxDB endpoint, reported by the health check.
    pub endpoint: String,
    pub executor: SharedExecutor,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: AppConfig, endpoint: impl Into<String>, executor: SharedExecutor) -> Self {
        Self {
            config,
            endpoint: endpoint.into(),
            executor,
        }
    }

    pub fn databases(&self) -> DatabaseReconciler {
        DatabaseReconciler::new(self.executor.clone())
    }

    pub fn users(&self) -> UserReconciler {
        UserReconciler::new(self.executor.clone())
    }

    pub fn continuous_queries(&self) -> ContinuousQueryReconciler {
        ContinuousQueryReconciler::new(self.executor.clone())
    }
}
