//! 连续查询资源协调器

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{ContinuousQueryResource, ResourceKind};
use common::statement::{self, ResourceConfig};
use tracing::info;
use validator::Validate;

use super::{
    already_exists_or, drop_idempotent, ensure_absent, ManagedResource, ResourceLifecycle,
    SharedExecutor, UpdatePlan,
};
use crate::executor::StatementExecutor;

/// Manages continuous queries.
///
/// InfluxDB has no `ALTER CONTINUOUS QUERY`, so every attribute change is a
/// replacement. The query body is sent exactly as declared.
pub struct ContinuousQueryReconciler {
    executor: SharedExecutor,
}

impl ContinuousQueryReconciler {
    pub fn new(executor: SharedExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ResourceLifecycle for ContinuousQueryReconciler {
    type Resource = ContinuousQueryResource;

    fn executor(&self) -> &dyn StatementExecutor {
        self.executor.as_ref()
    }

    async fn create(&self, declared: &ContinuousQueryResource) -> AppResult<ContinuousQueryResource> {
        declared.validate()?;
        ensure_absent(self, declared).await?;
        for statement in ResourceConfig::ContinuousQuery(declared).create_statements() {
            self.executor
                .execute(&statement)
                .await
                .map_err(|e| already_exists_or(e, declared))?;
        }
        info!(name = %declared.name, database = %declared.database, "连续查询已创建");
        Ok(declared.clone())
    }

    /// `SHOW CONTINUOUS QUERIES` returns one series per database. The server
    /// stores a normalized definition, so the declared body is kept as observed.
    async fn read(
        &self,
        current: &ContinuousQueryResource,
    ) -> AppResult<Option<ContinuousQueryResource>> {
        let series = self
            .executor
            .query(&statement::show_continuous_queries())
            .await?;
        let found = series
            .iter()
            .filter(|s| s.name == current.database)
            .flat_map(|s| s.rows())
            .any(|row| row.get_str("name") == Some(current.name.as_str()));
        Ok(found.then(|| current.clone()))
    }

    async fn delete(&self, current: &ContinuousQueryResource) -> AppResult<()> {
        drop_idempotent(
            self.executor.as_ref(),
            ResourceKind::ContinuousQuery,
            &current.identity(),
            &ResourceConfig::ContinuousQuery(current).drop_statement(),
        )
        .await
    }

    fn plan_update(
        &self,
        prior: &ContinuousQueryResource,
        planned: &ContinuousQueryResource,
    ) -> UpdatePlan {
        let mut plan = UpdatePlan::default();
        plan.recreate_if_changed("name", &prior.name, &planned.name);
        plan.recreate_if_changed("database", &prior.database, &planned.database);
        plan.recreate_if_changed("query", &prior.query, &planned.query);
        plan
    }
}
