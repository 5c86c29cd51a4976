//! 数据库资源协调器

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{DatabaseResource, ResourceKind};
use common::statement::{self, ResourceConfig};
use tracing::info;
use validator::Validate;

use super::{
    already_exists_or, drop_idempotent, ensure_absent, ResourceLifecycle, SharedExecutor,
    UpdatePlan,
};
use crate::executor::StatementExecutor;

/// Manages `CREATE DATABASE` / `DROP DATABASE`.
///
/// A database has no alterable attribute: any change is a replacement.
pub struct DatabaseReconciler {
    executor: SharedExecutor,
}

impl DatabaseReconciler {
    pub fn new(executor: SharedExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ResourceLifecycle for DatabaseReconciler {
    type Resource = DatabaseResource;

    fn executor(&self) -> &dyn StatementExecutor {
        self.executor.as_ref()
    }

    async fn create(&self, declared: &DatabaseResource) -> AppResult<DatabaseResource> {
        declared.validate()?;
        ensure_absent(self, declared).await?;
        for statement in ResourceConfig::Database(declared).create_statements() {
            self.executor
                .execute(&statement)
                .await
                .map_err(|e| already_exists_or(e, declared))?;
        }
        info!(name = %declared.name, "数据库已创建");
        Ok(declared.clone())
    }

    async fn read(&self, current: &DatabaseResource) -> AppResult<Option<DatabaseResource>> {
        let series = self.executor.query(&statement::show_databases()).await?;
        let found = series
            .iter()
            .flat_map(|s| s.rows())
            .any(|row| row.get_str("name") == Some(current.name.as_str()));
        Ok(found.then(|| DatabaseResource::new(current.name.clone())))
    }

    async fn delete(&self, current: &DatabaseResource) -> AppResult<()> {
        drop_idempotent(
            self.executor.as_ref(),
            ResourceKind::Database,
            &current.name,
            &ResourceConfig::Database(current).drop_statement(),
        )
        .await
    }

    fn plan_update(&self, prior: &DatabaseResource, planned: &DatabaseResource) -> UpdatePlan {
        let mut plan = UpdatePlan::default();
        plan.recreate_if_changed("name", &prior.name, &planned.name);
        plan
    }
}
