//! 资源协调器
//!
//! One reconciler per resource kind, all behind [`ResourceLifecycle`]. Each
//! kind declares how an attribute change is applied through
//! [`ResourceLifecycle::plan_update`]; the shared `update` driver either runs
//! the in-place statements or falls back to delete-then-create.

pub mod continuous_query;
pub mod database;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::{ContinuousQueryResource, DatabaseResource, ResourceKind, UserResource};
use common::statement::Statement;
use tracing::{info, warn};
use validator::Validate;

use crate::executor::StatementExecutor;

pub use continuous_query::ContinuousQueryReconciler;
pub use database::DatabaseReconciler;
pub use user::UserReconciler;

/// Shared, immutable connection handle as seen by the reconcilers.
pub type SharedExecutor = Arc<dyn StatementExecutor>;

/// A declared/observed attribute set the provider manages.
pub trait ManagedResource: Validate + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    /// Human-readable identity used in errors and logs.
    fn identity(&self) -> String;
}

impl ManagedResource for DatabaseResource {
    const KIND: ResourceKind = ResourceKind::Database;

    fn identity(&self) -> String {
        self.name.clone()
    }
}

impl ManagedResource for UserResource {
    const KIND: ResourceKind = ResourceKind::User;

    fn identity(&self) -> String {
        self.name.clone()
    }
}

impl ManagedResource for ContinuousQueryResource {
    const KIND: ResourceKind = ResourceKind::ContinuousQuery;

    fn identity(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }
}

/// How one changed attribute converges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    /// Alterable attribute: run these statements in order.
    InPlace {
        attribute: &'static str,
        statements: Vec<Statement>,
    },
    /// No alter primitive exists; the resource must be replaced.
    RequiresRecreate { attribute: &'static str },
}

impl AttributeChange {
    pub fn in_place(attribute: &'static str, statements: Vec<Statement>) -> Self {
        AttributeChange::InPlace {
            attribute,
            statements,
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            AttributeChange::InPlace { attribute, .. }
            | AttributeChange::RequiresRecreate { attribute } => attribute,
        }
    }
}

/// Ordered changes between an observed and a declared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    pub changes: Vec<AttributeChange>,
}

impl UpdatePlan {
    pub fn push(&mut self, change: AttributeChange) {
        self.changes.push(change);
    }

    /// Flags `attribute` for replacement when `prior != planned`.
    pub fn recreate_if_changed<T: PartialEq>(
        &mut self,
        attribute: &'static str,
        prior: &T,
        planned: &T,
    ) {
        if prior != planned {
            self.push(AttributeChange::RequiresRecreate { attribute });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// First attribute that forces replacement, if any.
    pub fn recreate_attribute(&self) -> Option<&'static str> {
        self.changes.iter().find_map(|c| match c {
            AttributeChange::RequiresRecreate { attribute } => Some(*attribute),
            AttributeChange::InPlace { .. } => None,
        })
    }

    /// In-place statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.changes.iter().flat_map(|c| match c {
            AttributeChange::InPlace { statements, .. } => statements.as_slice(),
            AttributeChange::RequiresRecreate { .. } => &[],
        })
    }
}

/// Create/read/update/delete contract the orchestrating host drives.
#[async_trait]
pub trait ResourceLifecycle: Send + Sync {
    type Resource: ManagedResource;

    /// Connection the reconciler runs statements on.
    fn executor(&self) -> &dyn StatementExecutor;

    /// Creates the resource; observed state equals the declaration on success.
    async fn create(&self, declared: &Self::Resource) -> AppResult<Self::Resource>;

    /// Rebuilds observed state; `None` means the resource is gone.
    async fn read(&self, current: &Self::Resource) -> AppResult<Option<Self::Resource>>;

    /// Removes the resource. Absence is success.
    async fn delete(&self, current: &Self::Resource) -> AppResult<()>;

    /// Diffs observed against declared state, attribute by attribute.
    fn plan_update(&self, prior: &Self::Resource, planned: &Self::Resource) -> UpdatePlan;

    /// Converges `prior` to `planned` with the cheapest statements available.
    ///
    /// Replacement only happens when `allow_recreate` is set; otherwise an
    /// immutable-attribute change is `AppError::RecreateRequired`.
    async fn update(
        &self,
        prior: &Self::Resource,
        planned: &Self::Resource,
        allow_recreate: bool,
    ) -> AppResult<Self::Resource> {
        planned.validate()?;
        let kind = <Self::Resource as ManagedResource>::KIND;
        let plan = self.plan_update(prior, planned);

        if let Some(attribute) = plan.recreate_attribute() {
            if !allow_recreate {
                return Err(AppError::RecreateRequired {
                    kind: kind.as_str(),
                    name: planned.identity(),
                    attribute,
                });
            }
            warn!(%kind, name = %planned.identity(), attribute, "属性不可原地修改，删除后重建");
            self.delete(prior).await?;
            return self.create(planned).await;
        }

        for statement in plan.statements() {
            self.executor().execute(statement).await?;
        }
        if !plan.is_empty() {
            info!(%kind, name = %planned.identity(), changes = plan.changes.len(), "资源已更新");
        }
        Ok(planned.clone())
    }
}

/// Runs a drop statement, treating an absent object as already deleted.
pub(crate) async fn drop_idempotent(
    executor: &dyn StatementExecutor,
    kind: ResourceKind,
    name: &str,
    statement: &Statement,
) -> AppResult<()> {
    match executor.execute(statement).await {
        Ok(()) => {
            info!(%kind, name, "资源已删除");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            warn!(%kind, name, error = %e, "资源已不存在，视为删除成功");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Fails with `AppError::AlreadyExists` when `declared` is already on the server.
///
/// InfluxDB accepts a repeated `CREATE DATABASE`, and a repeated identical
/// `CREATE CONTINUOUS QUERY`, without error, so duplicates are detected by
/// listing first.
pub(crate) async fn ensure_absent<L>(lifecycle: &L, declared: &L::Resource) -> AppResult<()>
where
    L: ResourceLifecycle + ?Sized,
{
    match lifecycle.read(declared).await? {
        Some(_) => Err(already_exists(declared)),
        None => Ok(()),
    }
}

fn already_exists<R: ManagedResource>(resource: &R) -> AppError {
    AppError::AlreadyExists {
        kind: R::KIND.as_str(),
        name: resource.identity(),
    }
}

/// Maps a duplicate-name server error onto `AppError::AlreadyExists`.
pub(crate) fn already_exists_or<R: ManagedResource>(err: AppError, resource: &R) -> AppError {
    if err.is_already_exists() {
        already_exists(resource)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::statement;

    #[test]
    fn test_plan_statements_skip_recreate_markers() {
        let mut plan = UpdatePlan::default();
        plan.push(AttributeChange::in_place("admin", vec![statement::grant_admin("a")]));
        plan.push(AttributeChange::RequiresRecreate { attribute: "name" });
        assert_eq!(plan.statements().count(), 1);
        assert_eq!(plan.recreate_attribute(), Some("name"));
    }

    #[test]
    fn test_recreate_if_changed() {
        let mut plan = UpdatePlan::default();
        plan.recreate_if_changed("query", &"a", &"a");
        assert!(plan.is_empty());
        plan.recreate_if_changed("query", &"a", &"b");
        assert_eq!(plan.changes[0].attribute(), "query");
    }
}
