//! 用户资源协调器
//!
//! Users are the only kind with alterable attributes: the password, the admin
//! flag and per-database grants each have their own statements. Only the name
//! forces a replacement.

use std::collections::BTreeSet;

use async_trait::async_trait;
use common::errors::AppResult;
use common::models::{Grant, Privilege, ResourceKind, UserResource};
use common::statement::{self, ResourceConfig};
use tracing::{debug, info, warn};
use validator::Validate;

use super::{drop_idempotent, AttributeChange, ResourceLifecycle, SharedExecutor, UpdatePlan};
use crate::executor::StatementExecutor;

/// Manages InfluxDB users and their privileges.
///
/// Creating a user that already exists adopts it: the existing account is
/// read back and converged to the declaration, password included.
pub struct UserReconciler {
    executor: SharedExecutor,
}

impl UserReconciler {
    pub fn new(executor: SharedExecutor) -> Self {
        Self { executor }
    }

    /// Converges an account that already exists to `declared`.
    ///
    /// The password cannot be read back, so it is always re-set.
    async fn adopt_existing(
        &self,
        declared: &UserResource,
        mut observed: UserResource,
    ) -> AppResult<UserResource> {
        self.executor
            .execute(&statement::set_password(&declared.name, &declared.password))
            .await?;
        observed.password = declared.password.clone();

        let plan = self.plan_update(&observed, declared);
        for statement in plan.statements() {
            self.executor.execute(statement).await?;
        }
        info!(name = %declared.name, changes = plan.changes.len(), "已接管现有用户");
        Ok(declared.clone())
    }
}

#[async_trait]
impl ResourceLifecycle for UserReconciler {
    type Resource = UserResource;

    fn executor(&self) -> &dyn StatementExecutor {
        self.executor.as_ref()
    }

    async fn create(&self, declared: &UserResource) -> AppResult<UserResource> {
        declared.validate()?;
        // CREATE USER 在密码与管理员标志一致时不会报错，先查现有账号
        if let Some(observed) = self.read(declared).await? {
            warn!(name = %declared.name, "用户已存在，转为协调现有用户");
            return self.adopt_existing(declared, observed).await;
        }

        let mut statements = ResourceConfig::User(declared).create_statements().into_iter();
        if let Some(create) = statements.next() {
            match self.executor.execute(&create).await {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {
                    // 查询与创建之间被并发创建
                    let observed = self.read(declared).await?.ok_or(e)?;
                    return self.adopt_existing(declared, observed).await;
                }
                Err(e) => return Err(e),
            }
        }
        for grant in statements {
            self.executor.execute(&grant).await?;
        }

        info!(name = %declared.name, admin = declared.admin, grants = declared.grants.len(), "用户已创建");
        Ok(declared.clone())
    }

    async fn read(&self, current: &UserResource) -> AppResult<Option<UserResource>> {
        let users = self.executor.query(&statement::show_users()).await?;
        let admin = users
            .iter()
            .flat_map(|s| s.rows())
            .find(|row| row.get_str("user") == Some(current.name.as_str()))
            .map(|row| row.get_bool("admin").unwrap_or(false));
        let Some(admin) = admin else {
            return Ok(None);
        };

        let series = match self.executor.query(&statement::show_grants(&current.name)).await {
            Ok(series) => series,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut grants = BTreeSet::new();
        for row in series.iter().flat_map(|s| s.rows()) {
            let (Some(database), Some(privilege)) = (row.get_str("database"), row.get_str("privilege"))
            else {
                continue;
            };
            match privilege.parse::<Privilege>() {
                Ok(privilege) => {
                    grants.insert(Grant::new(database, privilege));
                }
                Err(_) => debug!(database, privilege, "跳过无权限记录"),
            }
        }

        Ok(Some(UserResource {
            name: current.name.clone(),
            password: current.password.clone(),
            admin,
            grants,
        }))
    }

    async fn delete(&self, current: &UserResource) -> AppResult<()> {
        drop_idempotent(
            self.executor.as_ref(),
            ResourceKind::User,
            &current.name,
            &ResourceConfig::User(current).drop_statement(),
        )
        .await
    }

    /// Order: password, admin grant, database grants, database revokes, admin
    /// revoke. Privileges are never narrower mid-update than at either end.
    fn plan_update(&self, prior: &UserResource, planned: &UserResource) -> UpdatePlan {
        let mut plan = UpdatePlan::default();
        if prior.name != planned.name {
            plan.recreate_if_changed("name", &prior.name, &planned.name);
            return plan;
        }
        let name = planned.name.as_str();

        if prior.password != planned.password {
            plan.push(AttributeChange::in_place(
                "password",
                vec![statement::set_password(name, &planned.password)],
            ));
        }

        if planned.admin && !prior.admin {
            plan.push(AttributeChange::in_place("admin", vec![statement::grant_admin(name)]));
        }

        let granted = planned
            .grants
            .iter()
            .filter(|g| prior.privilege_on(&g.database) != Some(g.privilege))
            .map(|g| statement::grant(name, g));
        let revoked = prior
            .grants
            .iter()
            .filter(|g| planned.privilege_on(&g.database).is_none())
            .map(|g| statement::revoke(name, &g.database, g.privilege));
        let grant_statements: Vec<_> = granted.chain(revoked).collect();
        if !grant_statements.is_empty() {
            plan.push(AttributeChange::in_place("grants", grant_statements));
        }

        if prior.admin && !planned.admin {
            plan.push(AttributeChange::in_place("admin", vec![statement::revoke_admin(name)]));
        }
        plan
    }
}
