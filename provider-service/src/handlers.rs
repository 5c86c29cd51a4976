//! Handler模块
//!
//! Each resource kind exposes `create`, `read`, `update` and `delete`. Bodies
//! carry the declared or persisted state; responses carry the observed state
//! the host should persist.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use common::errors::AppError;
use common::models::{
    ContinuousQueryResource, DatabaseResource, ObservedState, UpdateRequest, UserResource,
};
use common::response::ApiResponse;

use crate::reconciler::{AttributeChange, ResourceLifecycle};
use crate::state::AppState;
use crate::SERVICE_NAME;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Update 查询参数
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpdateParams {
    /// Only compute the plan; send nothing to InfluxDB.
    #[serde(default)]
    pub dry_run: bool,
}

/// One planned attribute change.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlannedChange {
    pub attribute: String,
    /// Whether the change replaces the resource.
    pub recreate: bool,
    /// In-place statements, passwords redacted.
    pub statements: Vec<String>,
}

impl From<&AttributeChange> for PlannedChange {
    fn from(change: &AttributeChange) -> Self {
        match change {
            AttributeChange::InPlace {
                attribute,
                statements,
            } => Self {
                attribute: attribute.to_string(),
                recreate: false,
                statements: statements.iter().map(|s| s.to_string()).collect(),
            },
            AttributeChange::RequiresRecreate { attribute } => Self {
                attribute: attribute.to_string(),
                recreate: true,
                statements: vec![],
            },
        }
    }
}

/// Result of an update: the plan, and the observed state unless dry-run.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOutcome<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<T>,
    pub plan: Vec<PlannedChange>,
}

// ============== 通用生命周期处理 ==============

async fn run_create<L>(reconciler: L, declared: L::Resource) -> ApiResult<L::Resource>
where
    L: ResourceLifecycle,
    L::Resource: Serialize,
{
    let observed = reconciler.create(&declared).await?;
    Ok(Json(ApiResponse::ok_with_service(observed, SERVICE_NAME)))
}

async fn run_read<L>(reconciler: L, current: L::Resource) -> ApiResult<ObservedState<L::Resource>>
where
    L: ResourceLifecycle,
    L::Resource: Serialize,
{
    let observed = reconciler.read(&current).await?;
    Ok(Json(ApiResponse::ok_with_service(
        ObservedState::from(observed),
        SERVICE_NAME,
    )))
}

async fn run_update<L>(
    reconciler: L,
    params: UpdateParams,
    req: UpdateRequest<L::Resource>,
) -> ApiResult<UpdateOutcome<L::Resource>>
where
    L: ResourceLifecycle,
    L::Resource: Serialize,
{
    let plan: Vec<PlannedChange> = reconciler
        .plan_update(&req.prior, &req.planned)
        .changes
        .iter()
        .map(PlannedChange::from)
        .collect();

    let state = if params.dry_run {
        None
    } else {
        Some(
            reconciler
                .update(&req.prior, &req.planned, req.allow_recreate)
                .await?,
        )
    };
    Ok(Json(ApiResponse::ok_with_service(
        UpdateOutcome { state, plan },
        SERVICE_NAME,
    )))
}

async fn run_delete<L>(reconciler: L, current: L::Resource) -> ApiResult<bool>
where
    L: ResourceLifecycle,
{
    reconciler.delete(&current).await?;
    Ok(Json(ApiResponse::ok_with_service(true, SERVICE_NAME)))
}

// ============== 数据库 ==============

/// 创建数据库
#[utoipa::path(
    post,
    path = "/api/databases/create",
    tag = "databases",
    request_body = DatabaseResource,
    responses(
        (status = 200, description = "数据库已创建", body = ApiResponse<DatabaseResource>),
        (status = 409, description = "数据库已存在")
    )
)]
pub async fn create_database(
    State(state): State<AppState>,
    Json(declared): Json<DatabaseResource>,
) -> ApiResult<DatabaseResource> {
    run_create(state.databases(), declared).await
}

/// 读取数据库状态
#[utoipa::path(
    post,
    path = "/api/databases/read",
    tag = "databases",
    request_body = DatabaseResource,
    responses(
        (status = 200, description = "观测状态", body = ApiResponse<ObservedState<DatabaseResource>>)
    )
)]
pub async fn read_database(
    State(state): State<AppState>,
    Json(current): Json<DatabaseResource>,
) -> ApiResult<ObservedState<DatabaseResource>> {
    run_read(state.databases(), current).await
}

/// 更新数据库（仅支持重建）
#[utoipa::path(
    post,
    path = "/api/databases/update",
    tag = "databases",
    params(UpdateParams),
    request_body = UpdateRequest<DatabaseResource>,
    responses(
        (status = 200, description = "更新结果", body = ApiResponse<UpdateOutcome<DatabaseResource>>),
        (status = 409, description = "需要重建")
    )
)]
pub async fn update_database(
    State(state): State<AppState>,
    Query(params): Query<UpdateParams>,
    Json(req): Json<UpdateRequest<DatabaseResource>>,
) -> ApiResult<UpdateOutcome<DatabaseResource>> {
    run_update(state.databases(), params, req).await
}

/// 删除数据库
#[utoipa::path(
    post,
    path = "/api/databases/delete",
    tag = "databases",
    request_body = DatabaseResource,
    responses(
        (status = 200, description = "数据库已删除", body = ApiResponse<bool>)
    )
)]
pub async fn delete_database(
    State(state): State<AppState>,
    Json(current): Json<DatabaseResource>,
) -> ApiResult<bool> {
    run_delete(state.databases(), current).await
}

// ============== 用户 ==============

/// 创建用户
#[utoipa::path(
    post,
    path = "/api/users/create",
    tag = "users",
    request_body = UserResource,
    responses(
        (status = 200, description = "用户已创建", body = ApiResponse<UserResource>)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(declared): Json<UserResource>,
) -> ApiResult<UserResource> {
    run_create(state.users(), declared).await
}

/// 读取用户状态
#[utoipa::path(
    post,
    path = "/api/users/read",
    tag = "users",
    request_body = UserResource,
    responses(
        (status = 200, description = "观测状态", body = ApiResponse<ObservedState<UserResource>>)
    )
)]
pub async fn read_user(
    State(state): State<AppState>,
    Json(current): Json<UserResource>,
) -> ApiResult<ObservedState<UserResource>> {
    run_read(state.users(), current).await
}

/// 更新用户（密码、管理员、授权原地修改）
#[utoipa::path(
    post,
    path = "/api/users/update",
    tag = "users",
    params(UpdateParams),
    request_body = UpdateRequest<UserResource>,
    responses(
        (status = 200, description = "更新结果", body = ApiResponse<UpdateOutcome<UserResource>>),
        (status = 409, description = "需要重建")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Query(params): Query<UpdateParams>,
    Json(req): Json<UpdateRequest<UserResource>>,
) -> ApiResult<UpdateOutcome<UserResource>> {
    run_update(state.users(), params, req).await
}

/// 删除用户
#[utoipa::path(
    post,
    path = "/api/users/delete",
    tag = "users",
    request_body = UserResource,
    responses(
        (status = 200, description = "用户已删除", body = ApiResponse<bool>)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Json(current): Json<UserResource>,
) -> ApiResult<bool> {
    run_delete(state.users(), current).await
}

// ============== 连续查询 ==============

/// 创建连续查询
#[utoipa::path(
    post,
    path = "/api/continuous_queries/create",
    tag = "continuous_queries",
    request_body = ContinuousQueryResource,
    responses(
        (status = 200, description = "连续查询已创建", body = ApiResponse<ContinuousQueryResource>),
        (status = 409, description = "连续查询已存在")
    )
)]
pub async fn create_continuous_query(
    State(state): State<AppState>,
    Json(declared): Json<ContinuousQueryResource>,
) -> ApiResult<ContinuousQueryResource> {
    run_create(state.continuous_queries(), declared).await
}

/// 读取连续查询状态
#[utoipa::path(
    post,
    path = "/api/continuous_queries/read",
    tag = "continuous_queries",
    request_body = ContinuousQueryResource,
    responses(
        (status = 200, description = "观测状态", body = ApiResponse<ObservedState<ContinuousQueryResource>>)
    )
)]
pub async fn read_continuous_query(
    State(state): State<AppState>,
    Json(current): Json<ContinuousQueryResource>,
) -> ApiResult<ObservedState<ContinuousQueryResource>> {
    run_read(state.continuous_queries(), current).await
}

/// 更新连续查询（仅支持重建）
#[utoipa::path(
    post,
    path = "/api/continuous_queries/update",
    tag = "continuous_queries",
    params(UpdateParams),
    request_body = UpdateRequest<ContinuousQueryResource>,
    responses(
        (status = 200, description = "更新结果", body = ApiResponse<UpdateOutcome<ContinuousQueryResource>>),
        (status = 409, description = "需要重建")
    )
)]
pub async fn update_continuous_query(
    State(state): State<AppState>,
    Query(params): Query<UpdateParams>,
    Json(req): Json<UpdateRequest<ContinuousQueryResource>>,
) -> ApiResult<UpdateOutcome<ContinuousQueryResource>> {
    run_update(state.continuous_queries(), params, req).await
}

/// 删除连续查询
#[utoipa::path(
    post,
    path = "/api/continuous_queries/delete",
    tag = "continuous_queries",
    request_body = ContinuousQueryResource,
    responses(
        (status = 200, description = "连续查询已删除", body = ApiResponse<bool>)
    )
)]
pub async fn delete_continuous_query(
    State(state): State<AppState>,
    Json(current): Json<ContinuousQueryResource>,
) -> ApiResult<bool> {
    run_delete(state.continuous_queries(), current).await
}

// ============== 健康检查 ==============

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoint: state.endpoint.clone(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// InfluxDB endpoint this provider manages.
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
}
