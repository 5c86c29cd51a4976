//! InfluxDB 资源管理 provider
//!
//! 将声明式配置转换为 InfluxDB 管理语句，包括：
//! - 数据库的创建与删除
//! - 用户、密码、管理员权限与数据库授权
//! - 连续查询的创建、重建与删除

mod connection;
mod executor;
mod handlers;
mod reconciler;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use common::config::{AppConfig, InfluxConfig};
use connection::InfluxConnection;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

pub(crate) const SERVICE_NAME: &str = "provider-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "InfluxDB Provider API",
        version = "0.1.0",
        description = "数据库、用户与连续查询的生命周期协调"
    ),
    paths(
        handlers::create_database,
        handlers::read_database,
        handlers::update_database,
        handlers::delete_database,
        handlers::create_user,
        handlers::read_user,
        handlers::update_user,
        handlers::delete_user,
        handlers::create_continuous_query,
        handlers::read_continuous_query,
        handlers::update_continuous_query,
        handlers::delete_continuous_query,
        handlers::health_check,
    ),
    components(schemas(
        common::models::DatabaseResource,
        common::models::UserResource,
        common::models::Grant,
        common::models::Privilege,
        common::models::ContinuousQueryResource,
        handlers::PlannedChange,
        handlers::HealthResponse,
    )),
    tags(
        (name = "databases", description = "数据库生命周期"),
        (name = "users", description = "用户生命周期"),
        (name = "continuous_queries", description = "连续查询生命周期"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);
    let influx = InfluxConfig::from_env().context("invalid InfluxDB settings")?;

    // 建立共享连接（ping 失败则直接退出）
    let connection = InfluxConnection::configure(
        &influx,
        Duration::from_secs(config.request_timeout_secs),
    )
    .await
    .context("failed to configure InfluxDB connection")?;
    let endpoint = connection.base_url().to_string();

    let state = AppState::new(config.clone(), endpoint, Arc::new(connection));
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
