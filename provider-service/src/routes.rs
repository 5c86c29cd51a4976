//! 路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/databases/create", post(handlers::create_database))
        .route("/api/databases/read", post(handlers::read_database))
        .route("/api/databases/update", post(handlers::update_database))
        .route("/api/databases/delete", post(handlers::delete_database))
        .route("/api/users/create", post(handlers::create_user))
        .route("/api/users/read", post(handlers::read_user))
        .route("/api/users/update", post(handlers::update_user))
        .route("/api/users/delete", post(handlers::delete_user))
        .route("/api/continuous_queries/create", post(handlers::create_continuous_query))
        .route("/api/continuous_queries/read", post(handlers::read_continuous_query))
        .route("/api/continuous_queries/update", post(handlers::update_continuous_query))
        .route("/api/continuous_queries/delete", post(handlers::delete_continuous_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::config::AppConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::reconciler::testing::FakeInflux;

    fn app(fake: &FakeInflux) -> Router {
        let state = AppState::new(
            AppConfig::load_with_service("provider-service"),
            "http://localhost:8086/",
            fake.shared(),
        );
        router().with_state(state)
    }

    async fn call(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_database_lifecycle() {
        let fake = FakeInflux::new();
        let app = app(&fake);
        let db = json!({ "name": "metrics" });

        let (status, body) = call(&app, "/api/databases/create", db.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], db);

        let (_, body) = call(&app, "/api/databases/read", db.clone()).await;
        assert_eq!(body["data"], json!({ "present": true, "state": db }));

        let (status, body) = call(&app, "/api/databases/create", db.clone()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ALREADY_EXISTS");

        for _ in 0..2 {
            let (status, body) = call(&app, "/api/databases/delete", db.clone()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"], true);
        }

        let (_, body) = call(&app, "/api/databases/read", db).await;
        assert_eq!(body["data"], json!({ "present": false }));
    }

    #[tokio::test]
    async fn test_user_update_dry_run_sends_nothing() {
        let fake = FakeInflux::new();
        let app = app(&fake);
        let prior = json!({ "name": "alice", "password": "pw" });
        call(&app, "/api/users/create", prior.clone()).await;
        fake.clear_log();

        let req = json!({
            "prior": prior,
            "planned": { "name": "alice", "password": "secret", "admin": true }
        });
        let (status, body) = call(&app, "/api/users/update?dry_run=true", req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(fake.log().is_empty());
        assert!(body["data"].get("state").is_none());

        let plan = body["data"]["plan"].as_array().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0]["attribute"], "password");
        assert_eq!(plan[0]["statements"][0], r#"SET PASSWORD FOR "alice" = [REDACTED]"#);
        assert_eq!(plan[1]["statements"][0], r#"GRANT ALL PRIVILEGES TO "alice""#);
    }

    #[tokio::test]
    async fn test_continuous_query_update_requires_consent() {
        let fake = FakeInflux::new();
        let app = app(&fake);
        call(&app, "/api/databases/create", json!({ "name": "metrics" })).await;
        let prior = json!({ "name": "cq", "database": "metrics", "query": "SELECT 1" });
        call(&app, "/api/continuous_queries/create", prior.clone()).await;

        let planned = json!({ "name": "cq", "database": "metrics", "query": "SELECT 2" });
        let req = json!({ "prior": prior, "planned": planned });
        let (status, body) = call(&app, "/api/continuous_queries/update", req).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "RECREATE_REQUIRED");

        let req = json!({ "prior": prior, "planned": planned, "allow_recreate": true });
        let (status, body) = call(&app, "/api/continuous_queries/update", req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], planned);
        assert_eq!(body["data"]["plan"][0]["recreate"], true);
    }

    #[tokio::test]
    async fn test_semantic_error_is_passed_through() {
        let fake = FakeInflux::new();
        let app = app(&fake);
        let (status, body) = call(
            &app,
            "/api/continuous_queries/create",
            json!({ "name": "cq", "database": "missing", "query": "SELECT 1" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["message"], "database not found: missing");
    }
}
