use axum::{
    Json, Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::export;
use crate::middleware::require_auth;
use crate::tasks;

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/export.csv", get(export::export_csv))
        .route(
            "/tasks/{task_id}",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
