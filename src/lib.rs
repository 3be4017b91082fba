use axum::Router;
use axum::extract::State;
use std::sync::Arc;

pub mod api;
pub mod app_env;
pub mod domain;
pub mod dto;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod routing_utils;

#[cfg(test)]
mod integration_test;

/// Application state shared by every request handler
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
}

/// Extractor alias for the application state
pub type AppState = State<Arc<SharedData>>;

/// Assembles the complete application router: the task and user APIs, the
/// swagger UI, and the request tracing layer.
pub fn app_router(shared_data: Arc<SharedData>) -> Router {
    let api_routes = Router::new()
        .nest("/tasks", api::task::task_routes())
        .nest("/users", api::user::user_routes())
        .with_state(shared_data);

    logging::attach_tracing_http(
        Router::new()
            .merge(api::swagger_main::build_documentation())
            .merge(api_routes),
    )
}
