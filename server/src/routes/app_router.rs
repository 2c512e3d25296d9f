use std::time::Duration;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::{request_tracing, ServerState};

use super::handlers::{meetings, status, tasks, users};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let origins = ["https://localhost:3000", "http://localhost:3000"]
            .into_iter()
            .map(|origin| origin.parse::<HeaderValue>().unwrap())
            .collect::<Vec<_>>();

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);

        let router = Router::new()
            .route("/", get(|| async { "Taskclerk server" }))
            .route("/health", get(status::health))
            .route("/pipeline/status", get(status::pipeline_status))
            .route("/users/me", get(users::me))
            .nest(
                "/tasks",
                Router::new()
                    .route("/", get(tasks::list).post(tasks::create))
                    .route(
                        "/:id",
                        get(tasks::get_by_id)
                            .patch(tasks::update)
                            .delete(tasks::delete),
                    )
                    .with_state(state.clone()),
            )
            .nest(
                "/meetings",
                Router::new()
                    .route("/", get(meetings::list))
                    .route("/stats", get(meetings::stats))
                    .route("/:id", get(meetings::get_by_id))
                    .route("/:id/process", post(meetings::process))
                    .with_state(state.clone()),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(TimeoutLayer::new(Duration::from_secs(30)))
                    .layer(cors_layer),
            )
            .with_state(state.clone())
            .fallback(handler_404);

        let router = request_tracing::with_request_tracing(router);

        #[cfg(debug_assertions)]
        let router = {
            use super::handlers::dev;
            router
                .route("/dev/token", get(dev::dev_token))
                .route(
                    "/dev/users",
                    post(dev::create_user).with_state(state.clone()),
                )
                .route(
                    "/dev/users/:id/credentials",
                    axum::routing::patch(dev::set_credentials).with_state(state),
                )
        };

        router
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
