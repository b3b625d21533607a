use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, routes};

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .merge(routes::contacts::router(&deployment))
        .merge(routes::templates::router(&deployment))
        .merge(routes::milestones::router(&deployment))
        .merge(routes::projects::router(&deployment))
        .merge(routes::tasks::router(&deployment))
        .merge(routes::roles::router())
        .merge(routes::notifications::router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
