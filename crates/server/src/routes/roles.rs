use axum::{
    Json, Router, extract::State, response::Json as ResponseJson, routing::post,
};
use deployment::Deployment;
use services::services::role_resolver::{ResolveRolesRequest, RoleResolution};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn resolve_roles(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ResolveRolesRequest>,
) -> Result<ResponseJson<ApiResponse<RoleResolution>>, ApiError> {
    let config = deployment.config_snapshot().await;
    let resolution = deployment
        .roles()
        .resolve(
            &deployment.db().pool,
            &payload.roles,
            &config.roles.placeholder_contacts,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(resolution)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/roles/resolve", post(resolve_roles))
}
