use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    milestone::{CreateMilestone, Milestone},
    project_template::{
        CreateProjectTemplate, ProjectTemplate, TemplateError, UpdateProjectTemplate,
    },
    template_task::{CreateTemplateTask, TemplateTask, UpdateTemplateTask},
};
use deployment::Deployment;
use services::services::template::TemplateDetails;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{load_template_middleware, load_template_task_middleware},
};

pub async fn get_templates(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectTemplate>>>, ApiError> {
    let templates = ProjectTemplate::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(templates)))
}

pub async fn create_template(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateProjectTemplate>,
) -> Result<ResponseJson<ApiResponse<ProjectTemplate>>, ApiError> {
    let template =
        ProjectTemplate::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    tracing::info!(template_id = %template.id, "Created project template");
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn get_template(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<TemplateDetails>>, ApiError> {
    let details = deployment
        .templates()
        .details(&deployment.db().pool, template.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_template(
    Extension(existing): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProjectTemplate>,
) -> Result<ResponseJson<ApiResponse<ProjectTemplate>>, ApiError> {
    let template = ProjectTemplate::update(&deployment.db().pool, existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

pub async fn delete_template(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = ProjectTemplate::delete(&deployment.db().pool, template.id).await?;
    if rows_affected == 0 {
        Err(TemplateError::TemplateNotFound.into())
    } else {
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

pub async fn copy_template(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<TemplateDetails>>, ApiError> {
    let copy = deployment
        .templates()
        .copy_template(&deployment.db().pool, template.id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(copy)))
}

pub async fn get_template_milestones(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Milestone>>>, ApiError> {
    let milestones = Milestone::find_by_template(&deployment.db().pool, template.id).await?;
    Ok(ResponseJson(ApiResponse::success(milestones)))
}

pub async fn create_template_milestone(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateMilestone>,
) -> Result<ResponseJson<ApiResponse<Milestone>>, ApiError> {
    let data = CreateMilestone {
        project_id: None,
        template_id: Some(template.id),
        ..payload
    };
    let milestone = Milestone::create(&deployment.db().pool, &data, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(milestone)))
}

pub async fn get_template_tasks(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<TemplateTask>>>, ApiError> {
    let tasks = TemplateTask::find_by_template(&deployment.db().pool, template.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn create_template_task(
    Extension(template): Extension<ProjectTemplate>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTemplateTask>,
) -> Result<ResponseJson<ApiResponse<TemplateTask>>, ApiError> {
    let task =
        TemplateTask::create(&deployment.db().pool, template.id, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_template_task(
    Extension(existing): Extension<TemplateTask>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateTemplateTask>,
) -> Result<ResponseJson<ApiResponse<TemplateTask>>, ApiError> {
    let task = TemplateTask::update(&deployment.db().pool, existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_template_task(
    Extension(task): Extension<TemplateTask>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = TemplateTask::delete(&deployment.db().pool, task.id).await?;
    if rows_affected == 0 {
        Err(TemplateError::TemplateTaskNotFound.into())
    } else {
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let template_id_router = Router::new()
        .route(
            "/",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route("/copy", post(copy_template))
        .route(
            "/milestones",
            get(get_template_milestones).post(create_template_milestone),
        )
        .route(
            "/tasks",
            get(get_template_tasks).post(create_template_task),
        )
        .layer(from_fn_with_state(
            deployment.clone(),
            load_template_middleware::<DeploymentImpl>,
        ));

    let templates_router = Router::new()
        .route("/", get(get_templates).post(create_template))
        .nest("/{template_id}", template_id_router);

    let template_task_router = Router::new()
        .route("/", put(update_template_task).delete(delete_template_task))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_template_task_middleware::<DeploymentImpl>,
        ));

    Router::new()
        .nest("/templates", templates_router)
        .nest("/template-tasks/{template_task_id}", template_task_router)
}
