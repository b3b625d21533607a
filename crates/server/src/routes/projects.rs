use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::{
    milestone::{CreateMilestone, Milestone},
    project::{CreateProject, Project, UpdateProject},
    task::Task,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    due_date_cascade::CascadeReport,
    project::ProjectCreation,
    role_resolver::PendingRoleReport,
    task_hierarchy::{TaskNode, build_task_tree},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

#[derive(Debug, Deserialize, TS)]
pub struct UpdateDueDateRequest {
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskTreeQuery {
    pub milestone_id: Option<Uuid>,
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectCreation>>, ApiError> {
    tracing::debug!("Creating project '{}'", payload.name);

    let config = deployment.config_snapshot().await;
    let created = deployment
        .project()
        .create_project(&deployment.db().pool, &config, payload)
        .await?;

    match &created {
        ProjectCreation::Template(report) => tracing::info!(
            project_id = %report.project.id,
            tasks = report.tasks.len(),
            unresolved = report.unresolved.len(),
            pending_roles = report.pending_roles.len(),
            "Created project from template"
        ),
        ProjectCreation::Plain { project } => {
            tracing::info!(project_id = %project.id, "Created project")
        }
    }

    Ok(ResponseJson(ApiResponse::success(created)))
}

pub async fn update_project(
    Extension(existing_project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = deployment
        .project()
        .update_project(&deployment.db().pool, &existing_project, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = deployment
        .project()
        .delete_project(&deployment.db().pool, project.id)
        .await?;

    if rows_affected == 0 {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn update_project_due_date(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateDueDateRequest>,
) -> Result<ResponseJson<ApiResponse<CascadeReport>>, ApiError> {
    let Some(anchor) = payload.due_date else {
        return Err(ApiError::BadRequest(
            "A valid due date is required".to_string(),
        ));
    };

    let report = deployment
        .cascade()
        .update_project_due_date(&deployment.db().pool, project.id, anchor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn get_project_tasks(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_by_project(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_project_task_tree(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<TaskTreeQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskNode>>>, ApiError> {
    let tasks = Task::find_by_project(&deployment.db().pool, project.id).await?;
    let tree = build_task_tree(tasks, query.milestone_id);
    Ok(ResponseJson(ApiResponse::success(tree)))
}

pub async fn get_project_milestones(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Milestone>>>, ApiError> {
    let milestones = Milestone::find_by_project(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(milestones)))
}

pub async fn create_project_milestone(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateMilestone>,
) -> Result<ResponseJson<ApiResponse<Milestone>>, ApiError> {
    let data = CreateMilestone {
        project_id: Some(project.id),
        template_id: None,
        ..payload
    };
    let milestone = Milestone::create(&deployment.db().pool, &data, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(milestone)))
}

pub async fn resolve_project_roles(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<PendingRoleReport>>, ApiError> {
    let config = deployment.config_snapshot().await;
    let report = deployment
        .roles()
        .reresolve_pending(
            &deployment.db().pool,
            project.id,
            &config.roles.placeholder_contacts,
        )
        .await?;
    tracing::info!(
        project_id = %project.id,
        examined = report.examined,
        updated = report.updated,
        "Re-resolved pending roles"
    );
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/update-due-date", put(update_project_due_date))
        .route("/tasks", get(get_project_tasks))
        .route("/tasks/tree", get(get_project_task_tree))
        .route(
            "/milestones",
            get(get_project_milestones).post(create_project_milestone),
        )
        .route("/resolve-roles", post(resolve_project_roles))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<DeploymentImpl>,
        ));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}
