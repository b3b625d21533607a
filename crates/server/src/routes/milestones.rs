use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::put,
};
use db::models::milestone::{Milestone, MilestoneError, UpdateMilestone};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_milestone_middleware};

pub async fn update_milestone(
    Extension(existing): Extension<Milestone>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateMilestone>,
) -> Result<ResponseJson<ApiResponse<Milestone>>, ApiError> {
    let milestone = Milestone::update(&deployment.db().pool, existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(milestone)))
}

/// Tasks keep their rows; their milestone reference is cleared by the
/// foreign key.
pub async fn delete_milestone(
    Extension(milestone): Extension<Milestone>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Milestone::delete(&deployment.db().pool, milestone.id).await?;
    if rows_affected == 0 {
        return Err(MilestoneError::MilestoneNotFound.into());
    }
    tracing::info!(milestone_id = %milestone.id, "Deleted milestone");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let milestone_router = Router::new()
        .route("/", put(update_milestone).delete(delete_milestone))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_milestone_middleware::<DeploymentImpl>,
        ));

    Router::new().nest("/milestones/{milestone_id}", milestone_router)
}

#[cfg(test)]
mod tests {
    use db::models::{
        milestone::CreateMilestone,
        project::{CreateProject, Project},
        task::{CreateTask, Task},
    };
    use uuid::Uuid;

    use super::*;
    use crate::test_support::test_deployment;

    #[tokio::test]
    async fn rename_and_delete_project_milestone() {
        let (_env_guard, deployment) = test_deployment().await;
        let pool = &deployment.db().pool;
        let project = Project::create(pool, &CreateProject::named("Trust"), Uuid::new_v4())
            .await
            .unwrap();
        let milestone = Milestone::create(
            pool,
            &CreateMilestone::for_project(project.id, "Drafting", Some(0)),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let task = Task::create(
            pool,
            &CreateTask {
                milestone_id: Some(milestone.id),
                ..CreateTask::from_title(project.id, "Draft trust".to_string())
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let renamed = update_milestone(
            Extension(milestone.clone()),
            State(deployment.clone()),
            Json(UpdateMilestone {
                title: Some("  Signing  ".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap()
        .0
        .into_data()
        .unwrap();
        assert_eq!(renamed.title, "Signing");

        delete_milestone(Extension(renamed), State(deployment.clone()))
            .await
            .unwrap();
        assert!(Milestone::find_by_id(pool, milestone.id).await.unwrap().is_none());
        let task = Task::find_by_id(pool, task.id).await.unwrap().unwrap();
        assert_eq!(task.milestone_id, None);
    }
}
