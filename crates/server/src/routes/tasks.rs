use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{CreateTask, Task, TaskError, UpdateTask};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_task_middleware};

/// Mention and assignment notifications are a side effect of task writes; a
/// failure here is logged and never fails the write itself.
async fn send_task_notifications(
    deployment: &DeploymentImpl,
    task: &Task,
    previous_description: Option<&str>,
    previous_assignees: &[Uuid],
) {
    let pool = &deployment.db().pool;
    let notifications = deployment.notifications();

    if let Err(e) = notifications
        .notify_mentions(pool, task, previous_description)
        .await
    {
        tracing::warn!(task_id = %task.id, "Failed to create mention notifications: {}", e);
    }
    if let Err(e) = notifications
        .notify_assignment(pool, task, previous_assignees)
        .await
    {
        tracing::warn!(task_id = %task.id, "Failed to create assignment notifications: {}", e);
    }
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    tracing::debug!(
        "Creating task '{}' in project {}",
        payload.title,
        payload.project_id
    );

    let task = Task::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    send_task_notifications(&deployment, &task, None, &[]).await;

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    Extension(existing_task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update(&deployment.db().pool, existing_task.id, &payload).await?;
    send_task_notifications(
        &deployment,
        &task,
        existing_task.description.as_deref(),
        &existing_task.assigned_contact_ids,
    )
    .await;

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Task::delete(&deployment.db().pool, task.id).await?;
    if rows_affected == 0 {
        return Err(TaskError::TaskNotFound.into());
    }
    tracing::info!(task_id = %task.id, project_id = %task.project_id, "Deleted task");

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_task_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", post(create_task))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}

#[cfg(test)]
mod tests {
    use db::models::{
        contact::{Contact, CreateContact},
        notification::{Notification, NotificationKind},
        project::{CreateProject, Project},
    };

    use super::*;
    use crate::test_support::{TestEnvGuard, test_deployment};

    async fn setup_deployment() -> (TestEnvGuard, DeploymentImpl, Project) {
        let (env_guard, deployment) = test_deployment().await;
        let project = Project::create(
            &deployment.db().pool,
            &CreateProject::named("Estate plan"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        (env_guard, deployment, project)
    }

    #[tokio::test]
    async fn create_task_notifies_mentioned_and_assigned_contacts() {
        let (_env_guard, deployment, project) = setup_deployment().await;
        let pool = &deployment.db().pool;
        let alice = Contact::create(
            pool,
            &CreateContact::team_member("Alice", "Lawson", "estate_attorney"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let bob = Contact::create(
            pool,
            &CreateContact::team_member("Bob", "Reyes", "paralegal"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let payload = CreateTask {
            description: Some("@alice please review the draft".to_string()),
            assigned_contact_ids: vec![bob.id],
            ..CreateTask::from_title(project.id, "Draft will".to_string())
        };
        let task = create_task(State(deployment.clone()), Json(payload))
            .await
            .unwrap()
            .0
            .into_data()
            .unwrap();

        let alice_inbox = Notification::find_for_recipient(pool, alice.id, false)
            .await
            .unwrap();
        assert_eq!(alice_inbox.len(), 1);
        assert_eq!(alice_inbox[0].kind, NotificationKind::Mention);
        assert_eq!(alice_inbox[0].task_id, Some(task.id));

        let bob_inbox = Notification::find_for_recipient(pool, bob.id, false)
            .await
            .unwrap();
        assert_eq!(bob_inbox.len(), 1);
        assert_eq!(bob_inbox[0].kind, NotificationKind::TaskAssigned);
    }

    #[tokio::test]
    async fn update_task_only_notifies_new_mentions() {
        let (_env_guard, deployment, project) = setup_deployment().await;
        let pool = &deployment.db().pool;
        let alice = Contact::create(
            pool,
            &CreateContact::team_member("Alice", "Lawson", "estate_attorney"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let task = Task::create(
            pool,
            &CreateTask {
                description: Some("cc @alice".to_string()),
                ..CreateTask::from_title(project.id, "Fund trust".to_string())
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        update_task(
            Extension(task.clone()),
            State(deployment.clone()),
            Json(UpdateTask {
                description: Some("cc @alice, now with notes".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        let inbox = Notification::find_for_recipient(pool, alice.id, false)
            .await
            .unwrap();
        assert!(inbox.is_empty());
    }

    #[tokio::test]
    async fn delete_task_removes_it() {
        let (_env_guard, deployment, project) = setup_deployment().await;
        let task = Task::create(
            &deployment.db().pool,
            &CreateTask::from_title(project.id, "Temporary".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        delete_task(Extension(task.clone()), State(deployment.clone()))
            .await
            .unwrap();
        assert!(
            Task::find_by_id(&deployment.db().pool, task.id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
