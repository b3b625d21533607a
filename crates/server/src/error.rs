use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        contact::ContactError, interaction::InteractionError, milestone::MilestoneError,
        notification::NotificationError, project::ProjectError, project_template::TemplateError,
        task::TaskError,
    },
};
use services::services::{
    due_date_cascade::CascadeError, instantiation::InstantiationError,
    notification::NotificationServiceError, project::ProjectServiceError,
    role_resolver::RoleResolverError, template::TemplateServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Milestone(#[from] MilestoneError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn is_database(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::Database(_)
            | ApiError::Contact(ContactError::Database(_))
            | ApiError::Interaction(InteractionError::Database(_))
            | ApiError::Project(ProjectError::Database(_))
            | ApiError::Template(TemplateError::Database(_))
            | ApiError::Milestone(MilestoneError::Database(_))
            | ApiError::Task(TaskError::Database(_))
            | ApiError::Notification(NotificationError::Database(_))
    )
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Contact(err) => match err {
                ContactError::ContactNotFound => (StatusCode::NOT_FOUND, "ContactError"),
                ContactError::Validation(_) => (StatusCode::BAD_REQUEST, "ContactError"),
                ContactError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ContactError"),
            },
            ApiError::Interaction(err) => match err {
                InteractionError::InteractionNotFound | InteractionError::ContactNotFound => {
                    (StatusCode::NOT_FOUND, "InteractionError")
                }
                InteractionError::ProjectNotFound | InteractionError::EmptySubject => {
                    (StatusCode::BAD_REQUEST, "InteractionError")
                }
                InteractionError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "InteractionError")
                }
            },
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                ProjectError::ClientNotFound
                | ProjectError::TemplateNotFound
                | ProjectError::EmptyName => (StatusCode::BAD_REQUEST, "ProjectError"),
                ProjectError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Template(err) => match err {
                TemplateError::TemplateNotFound | TemplateError::TemplateTaskNotFound => {
                    (StatusCode::NOT_FOUND, "TemplateError")
                }
                TemplateError::MilestoneNotFound
                | TemplateError::CrossTemplateReference(_)
                | TemplateError::Validation(_) => (StatusCode::BAD_REQUEST, "TemplateError"),
                TemplateError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TemplateError")
                }
            },
            ApiError::Milestone(err) => match err {
                MilestoneError::MilestoneNotFound
                | MilestoneError::ProjectNotFound
                | MilestoneError::TemplateNotFound => (StatusCode::NOT_FOUND, "MilestoneError"),
                MilestoneError::InvalidOwner | MilestoneError::EmptyTitle => {
                    (StatusCode::BAD_REQUEST, "MilestoneError")
                }
                MilestoneError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "MilestoneError")
                }
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound | TaskError::ProjectNotFound => {
                    (StatusCode::NOT_FOUND, "TaskError")
                }
                TaskError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
                _ => (StatusCode::BAD_REQUEST, "TaskError"),
            },
            ApiError::Notification(err) => match err {
                NotificationError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "NotificationError")
                }
                _ => (StatusCode::NOT_FOUND, "NotificationError"),
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status();

        // Storage failures never leak driver details to the client.
        let error_message = match &self {
            _ if is_database(&self) && status_code.is_server_error() => {
                "A database error occurred. Please try again.".to_string()
            }
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => {
                msg.clone()
            }
            _ if status_code.is_server_error() => format!("{error_type}: request failed"),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

impl From<ProjectServiceError> for ApiError {
    fn from(err: ProjectServiceError) -> Self {
        match err {
            ProjectServiceError::Database(db_err) => ApiError::Database(db_err),
            ProjectServiceError::Project(proj_err) => ApiError::Project(proj_err),
            ProjectServiceError::Instantiation(inst_err) => ApiError::from(inst_err),
            ProjectServiceError::Cascade(cascade_err) => ApiError::from(cascade_err),
            ProjectServiceError::TemplateNotFound => {
                ApiError::BadRequest("Template not found".to_string())
            }
            ProjectServiceError::MissingAnchorDate => ApiError::BadRequest(
                "A due date is required to create a project from a template".to_string(),
            ),
        }
    }
}

impl From<InstantiationError> for ApiError {
    fn from(err: InstantiationError) -> Self {
        match err {
            InstantiationError::Database(db_err) => ApiError::Database(db_err),
            InstantiationError::TemplateNotFound => {
                ApiError::BadRequest("Template not found".to_string())
            }
            InstantiationError::Template(template_err) => ApiError::Template(template_err),
            InstantiationError::Project(proj_err) => ApiError::Project(proj_err),
            InstantiationError::Milestone(milestone_err) => ApiError::Milestone(milestone_err),
            InstantiationError::Task(task_err) => ApiError::Task(task_err),
            InstantiationError::Roles(roles_err) => ApiError::from(roles_err),
        }
    }
}

impl From<RoleResolverError> for ApiError {
    fn from(err: RoleResolverError) -> Self {
        match err {
            RoleResolverError::Database(db_err) => ApiError::Database(db_err),
            RoleResolverError::Task(task_err) => ApiError::Task(task_err),
        }
    }
}

impl From<TemplateServiceError> for ApiError {
    fn from(err: TemplateServiceError) -> Self {
        match err {
            TemplateServiceError::Database(db_err) => ApiError::Database(db_err),
            TemplateServiceError::Template(template_err) => ApiError::Template(template_err),
            TemplateServiceError::Milestone(milestone_err) => ApiError::Milestone(milestone_err),
        }
    }
}

impl From<CascadeError> for ApiError {
    fn from(err: CascadeError) -> Self {
        match err {
            CascadeError::Database(db_err) => ApiError::Database(db_err),
            CascadeError::Project(proj_err) => ApiError::Project(proj_err),
            CascadeError::Task(task_err) => ApiError::Task(task_err),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(err: NotificationServiceError) -> Self {
        match err {
            NotificationServiceError::Database(db_err) => ApiError::Database(db_err),
            NotificationServiceError::Notification(notification_err) => {
                ApiError::Notification(notification_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn database_failures_are_generic_500s() {
        let response =
            ApiError::Task(TaskError::Database(DbErr::Custom("disk I/O".to_string())))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], serde_json::json!(false));
        let message = json["message"].as_str().unwrap();
        assert!(!message.contains("disk I/O"));
    }

    #[tokio::test]
    async fn missing_anchor_date_is_a_bad_request() {
        let response = ApiError::from(ProjectServiceError::MissingAnchorDate).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["message"].as_str().unwrap().contains("due date"));
    }

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(
            ApiError::Project(ProjectError::ProjectNotFound).status().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Notification(NotificationError::RecipientNotFound)
                .status()
                .0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Task(TaskError::ParentProjectMismatch).status().0,
            StatusCode::BAD_REQUEST
        );
    }
}
