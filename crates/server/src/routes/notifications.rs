use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::{NaiveDate, Utc};
use db::models::notification::Notification;
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{config::MAX_REMINDER_DAYS_AHEAD, notification::ReminderReport};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub recipient_id: Uuid,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecipientQuery {
    pub recipient_id: Uuid,
}

#[derive(Debug, Serialize, TS)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Deserialize, TS)]
pub struct MarkAllReadRequest {
    pub recipient_id: Uuid,
}

#[derive(Debug, Serialize, TS)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct DueRemindersRequest {
    #[serde(default)]
    pub days_ahead: Option<u32>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub today: Option<NaiveDate>,
}

pub async fn get_notifications(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<NotificationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications = Notification::find_for_recipient(
        &deployment.db().pool,
        query.recipient_id,
        query.unread_only,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn get_unread_count(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<RecipientQuery>,
) -> Result<ResponseJson<ApiResponse<UnreadCount>>, ApiError> {
    let count = Notification::unread_count(&deployment.db().pool, query.recipient_id).await?;
    Ok(ResponseJson(ApiResponse::success(UnreadCount { count })))
}

pub async fn mark_notification_read(
    State(deployment): State<DeploymentImpl>,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    let notification = Notification::mark_read(&deployment.db().pool, notification_id).await?;
    Ok(ResponseJson(ApiResponse::success(notification)))
}

pub async fn mark_all_notifications_read(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<MarkAllReadRequest>,
) -> Result<ResponseJson<ApiResponse<MarkAllReadResponse>>, ApiError> {
    let updated = Notification::mark_all_read(&deployment.db().pool, payload.recipient_id).await?;
    Ok(ResponseJson(ApiResponse::success(MarkAllReadResponse {
        updated,
    })))
}

pub async fn generate_due_reminders(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<DueRemindersRequest>,
) -> Result<ResponseJson<ApiResponse<ReminderReport>>, ApiError> {
    let default_days_ahead = deployment.config().read().await.reminders.default_days_ahead;
    let days_ahead = payload
        .days_ahead
        .unwrap_or(default_days_ahead)
        .min(MAX_REMINDER_DAYS_AHEAD);
    let today = payload.today.unwrap_or_else(|| Utc::now().date_naive());

    let report = deployment
        .notifications()
        .generate_due_reminders(&deployment.db().pool, today, days_ahead)
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", put(mark_all_notifications_read))
        .route("/due-reminders", post(generate_due_reminders))
        .route("/{notification_id}/read", put(mark_notification_read));

    Router::new().nest("/notifications", inner)
}

#[cfg(test)]
mod tests {
    use db::models::{
        contact::{Contact, CreateContact},
        notification::NotificationKind,
        project::{CreateProject, Project},
        task::{CreateTask, Task},
    };

    use super::*;
    use crate::test_support::test_deployment;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn due_reminders_are_generated_once_and_can_be_read() {
        let (_env_guard, deployment) = test_deployment().await;
        let pool = &deployment.db().pool;
        let contact = Contact::create(
            pool,
            &CreateContact::team_member("Dana", "Hale", "financial_advisor"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let project = Project::create(pool, &CreateProject::named("Hale trust"), Uuid::new_v4())
            .await
            .unwrap();
        Task::create(
            pool,
            &CreateTask {
                due_date: Some(ymd(2025, 6, 3)),
                assigned_contact_ids: vec![contact.id],
                ..CreateTask::from_title(project.id, "Review beneficiaries".to_string())
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let request = || DueRemindersRequest {
            days_ahead: Some(3),
            today: Some(ymd(2025, 6, 1)),
        };
        let first = generate_due_reminders(State(deployment.clone()), Json(request()))
            .await
            .unwrap()
            .0
            .into_data()
            .unwrap();
        assert_eq!(first.created, 1);

        let second = generate_due_reminders(State(deployment.clone()), Json(request()))
            .await
            .unwrap()
            .0
            .into_data()
            .unwrap();
        assert_eq!((second.created, second.already_notified), (0, 1));

        let unread = get_notifications(
            State(deployment.clone()),
            Query(NotificationQuery {
                recipient_id: contact.id,
                unread_only: true,
            }),
        )
        .await
        .unwrap()
        .0
        .into_data()
        .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, NotificationKind::DueReminder);

        let read = mark_notification_read(State(deployment.clone()), Path(unread[0].id))
            .await
            .unwrap()
            .0
            .into_data()
            .unwrap();
        assert!(read.is_read);

        let count = get_unread_count(
            State(deployment.clone()),
            Query(RecipientQuery {
                recipient_id: contact.id,
            }),
        )
        .await
        .unwrap()
        .0
        .into_data()
        .unwrap();
        assert_eq!(count.count, 0);
    }

    #[tokio::test]
    async fn unknown_recipient_is_not_found() {
        let (_env_guard, deployment) = test_deployment().await;
        let err = mark_all_notifications_read(
            State(deployment),
            Json(MarkAllReadRequest {
                recipient_id: Uuid::new_v4(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Notification(db::models::notification::NotificationError::RecipientNotFound)
        ));
    }
}
