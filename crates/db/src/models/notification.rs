use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::NotificationKind;
use crate::{entities::notification, models::ids};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Notification not found")]
    NotificationNotFound,
    #[error("Recipient not found")]
    RecipientNotFound,
    #[error("Task not found")]
    TaskNotFound,
    #[error("Project not found")]
    ProjectNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub is_read: bool,
    #[ts(type = "Date | null")]
    pub read_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl Notification {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: notification::Model,
    ) -> Result<Self, DbErr> {
        let recipient_id = ids::contact_uuid_by_id(db, model.recipient_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Contact not found".to_string()))?;
        let task_id = match model.task_id {
            Some(id) => ids::task_uuid_by_id(db, id).await?,
            None => None,
        };
        let project_id = match model.project_id {
            Some(id) => ids::project_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            recipient_id,
            kind: model.kind,
            title: model.title,
            message: model.message,
            task_id,
            project_id,
            is_read: model.is_read,
            read_at: model.read_at.map(Into::into),
            created_at: model.created_at.into(),
        })
    }

    async fn recipient_row_id<C: ConnectionTrait>(
        db: &C,
        recipient_id: Uuid,
    ) -> Result<i64, NotificationError> {
        ids::contact_id_by_uuid(db, recipient_id)
            .await?
            .ok_or(NotificationError::RecipientNotFound)
    }

    /// Newest first.
    pub async fn find_for_recipient<C: ConnectionTrait>(
        db: &C,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Self>, NotificationError> {
        let recipient_row_id = Self::recipient_row_id(db, recipient_id).await?;
        let mut query = notification::Entity::find()
            .filter(notification::Column::RecipientId.eq(recipient_row_id));
        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }
        let records = query
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .all(db)
            .await?;

        let mut notifications = Vec::with_capacity(records.len());
        for record in records {
            notifications.push(Self::from_model(db, record).await?);
        }
        Ok(notifications)
    }

    pub async fn unread_count<C: ConnectionTrait>(
        db: &C,
        recipient_id: Uuid,
    ) -> Result<u64, NotificationError> {
        let recipient_row_id = Self::recipient_row_id(db, recipient_id).await?;
        let count = notification::Entity::find()
            .filter(notification::Column::RecipientId.eq(recipient_row_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(db)
            .await?;
        Ok(count)
    }

    /// Whether `recipient` already has a notification of `kind` for `task`.
    pub async fn exists_for_task<C: ConnectionTrait>(
        db: &C,
        recipient_id: Uuid,
        task_id: Uuid,
        kind: NotificationKind,
    ) -> Result<bool, NotificationError> {
        let recipient_row_id = Self::recipient_row_id(db, recipient_id).await?;
        let task_row_id = ids::task_id_by_uuid(db, task_id)
            .await?
            .ok_or(NotificationError::TaskNotFound)?;
        let count = notification::Entity::find()
            .filter(notification::Column::RecipientId.eq(recipient_row_id))
            .filter(notification::Column::TaskId.eq(task_row_id))
            .filter(notification::Column::Kind.eq(kind))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateNotification,
        notification_id: Uuid,
    ) -> Result<Self, NotificationError> {
        let recipient_row_id = Self::recipient_row_id(db, data.recipient_id).await?;
        let task_row_id = match data.task_id {
            Some(id) => Some(
                ids::task_id_by_uuid(db, id)
                    .await?
                    .ok_or(NotificationError::TaskNotFound)?,
            ),
            None => None,
        };
        let project_row_id = match data.project_id {
            Some(id) => Some(
                ids::project_id_by_uuid(db, id)
                    .await?
                    .ok_or(NotificationError::ProjectNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = notification::ActiveModel {
            uuid: Set(notification_id),
            recipient_id: Set(recipient_row_id),
            kind: Set(data.kind.clone()),
            title: Set(data.title.clone()),
            message: Set(data.message.clone()),
            task_id: Set(task_row_id),
            project_id: Set(project_row_id),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    /// Marking an already-read notification keeps its original `read_at`.
    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Self, NotificationError> {
        let record = notification::Entity::find()
            .filter(notification::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(NotificationError::NotificationNotFound)?;
        if record.is_read {
            return Ok(Self::from_model(db, record).await?);
        }

        let now = Utc::now();
        let mut active: notification::ActiveModel = record.into();
        active.is_read = Set(true);
        active.read_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn mark_all_read<C: ConnectionTrait>(
        db: &C,
        recipient_id: Uuid,
    ) -> Result<u64, NotificationError> {
        let recipient_row_id = Self::recipient_row_id(db, recipient_id).await?;
        let now = Utc::now();
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .col_expr(notification::Column::ReadAt, Expr::value(now))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::RecipientId.eq(recipient_row_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
