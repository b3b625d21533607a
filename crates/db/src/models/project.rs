use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::ProjectStatus;
use crate::{entities::project, models::ids};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Client contact not found")]
    ClientNotFound,
    #[error("Template not found")]
    TemplateNotFound,
    #[error("Project name cannot be empty")]
    EmptyName,
}

/// A client engagement. `due_date` is the anchor (meeting) date that task
/// offsets are computed from.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub meeting_type: Option<String>,
    pub template_id: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub meeting_type: Option<String>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
}

impl CreateProject {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    pub meeting_type: Option<String>,
}

impl Project {
    async fn from_model<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Self, DbErr> {
        let client_id = match model.client_id {
            Some(id) => ids::contact_uuid_by_id(db, id).await?,
            None => None,
        };
        let template_id = match model.template_id {
            Some(id) => ids::template_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            client_id,
            due_date: model.due_date,
            status: model.status,
            meeting_type: model.meeting_type,
            template_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> Result<i64, DbErr> {
        let count = project::Entity::find().count(db).await?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .order_by_desc(project::Column::Id)
            .all(db)
            .await?;
        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            projects.push(Self::from_model(db, record).await?);
        }
        Ok(projects)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, ProjectError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(ProjectError::EmptyName);
        }
        let client_row_id = match data.client_id {
            Some(id) => Some(
                ids::contact_id_by_uuid(db, id)
                    .await?
                    .ok_or(ProjectError::ClientNotFound)?,
            ),
            None => None,
        };
        let template_row_id = match data.template_id {
            Some(id) => Some(
                ids::template_id_by_uuid(db, id)
                    .await?
                    .ok_or(ProjectError::TemplateNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            name: Set(name.to_string()),
            description: Set(data.description.clone()),
            client_id: Set(client_row_id),
            due_date: Set(data.due_date),
            status: Set(data.status.clone().unwrap_or_default()),
            meeting_type: Set(data
                .meeting_type
                .as_deref()
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)),
            template_id: Set(template_row_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;

        let mut active: project::ActiveModel = record.into();
        if let Some(name) = payload.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ProjectError::EmptyName);
            }
            active.name = Set(name.to_string());
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if let Some(client_id) = payload.client_id {
            let client_row_id = ids::contact_id_by_uuid(db, client_id)
                .await?
                .ok_or(ProjectError::ClientNotFound)?;
            active.client_id = Set(Some(client_row_id));
        }
        if payload.due_date.is_some() {
            active.due_date = Set(payload.due_date);
        }
        if let Some(status) = payload.status.clone() {
            active.status = Set(status);
        }
        if payload.meeting_type.is_some() {
            active.meeting_type = Set(payload.meeting_type.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Moves the anchor date only; tasks are left alone.
    pub async fn set_due_date<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        due_date: NaiveDate,
    ) -> Result<Self, ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let mut active: project::ActiveModel = record.into();
        active.due_date = Set(Some(due_date));
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = project::Entity::delete_many()
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
