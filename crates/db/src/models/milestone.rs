use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::milestone, models::ids};

#[derive(Debug, Error)]
pub enum MilestoneError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Milestone not found")]
    MilestoneNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Template not found")]
    TemplateNotFound,
    #[error("A milestone belongs to exactly one template or one project")]
    InvalidOwner,
    #[error("Milestone title cannot be empty")]
    EmptyTitle,
}

/// A named group of tasks. Template milestones are blueprints; project
/// milestones are the instances created from them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub sort_order: i32,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateMilestone {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl CreateMilestone {
    pub fn for_project(project_id: Uuid, title: &str, sort_order: Option<i32>) -> Self {
        Self {
            project_id: Some(project_id),
            template_id: None,
            title: title.to_string(),
            description: None,
            sort_order,
        }
    }

    pub fn for_template(template_id: Uuid, title: &str, sort_order: Option<i32>) -> Self {
        Self {
            project_id: None,
            template_id: Some(template_id),
            title: title.to_string(),
            description: None,
            sort_order,
        }
    }
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateMilestone {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Clone, Copy)]
enum Owner {
    Project(i64),
    Template(i64),
}

impl Milestone {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: milestone::Model,
    ) -> Result<Self, DbErr> {
        let project_id = match model.project_id {
            Some(id) => ids::project_uuid_by_id(db, id).await?,
            None => None,
        };
        let template_id = match model.template_id {
            Some(id) => ids::template_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            project_id,
            template_id,
            title: model.title,
            description: model.description,
            sort_order: model.sort_order,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<milestone::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut milestones = Vec::with_capacity(models.len());
        for model in models {
            milestones.push(Self::from_model(db, model).await?);
        }
        Ok(milestones)
    }

    pub async fn find_by_template<C: ConnectionTrait>(
        db: &C,
        template_id: Uuid,
    ) -> Result<Vec<Self>, MilestoneError> {
        let template_row_id = ids::template_id_by_uuid(db, template_id)
            .await?
            .ok_or(MilestoneError::TemplateNotFound)?;
        let records = milestone::Entity::find()
            .filter(milestone::Column::TemplateId.eq(template_row_id))
            .order_by_asc(milestone::Column::SortOrder)
            .order_by_asc(milestone::Column::Id)
            .all(db)
            .await?;
        Ok(Self::from_models(db, records).await?)
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Self>, MilestoneError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(MilestoneError::ProjectNotFound)?;
        let records = milestone::Entity::find()
            .filter(milestone::Column::ProjectId.eq(project_row_id))
            .order_by_asc(milestone::Column::SortOrder)
            .order_by_asc(milestone::Column::Id)
            .all(db)
            .await?;
        Ok(Self::from_models(db, records).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = milestone::Entity::find()
            .filter(milestone::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Creates a milestone under exactly one owner. A missing `sort_order`
    /// appends after the owner's existing milestones.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateMilestone,
        milestone_id: Uuid,
    ) -> Result<Self, MilestoneError> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(MilestoneError::EmptyTitle);
        }

        let owner = match (data.project_id, data.template_id) {
            (Some(project_id), None) => Owner::Project(
                ids::project_id_by_uuid(db, project_id)
                    .await?
                    .ok_or(MilestoneError::ProjectNotFound)?,
            ),
            (None, Some(template_id)) => Owner::Template(
                ids::template_id_by_uuid(db, template_id)
                    .await?
                    .ok_or(MilestoneError::TemplateNotFound)?,
            ),
            _ => return Err(MilestoneError::InvalidOwner),
        };

        let (project_row_id, template_row_id) = match owner {
            Owner::Project(id) => (Some(id), None),
            Owner::Template(id) => (None, Some(id)),
        };

        let sort_order = match data.sort_order {
            Some(sort_order) => sort_order,
            None => {
                let existing = match owner {
                    Owner::Project(id) => milestone::Entity::find()
                        .filter(milestone::Column::ProjectId.eq(id))
                        .count(db)
                        .await?,
                    Owner::Template(id) => milestone::Entity::find()
                        .filter(milestone::Column::TemplateId.eq(id))
                        .count(db)
                        .await?,
                };
                i32::try_from(existing).unwrap_or(i32::MAX)
            }
        };

        let now = Utc::now();
        let active = milestone::ActiveModel {
            uuid: Set(milestone_id),
            project_id: Set(project_row_id),
            template_id: Set(template_row_id),
            title: Set(title.to_string()),
            description: Set(data.description.clone()),
            sort_order: Set(sort_order),
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
        payload: &UpdateMilestone,
    ) -> Result<Self, MilestoneError> {
        let record = milestone::Entity::find()
            .filter(milestone::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(MilestoneError::MilestoneNotFound)?;

        let mut active: milestone::ActiveModel = record.into();
        if let Some(title) = payload.title.as_deref() {
            let title = title.trim();
            if title.is_empty() {
                return Err(MilestoneError::EmptyTitle);
            }
            active.title = Set(title.to_string());
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if let Some(sort_order) = payload.sort_order {
            active.sort_order = Set(sort_order);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = milestone::Entity::delete_many()
            .filter(milestone::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
