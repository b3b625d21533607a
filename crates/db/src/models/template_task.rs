use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use super::project_template::TemplateError;
use crate::{
    entities::{milestone, template_task},
    models::ids,
};

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 50;
pub const DEFAULT_PRIORITY: i32 = 25;

pub fn clamp_priority(priority: Option<i32>) -> i32 {
    priority
        .unwrap_or(DEFAULT_PRIORITY)
        .clamp(MIN_PRIORITY, MAX_PRIORITY)
}

/// Blueprint task inside a template. `days_from_meeting` is relative to the
/// anchor date the template is instantiated against.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TemplateTask {
    pub id: Uuid,
    pub template_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub days_from_meeting: Option<i32>,
    pub due_date: Option<NaiveDate>,
    pub depends_on_task_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub assigned_role: Option<String>,
    pub assigned_contact_id: Option<Uuid>,
    pub sort_order: i32,
    pub level: i32,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct CreateTemplateTask {
    #[serde(default)]
    pub milestone_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub days_from_meeting: Option<i32>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub depends_on_task_id: Option<Uuid>,
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    #[serde(default)]
    pub assigned_role: Option<String>,
    #[serde(default)]
    pub assigned_contact_id: Option<Uuid>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub level: Option<i32>,
}

impl CreateTemplateTask {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateTemplateTask {
    pub milestone_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub days_from_meeting: Option<i32>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    pub depends_on_task_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub assigned_role: Option<String>,
    pub assigned_contact_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    pub level: Option<i32>,
}

/// Row id of a sibling template task, rejected when it lives in another template.
async fn same_template_task<C: ConnectionTrait>(
    db: &C,
    template_row_id: i64,
    task_id: Uuid,
    what: &'static str,
) -> Result<template_task::Model, TemplateError> {
    let record = template_task::Entity::find()
        .filter(template_task::Column::Uuid.eq(task_id))
        .one(db)
        .await?
        .ok_or(TemplateError::TemplateTaskNotFound)?;
    if record.template_id != template_row_id {
        return Err(TemplateError::CrossTemplateReference(what));
    }
    Ok(record)
}

async fn same_template_milestone<C: ConnectionTrait>(
    db: &C,
    template_row_id: i64,
    milestone_id: Uuid,
) -> Result<i64, TemplateError> {
    let record = milestone::Entity::find()
        .filter(milestone::Column::Uuid.eq(milestone_id))
        .one(db)
        .await?
        .ok_or(TemplateError::MilestoneNotFound)?;
    if record.template_id != Some(template_row_id) {
        return Err(TemplateError::CrossTemplateReference("milestone"));
    }
    Ok(record.id)
}

async fn optional_contact_row_id<C: ConnectionTrait>(
    db: &C,
    contact_id: Option<Uuid>,
) -> Result<Option<i64>, TemplateError> {
    match contact_id {
        Some(id) => Ok(Some(ids::contact_id_by_uuid(db, id).await?.ok_or_else(
            || TemplateError::Validation(format!("contact {id} does not exist")),
        )?)),
        None => Ok(None),
    }
}

impl TemplateTask {
    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<template_task::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(first_template_row_id) = models.first().map(|m| m.template_id) else {
            return Ok(Vec::new());
        };
        let template_uuid = ids::template_uuid_by_id(db, first_template_row_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Template not found".to_string()))?;

        let task_refs = models
            .iter()
            .flat_map(|m| [m.parent_task_id, m.depends_on_task_id])
            .flatten()
            .collect();
        let milestone_refs = models.iter().filter_map(|m| m.milestone_id).collect();
        let contact_refs = models.iter().filter_map(|m| m.assigned_contact_id).collect();

        let tasks = ids::template_task_uuids_by_ids(db, task_refs).await?;
        let milestones = ids::milestone_uuids_by_ids(db, milestone_refs).await?;
        let contacts = ids::contact_uuids_by_ids(db, contact_refs).await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            let template_id = if model.template_id == first_template_row_id {
                template_uuid
            } else {
                ids::template_uuid_by_id(db, model.template_id)
                    .await?
                    .ok_or(DbErr::RecordNotFound("Template not found".to_string()))?
            };
            out.push(Self {
                id: model.uuid,
                template_id,
                milestone_id: model.milestone_id.and_then(|id| milestones.get(&id).copied()),
                title: model.title,
                description: model.description,
                priority: model.priority,
                days_from_meeting: model.days_from_meeting,
                due_date: model.due_date,
                depends_on_task_id: model
                    .depends_on_task_id
                    .and_then(|id| tasks.get(&id).copied()),
                parent_task_id: model.parent_task_id.and_then(|id| tasks.get(&id).copied()),
                assigned_role: model.assigned_role,
                assigned_contact_id: model
                    .assigned_contact_id
                    .and_then(|id| contacts.get(&id).copied()),
                sort_order: model.sort_order,
                level: model.level,
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            });
        }
        Ok(out)
    }

    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: template_task::Model,
    ) -> Result<Self, DbErr> {
        Self::from_models(db, vec![model])
            .await?
            .pop()
            .ok_or(DbErr::RecordNotFound("Template task not found".to_string()))
    }

    /// Ordered by sort position, then insertion order.
    pub async fn find_by_template<C: ConnectionTrait>(
        db: &C,
        template_id: Uuid,
    ) -> Result<Vec<Self>, TemplateError> {
        let template_row_id = ids::template_id_by_uuid(db, template_id)
            .await?
            .ok_or(TemplateError::TemplateNotFound)?;
        let records = template_task::Entity::find()
            .filter(template_task::Column::TemplateId.eq(template_row_id))
            .order_by_asc(template_task::Column::SortOrder)
            .order_by_asc(template_task::Column::Id)
            .all(db)
            .await?;
        Ok(Self::from_models(db, records).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = template_task::Entity::find()
            .filter(template_task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        template_id: Uuid,
        data: &CreateTemplateTask,
        task_id: Uuid,
    ) -> Result<Self, TemplateError> {
        let template_row_id = ids::template_id_by_uuid(db, template_id)
            .await?
            .ok_or(TemplateError::TemplateNotFound)?;

        let milestone_row_id = match data.milestone_id {
            Some(id) => Some(same_template_milestone(db, template_row_id, id).await?),
            None => None,
        };
        let parent = match data.parent_task_id {
            Some(id) => Some(same_template_task(db, template_row_id, id, "parent task").await?),
            None => None,
        };
        let dependency_row_id = match data.depends_on_task_id {
            Some(id) => Some(
                same_template_task(db, template_row_id, id, "dependency")
                    .await?
                    .id,
            ),
            None => None,
        };
        let contact_row_id = optional_contact_row_id(db, data.assigned_contact_id).await?;
        let level = data
            .level
            .unwrap_or_else(|| parent.as_ref().map_or(0, |parent| parent.level + 1));

        let now = Utc::now();
        let active = template_task::ActiveModel {
            uuid: Set(task_id),
            template_id: Set(template_row_id),
            milestone_id: Set(milestone_row_id),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            priority: Set(clamp_priority(data.priority)),
            days_from_meeting: Set(data.days_from_meeting),
            due_date: Set(data.due_date),
            depends_on_task_id: Set(dependency_row_id),
            parent_task_id: Set(parent.map(|parent| parent.id)),
            assigned_role: Set(data.assigned_role.clone()),
            assigned_contact_id: Set(contact_row_id),
            sort_order: Set(data.sort_order.unwrap_or(0)),
            level: Set(level),
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
        payload: &UpdateTemplateTask,
    ) -> Result<Self, TemplateError> {
        let record = template_task::Entity::find()
            .filter(template_task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TemplateError::TemplateTaskNotFound)?;
        let template_row_id = record.template_id;

        if payload.parent_task_id == Some(id) || payload.depends_on_task_id == Some(id) {
            return Err(TemplateError::Validation(
                "a template task cannot reference itself".to_string(),
            ));
        }

        let mut active: template_task::ActiveModel = record.into();
        if let Some(milestone_id) = payload.milestone_id {
            active.milestone_id =
                Set(Some(same_template_milestone(db, template_row_id, milestone_id).await?));
        }
        if let Some(title) = payload.title.clone() {
            active.title = Set(title);
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if payload.priority.is_some() {
            active.priority = Set(clamp_priority(payload.priority));
        }
        if payload.days_from_meeting.is_some() {
            active.days_from_meeting = Set(payload.days_from_meeting);
        }
        if payload.due_date.is_some() {
            active.due_date = Set(payload.due_date);
        }
        if let Some(parent_id) = payload.parent_task_id {
            let parent = same_template_task(db, template_row_id, parent_id, "parent task").await?;
            active.parent_task_id = Set(Some(parent.id));
            if payload.level.is_none() {
                active.level = Set(parent.level + 1);
            }
        }
        if let Some(dependency_id) = payload.depends_on_task_id {
            let dependency =
                same_template_task(db, template_row_id, dependency_id, "dependency").await?;
            active.depends_on_task_id = Set(Some(dependency.id));
        }
        if payload.assigned_role.is_some() {
            active.assigned_role = Set(payload.assigned_role.clone());
        }
        if payload.assigned_contact_id.is_some() {
            active.assigned_contact_id =
                Set(optional_contact_row_id(db, payload.assigned_contact_id).await?);
        }
        if let Some(sort_order) = payload.sort_order {
            active.sort_order = Set(sort_order);
        }
        if let Some(level) = payload.level {
            active.level = Set(level);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = template_task::Entity::delete_many()
            .filter(template_task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
