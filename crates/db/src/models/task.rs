use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::TaskStatus;
use crate::{
    entities::{milestone, task},
    models::{ids, template_task::clamp_priority},
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Milestone not found")]
    MilestoneNotFound,
    #[error("Milestone belongs to a different project")]
    MilestoneProjectMismatch,
    #[error("Parent task not found")]
    ParentNotFound,
    #[error("Parent task belongs to a different project")]
    ParentProjectMismatch,
    #[error("Dependency task not found")]
    DependencyNotFound,
    #[error("Dependency task belongs to a different project")]
    DependencyProjectMismatch,
    #[error("Invalid task: {0}")]
    Validation(String),
}

/// A concrete unit of work inside a project.
///
/// `days_from_meeting` is the offset from the project's anchor date that the
/// due date was derived from. It is what due-date cascades recompute from, so
/// it is never rewritten by a cascade itself.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: i32,
    pub due_date: Option<NaiveDate>,
    pub days_from_meeting: Option<i32>,
    pub assigned_contact_ids: Vec<Uuid>,
    /// Role labels still waiting for a matching contact.
    pub assigned_roles: Vec<String>,
    pub parent_task_id: Option<Uuid>,
    pub depends_on_task_id: Option<Uuid>,
    pub sort_order: i32,
    pub level: i32,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    #[serde(default)]
    pub milestone_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub days_from_meeting: Option<i32>,
    #[serde(default)]
    pub assigned_contact_ids: Vec<Uuid>,
    #[serde(default)]
    pub assigned_roles: Vec<String>,
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    #[serde(default)]
    pub depends_on_task_id: Option<Uuid>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub level: Option<i32>,
}

impl CreateTask {
    pub fn from_title(project_id: Uuid, title: String) -> Self {
        Self {
            project_id,
            title,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub milestone_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<i32>,
    #[serde(default, deserialize_with = "utils::dates::lenient::deserialize")]
    #[ts(type = "string | null")]
    pub due_date: Option<NaiveDate>,
    pub days_from_meeting: Option<i32>,
    pub assigned_contact_ids: Option<Vec<Uuid>>,
    pub assigned_roles: Option<Vec<String>>,
    pub parent_task_id: Option<Uuid>,
    pub depends_on_task_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

fn to_json<T: Serialize>(value: &T) -> Result<JsonValue, DbErr> {
    serde_json::to_value(value).map_err(|err| DbErr::Custom(err.to_string()))
}

fn from_json<T: DeserializeOwned + Default>(value: JsonValue, column: &str, task: Uuid) -> T {
    match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(task_id = %task, column, "Ignoring malformed JSON column: {}", err);
            T::default()
        }
    }
}

/// Trimmed, de-duplicated role labels, first occurrence wins.
pub fn normalize_roles(roles: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .map(|role| role.trim())
        .filter(|role| !role.is_empty())
        .filter(|role| seen.insert(role.to_lowercase()))
        .map(str::to_string)
        .collect()
}

fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

async fn project_task<C: ConnectionTrait>(
    db: &C,
    task_id: Uuid,
) -> Result<Option<task::Model>, DbErr> {
    task::Entity::find()
        .filter(task::Column::Uuid.eq(task_id))
        .one(db)
        .await
}

async fn project_milestone_row_id<C: ConnectionTrait>(
    db: &C,
    project_row_id: i64,
    milestone_id: Uuid,
) -> Result<i64, TaskError> {
    let record = milestone::Entity::find()
        .filter(milestone::Column::Uuid.eq(milestone_id))
        .one(db)
        .await?
        .ok_or(TaskError::MilestoneNotFound)?;
    if record.project_id != Some(project_row_id) {
        return Err(TaskError::MilestoneProjectMismatch);
    }
    Ok(record.id)
}

impl Task {
    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<task::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let task_refs = models
            .iter()
            .flat_map(|m| [m.parent_task_id, m.depends_on_task_id])
            .flatten()
            .collect();
        let milestone_refs = models.iter().filter_map(|m| m.milestone_id).collect();
        let tasks = ids::task_uuids_by_ids(db, task_refs).await?;
        let milestones = ids::milestone_uuids_by_ids(db, milestone_refs).await?;
        let mut projects: HashMap<i64, Uuid> = HashMap::new();

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            let project_id = match projects.get(&model.project_id) {
                Some(uuid) => *uuid,
                None => {
                    let uuid = ids::project_uuid_by_id(db, model.project_id)
                        .await?
                        .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
                    projects.insert(model.project_id, uuid);
                    uuid
                }
            };
            out.push(Self {
                id: model.uuid,
                project_id,
                milestone_id: model.milestone_id.and_then(|id| milestones.get(&id).copied()),
                title: model.title,
                description: model.description,
                status: model.status,
                priority: model.priority,
                due_date: model.due_date,
                days_from_meeting: model.days_from_meeting,
                assigned_contact_ids: from_json(
                    model.assigned_contact_ids,
                    "assigned_contact_ids",
                    model.uuid,
                ),
                assigned_roles: from_json(model.assigned_roles, "assigned_roles", model.uuid),
                parent_task_id: model.parent_task_id.and_then(|id| tasks.get(&id).copied()),
                depends_on_task_id: model
                    .depends_on_task_id
                    .and_then(|id| tasks.get(&id).copied()),
                sort_order: model.sort_order,
                level: model.level,
                created_at: model.created_at.into(),
                updated_at: model.updated_at.into(),
            });
        }
        Ok(out)
    }

    async fn from_model<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        Self::from_models(db, vec![model])
            .await?
            .pop()
            .ok_or(DbErr::RecordNotFound("Task not found".to_string()))
    }

    pub fn has_pending_roles(&self) -> bool {
        !self.assigned_roles.is_empty()
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Self>, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        let records = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .order_by_asc(task::Column::SortOrder)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        Ok(Self::from_models(db, records).await?)
    }

    /// Open tasks with a due date inside `[from, to]`, across all projects.
    pub async fn find_open_due_between<C: ConnectionTrait>(
        db: &C,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::DueDate.gte(from))
            .filter(task::Column::DueDate.lte(to))
            .filter(task::Column::Status.is_not_in([TaskStatus::Completed, TaskStatus::Cancelled]))
            .order_by_asc(task::Column::DueDate)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        Self::from_models(db, records).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        match project_task(db, id).await? {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, TaskError> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(TaskError::Validation("title cannot be empty".to_string()));
        }
        let project_row_id = ids::project_id_by_uuid(db, data.project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;

        let milestone_row_id = match data.milestone_id {
            Some(id) => Some(project_milestone_row_id(db, project_row_id, id).await?),
            None => None,
        };
        let parent = match data.parent_task_id {
            Some(id) => {
                let parent = project_task(db, id)
                    .await?
                    .ok_or(TaskError::ParentNotFound)?;
                if parent.project_id != project_row_id {
                    return Err(TaskError::ParentProjectMismatch);
                }
                Some(parent)
            }
            None => None,
        };
        let dependency_row_id = match data.depends_on_task_id {
            Some(id) => {
                let dependency = project_task(db, id)
                    .await?
                    .ok_or(TaskError::DependencyNotFound)?;
                if dependency.project_id != project_row_id {
                    return Err(TaskError::DependencyProjectMismatch);
                }
                Some(dependency.id)
            }
            None => None,
        };
        let level = data
            .level
            .unwrap_or_else(|| parent.as_ref().map_or(0, |parent| parent.level + 1));

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            project_id: Set(project_row_id),
            milestone_id: Set(milestone_row_id),
            title: Set(title.to_string()),
            description: Set(data.description.clone()),
            status: Set(data.status.clone().unwrap_or_default()),
            priority: Set(clamp_priority(data.priority)),
            due_date: Set(data.due_date),
            days_from_meeting: Set(data.days_from_meeting),
            assigned_contact_ids: Set(to_json(&dedup_ids(&data.assigned_contact_ids))?),
            assigned_roles: Set(to_json(&normalize_roles(&data.assigned_roles))?),
            parent_task_id: Set(parent.map(|parent| parent.id)),
            depends_on_task_id: Set(dependency_row_id),
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
        payload: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = project_task(db, id).await?.ok_or(TaskError::TaskNotFound)?;
        let project_row_id = record.project_id;
        let task_row_id = record.id;

        let mut active: task::ActiveModel = record.into();
        if let Some(milestone_id) = payload.milestone_id {
            active.milestone_id =
                Set(Some(project_milestone_row_id(db, project_row_id, milestone_id).await?));
        }
        if let Some(title) = payload.title.as_deref() {
            let title = title.trim();
            if title.is_empty() {
                return Err(TaskError::Validation("title cannot be empty".to_string()));
            }
            active.title = Set(title.to_string());
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if let Some(status) = payload.status.clone() {
            active.status = Set(status);
        }
        if payload.priority.is_some() {
            active.priority = Set(clamp_priority(payload.priority));
        }
        if payload.due_date.is_some() {
            active.due_date = Set(payload.due_date);
        }
        if payload.days_from_meeting.is_some() {
            active.days_from_meeting = Set(payload.days_from_meeting);
        }
        if let Some(contact_ids) = payload.assigned_contact_ids.as_deref() {
            active.assigned_contact_ids = Set(to_json(&dedup_ids(contact_ids))?);
        }
        if let Some(roles) = payload.assigned_roles.as_deref() {
            active.assigned_roles = Set(to_json(&normalize_roles(roles))?);
        }
        if let Some(parent_id) = payload.parent_task_id {
            let parent = project_task(db, parent_id)
                .await?
                .ok_or(TaskError::ParentNotFound)?;
            if parent.project_id != project_row_id {
                return Err(TaskError::ParentProjectMismatch);
            }
            Self::ensure_not_ancestor(db, task_row_id, &parent).await?;
            active.parent_task_id = Set(Some(parent.id));
            active.level = Set(parent.level + 1);
        }
        if let Some(dependency_id) = payload.depends_on_task_id {
            let dependency = project_task(db, dependency_id)
                .await?
                .ok_or(TaskError::DependencyNotFound)?;
            if dependency.project_id != project_row_id {
                return Err(TaskError::DependencyProjectMismatch);
            }
            if dependency.id == task_row_id {
                return Err(TaskError::Validation(
                    "a task cannot depend on itself".to_string(),
                ));
            }
            active.depends_on_task_id = Set(Some(dependency.id));
        }
        if let Some(sort_order) = payload.sort_order {
            active.sort_order = Set(sort_order);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Rejects re-parenting that would put a task underneath itself.
    async fn ensure_not_ancestor<C: ConnectionTrait>(
        db: &C,
        task_row_id: i64,
        new_parent: &task::Model,
    ) -> Result<(), TaskError> {
        let mut visited = HashSet::new();
        let mut cursor = Some(new_parent.clone());
        while let Some(current) = cursor {
            if current.id == task_row_id {
                return Err(TaskError::Validation(
                    "a task cannot be its own ancestor".to_string(),
                ));
            }
            if !visited.insert(current.id) {
                break;
            }
            cursor = match current.parent_task_id {
                Some(parent_id) => task::Entity::find_by_id(parent_id).one(db).await?,
                None => None,
            };
        }
        Ok(())
    }

    /// Due-date write used by cascades; the stored offset is left as is.
    pub async fn set_due_date<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        due_date: Option<NaiveDate>,
    ) -> Result<(), TaskError> {
        let record = project_task(db, id).await?.ok_or(TaskError::TaskNotFound)?;
        let mut active: task::ActiveModel = record.into();
        active.due_date = Set(due_date);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    pub async fn set_assignment<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        contact_ids: &[Uuid],
        pending_roles: &[String],
    ) -> Result<Self, TaskError> {
        let record = project_task(db, id).await?.ok_or(TaskError::TaskNotFound)?;
        let mut active: task::ActiveModel = record.into();
        active.assigned_contact_ids = Set(to_json(&dedup_ids(contact_ids))?);
        active.assigned_roles = Set(to_json(&normalize_roles(pending_roles))?);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
