use sea_orm::{JsonValue, entity::prelude::*};

use crate::types::TaskStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub project_id: i64,
    pub milestone_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: i32,
    pub due_date: Option<Date>,
    pub days_from_meeting: Option<i32>,
    pub assigned_contact_ids: JsonValue,
    pub assigned_roles: JsonValue,
    pub parent_task_id: Option<i64>,
    pub depends_on_task_id: Option<i64>,
    pub sort_order: i32,
    pub level: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
