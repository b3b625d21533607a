use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "template_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub template_id: i64,
    pub milestone_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub days_from_meeting: Option<i32>,
    pub due_date: Option<Date>,
    pub depends_on_task_id: Option<i64>,
    pub parent_task_id: Option<i64>,
    pub assigned_role: Option<String>,
    pub assigned_contact_id: Option<i64>,
    pub sort_order: i32,
    pub level: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
