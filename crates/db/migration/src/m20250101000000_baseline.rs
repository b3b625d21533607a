use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Contacts::Table)
                    .col(pk_id_col(manager, Contacts::Id))
                    .col(uuid_col(Contacts::Uuid))
                    .col(ColumnDef::new(Contacts::FirstName).string().not_null())
                    .col(ColumnDef::new(Contacts::LastName).string().not_null())
                    .col(ColumnDef::new(Contacts::Email).string())
                    .col(ColumnDef::new(Contacts::Phone).string())
                    .col(
                        ColumnDef::new(Contacts::ContactType)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("client")),
                    )
                    .col(ColumnDef::new(Contacts::Role).string())
                    .col(
                        ColumnDef::new(Contacts::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(ColumnDef::new(Contacts::Notes).text())
                    .col(timestamp_col(Contacts::CreatedAt))
                    .col(timestamp_col(Contacts::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contacts_uuid")
                    .table(Contacts::Table)
                    .col(Contacts::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contacts_type_status")
                    .table(Contacts::Table)
                    .col(Contacts::ContactType)
                    .col(Contacts::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(ProjectTemplates::Table)
                    .col(pk_id_col(manager, ProjectTemplates::Id))
                    .col(uuid_col(ProjectTemplates::Uuid))
                    .col(ColumnDef::new(ProjectTemplates::Name).string().not_null())
                    .col(ColumnDef::new(ProjectTemplates::Description).text())
                    .col(ColumnDef::new(ProjectTemplates::MeetingType).string())
                    .col(timestamp_col(ProjectTemplates::CreatedAt))
                    .col(timestamp_col(ProjectTemplates::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_project_templates_uuid")
                    .table(ProjectTemplates::Table)
                    .col(ProjectTemplates::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_project_templates_meeting_type")
                    .table(ProjectTemplates::Table)
                    .col(ProjectTemplates::MeetingType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(fk_id_nullable_col(manager, Projects::ClientId))
                    .col(ColumnDef::new(Projects::DueDate).date())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(ColumnDef::new(Projects::MeetingType).string())
                    .col(fk_id_nullable_col(manager, Projects::TemplateId))
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_client_id")
                            .from(Projects::Table, Projects::ClientId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_template_id")
                            .from(Projects::Table, Projects::TemplateId)
                            .to(ProjectTemplates::Table, ProjectTemplates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_projects_uuid")
                    .table(Projects::Table)
                    .col(Projects::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Milestones::Table)
                    .col(pk_id_col(manager, Milestones::Id))
                    .col(uuid_col(Milestones::Uuid))
                    .col(fk_id_nullable_col(manager, Milestones::ProjectId))
                    .col(fk_id_nullable_col(manager, Milestones::TemplateId))
                    .col(ColumnDef::new(Milestones::Title).string().not_null())
                    .col(ColumnDef::new(Milestones::Description).text())
                    .col(
                        ColumnDef::new(Milestones::SortOrder)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(timestamp_col(Milestones::CreatedAt))
                    .col(timestamp_col(Milestones::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestones_project_id")
                            .from(Milestones::Table, Milestones::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestones_template_id")
                            .from(Milestones::Table, Milestones::TemplateId)
                            .to(ProjectTemplates::Table, ProjectTemplates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_milestones_uuid")
                    .table(Milestones::Table)
                    .col(Milestones::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_milestones_project_id")
                    .table(Milestones::Table)
                    .col(Milestones::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_milestones_template_id")
                    .table(Milestones::Table)
                    .col(Milestones::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TemplateTasks::Table)
                    .col(pk_id_col(manager, TemplateTasks::Id))
                    .col(uuid_col(TemplateTasks::Uuid))
                    .col(fk_id_col(manager, TemplateTasks::TemplateId))
                    .col(fk_id_nullable_col(manager, TemplateTasks::MilestoneId))
                    .col(ColumnDef::new(TemplateTasks::Title).string().not_null())
                    .col(ColumnDef::new(TemplateTasks::Description).text())
                    .col(
                        ColumnDef::new(TemplateTasks::Priority)
                            .integer()
                            .not_null()
                            .default(Expr::val(25)),
                    )
                    .col(ColumnDef::new(TemplateTasks::DaysFromMeeting).integer())
                    .col(ColumnDef::new(TemplateTasks::DueDate).date())
                    .col(fk_id_nullable_col(manager, TemplateTasks::DependsOnTaskId))
                    .col(fk_id_nullable_col(manager, TemplateTasks::ParentTaskId))
                    .col(ColumnDef::new(TemplateTasks::AssignedRole).string())
                    .col(fk_id_nullable_col(manager, TemplateTasks::AssignedContactId))
                    .col(
                        ColumnDef::new(TemplateTasks::SortOrder)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(TemplateTasks::Level)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(timestamp_col(TemplateTasks::CreatedAt))
                    .col(timestamp_col(TemplateTasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_tasks_template_id")
                            .from(TemplateTasks::Table, TemplateTasks::TemplateId)
                            .to(ProjectTemplates::Table, ProjectTemplates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_tasks_milestone_id")
                            .from(TemplateTasks::Table, TemplateTasks::MilestoneId)
                            .to(Milestones::Table, Milestones::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_tasks_depends_on_task_id")
                            .from(TemplateTasks::Table, TemplateTasks::DependsOnTaskId)
                            .to(TemplateTasks::Table, TemplateTasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_tasks_parent_task_id")
                            .from(TemplateTasks::Table, TemplateTasks::ParentTaskId)
                            .to(TemplateTasks::Table, TemplateTasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_tasks_assigned_contact_id")
                            .from(TemplateTasks::Table, TemplateTasks::AssignedContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_template_tasks_uuid")
                    .table(TemplateTasks::Table)
                    .col(TemplateTasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_template_tasks_template_id")
                    .table(TemplateTasks::Table)
                    .col(TemplateTasks::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(fk_id_nullable_col(manager, Tasks::MilestoneId))
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("todo")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .integer()
                            .not_null()
                            .default(Expr::val(25)),
                    )
                    .col(ColumnDef::new(Tasks::DueDate).date())
                    .col(ColumnDef::new(Tasks::DaysFromMeeting).integer())
                    .col(ColumnDef::new(Tasks::AssignedContactIds).json().not_null())
                    .col(ColumnDef::new(Tasks::AssignedRoles).json().not_null())
                    .col(fk_id_nullable_col(manager, Tasks::ParentTaskId))
                    .col(fk_id_nullable_col(manager, Tasks::DependsOnTaskId))
                    .col(
                        ColumnDef::new(Tasks::SortOrder)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(Tasks::Level)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project_id")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_milestone_id")
                            .from(Tasks::Table, Tasks::MilestoneId)
                            .to(Milestones::Table, Milestones::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_parent_task_id")
                            .from(Tasks::Table, Tasks::ParentTaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_depends_on_task_id")
                            .from(Tasks::Table, Tasks::DependsOnTaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_project_id")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_due_date")
                    .table(Tasks::Table)
                    .col(Tasks::DueDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Interactions::Table)
                    .col(pk_id_col(manager, Interactions::Id))
                    .col(uuid_col(Interactions::Uuid))
                    .col(fk_id_col(manager, Interactions::ContactId))
                    .col(fk_id_nullable_col(manager, Interactions::ProjectId))
                    .col(ColumnDef::new(Interactions::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Interactions::Direction).string_len(32))
                    .col(ColumnDef::new(Interactions::Subject).string().not_null())
                    .col(ColumnDef::new(Interactions::Body).text())
                    .col(ColumnDef::new(Interactions::OccurredAt).timestamp().not_null())
                    .col(timestamp_col(Interactions::CreatedAt))
                    .col(timestamp_col(Interactions::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_contact_id")
                            .from(Interactions::Table, Interactions::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_interactions_project_id")
                            .from(Interactions::Table, Interactions::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_interactions_uuid")
                    .table(Interactions::Table)
                    .col(Interactions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_interactions_contact_id")
                    .table(Interactions::Table)
                    .col(Interactions::ContactId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Interactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TemplateTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Milestones::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectTemplates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Contacts {
    Table,
    Id,
    Uuid,
    FirstName,
    LastName,
    Email,
    Phone,
    ContactType,
    Role,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProjectTemplates {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    MeetingType,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    ClientId,
    DueDate,
    Status,
    MeetingType,
    TemplateId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Milestones {
    Table,
    Id,
    Uuid,
    ProjectId,
    TemplateId,
    Title,
    Description,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TemplateTasks {
    Table,
    Id,
    Uuid,
    TemplateId,
    MilestoneId,
    Title,
    Description,
    Priority,
    DaysFromMeeting,
    DueDate,
    DependsOnTaskId,
    ParentTaskId,
    AssignedRole,
    AssignedContactId,
    SortOrder,
    Level,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectId,
    MilestoneId,
    Title,
    Description,
    Status,
    Priority,
    DueDate,
    DaysFromMeeting,
    AssignedContactIds,
    AssignedRoles,
    ParentTaskId,
    DependsOnTaskId,
    SortOrder,
    Level,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Interactions {
    Table,
    Id,
    Uuid,
    ContactId,
    ProjectId,
    Kind,
    Direction,
    Subject,
    Body,
    OccurredAt,
    CreatedAt,
    UpdatedAt,
}
