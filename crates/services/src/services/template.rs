use std::collections::HashMap;

use db::{
    DbErr, DbPool, TransactionTrait,
    models::{
        milestone::{CreateMilestone, Milestone, MilestoneError},
        project_template::{CreateProjectTemplate, ProjectTemplate, TemplateError},
        template_task::{CreateTemplateTask, TemplateTask, UpdateTemplateTask},
    },
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TemplateServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Milestone(#[from] MilestoneError),
}

pub type Result<T> = std::result::Result<T, TemplateServiceError>;

/// A template with its milestones and tasks in display order.
#[derive(Debug, Clone, Serialize, TS)]
pub struct TemplateDetails {
    pub template: ProjectTemplate,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<TemplateTask>,
}

#[derive(Clone, Default)]
pub struct TemplateService;

impl TemplateService {
    pub fn new() -> Self {
        Self
    }

    pub async fn details(&self, pool: &DbPool, template_id: Uuid) -> Result<TemplateDetails> {
        let template = ProjectTemplate::find_by_id(pool, template_id)
            .await?
            .ok_or(TemplateError::TemplateNotFound)?;
        let milestones = Milestone::find_by_template(pool, template_id).await?;
        let tasks = TemplateTask::find_by_template(pool, template_id).await?;
        Ok(TemplateDetails {
            template,
            milestones,
            tasks,
        })
    }

    /// Deep-copies a template. Milestone, parent and dependency references in
    /// the copy point at the copied rows. Runs in one transaction.
    pub async fn copy_template(&self, pool: &DbPool, template_id: Uuid) -> Result<TemplateDetails> {
        let source = self.details(pool, template_id).await?;
        let tx = pool.begin().await?;

        let template = ProjectTemplate::create(
            &tx,
            &CreateProjectTemplate {
                name: format!("{} (Copy)", source.template.name),
                description: source.template.description.clone(),
                meeting_type: source.template.meeting_type.clone(),
            },
            Uuid::new_v4(),
        )
        .await?;

        let mut milestone_ids = HashMap::with_capacity(source.milestones.len());
        for milestone in &source.milestones {
            let copy = Milestone::create(
                &tx,
                &CreateMilestone {
                    description: milestone.description.clone(),
                    ..CreateMilestone::for_template(
                        template.id,
                        &milestone.title,
                        Some(milestone.sort_order),
                    )
                },
                Uuid::new_v4(),
            )
            .await?;
            milestone_ids.insert(milestone.id, copy.id);
        }

        // Rows first, references second: parents and dependencies may appear
        // in any order in the source.
        let mut task_ids = HashMap::with_capacity(source.tasks.len());
        for task in &source.tasks {
            let copy = TemplateTask::create(
                &tx,
                template.id,
                &CreateTemplateTask {
                    milestone_id: task
                        .milestone_id
                        .and_then(|id| milestone_ids.get(&id).copied()),
                    title: task.title.clone(),
                    description: task.description.clone(),
                    priority: Some(task.priority),
                    days_from_meeting: task.days_from_meeting,
                    due_date: task.due_date,
                    depends_on_task_id: None,
                    parent_task_id: None,
                    assigned_role: task.assigned_role.clone(),
                    assigned_contact_id: task.assigned_contact_id,
                    sort_order: Some(task.sort_order),
                    level: Some(task.level),
                },
                Uuid::new_v4(),
            )
            .await?;
            task_ids.insert(task.id, copy.id);
        }

        for task in &source.tasks {
            let parent_task_id = task.parent_task_id.and_then(|id| task_ids.get(&id).copied());
            let depends_on_task_id = task
                .depends_on_task_id
                .and_then(|id| task_ids.get(&id).copied());
            if parent_task_id.is_none() && depends_on_task_id.is_none() {
                continue;
            }
            let Some(copy_id) = task_ids.get(&task.id).copied() else {
                continue;
            };
            TemplateTask::update(
                &tx,
                copy_id,
                &UpdateTemplateTask {
                    parent_task_id,
                    depends_on_task_id,
                    level: Some(task.level),
                    ..Default::default()
                },
            )
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            source_id = %template_id,
            copy_id = %template.id,
            milestones = source.milestones.len(),
            tasks = source.tasks.len(),
            "Copied project template"
        );

        self.details(pool, template.id).await
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn copy_remaps_every_reference() {
        let db = setup_db().await;
        let service = TemplateService::new();
        let template = ProjectTemplate::create(
            &db,
            &CreateProjectTemplate {
                name: "Annual review".to_string(),
                description: Some("Yearly".to_string()),
                meeting_type: Some("review".to_string()),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let milestone = Milestone::create(
            &db,
            &CreateMilestone::for_template(template.id, "Prep", Some(0)),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let parent = TemplateTask::create(
            &db,
            template.id,
            &CreateTemplateTask {
                milestone_id: Some(milestone.id),
                days_from_meeting: Some(-14),
                ..CreateTemplateTask::titled("Gather documents")
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        TemplateTask::create(
            &db,
            template.id,
            &CreateTemplateTask {
                milestone_id: Some(milestone.id),
                parent_task_id: Some(parent.id),
                depends_on_task_id: Some(parent.id),
                sort_order: Some(1),
                ..CreateTemplateTask::titled("Review documents")
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let copy = service.copy_template(&db, template.id).await.unwrap();
        assert_eq!(copy.template.name, "Annual review (Copy)");
        assert_eq!(copy.template.meeting_type.as_deref(), Some("review"));
        assert_eq!(copy.milestones.len(), 1);
        assert_ne!(copy.milestones[0].id, milestone.id);
        assert_eq!(copy.tasks.len(), 2);

        let copied_parent = &copy.tasks[0];
        let copied_child = &copy.tasks[1];
        assert_eq!(copied_parent.title, "Gather documents");
        assert_eq!(copied_parent.days_from_meeting, Some(-14));
        assert_eq!(copied_child.parent_task_id, Some(copied_parent.id));
        assert_eq!(copied_child.depends_on_task_id, Some(copied_parent.id));
        assert_eq!(copied_child.level, 1);
        assert!(
            copy.tasks
                .iter()
                .all(|task| task.milestone_id == Some(copy.milestones[0].id))
        );

        let original = service.details(&db, template.id).await.unwrap();
        assert_eq!(original.tasks.len(), 2);
        assert_eq!(original.tasks[1].parent_task_id, Some(parent.id));
    }

    #[tokio::test]
    async fn details_of_unknown_template_fail() {
        let db = setup_db().await;
        let err = TemplateService::new()
            .details(&db, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TemplateServiceError::Template(TemplateError::TemplateNotFound)
        ));
    }
}
