use chrono::NaiveDate;
use db::{
    DbErr, DbPool,
    models::{
        project::{Project, ProjectError},
        task::{Task, TaskError},
    },
};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utils::dates::add_days;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, CascadeError>;

#[derive(Debug, Clone, Serialize, TS)]
pub struct CascadeReport {
    pub project: Project,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// New due date for a task that was scheduled `offset` days from the anchor.
pub fn recompute_due_date(anchor: NaiveDate, offset: Option<i32>) -> Option<NaiveDate> {
    offset.and_then(|days| add_days(anchor, i64::from(days)))
}

#[derive(Clone, Default)]
pub struct DueDateCascadeService;

impl DueDateCascadeService {
    pub fn new() -> Self {
        Self
    }

    /// Moves the project's anchor date and reschedules every task that carries
    /// a days-from-meeting offset. Dates are always derived from the stored
    /// offset, never from the task's current due date. Task writes run
    /// concurrently and independently; one failing does not undo the others.
    pub async fn update_project_due_date(
        &self,
        pool: &DbPool,
        project_id: Uuid,
        anchor: NaiveDate,
    ) -> Result<CascadeReport> {
        let project = Project::set_due_date(pool, project_id, anchor).await?;
        let tasks = Task::find_by_project(pool, project_id).await?;

        let mut skipped = 0;
        let mut updates = Vec::new();
        for task in &tasks {
            match recompute_due_date(anchor, task.days_from_meeting) {
                Some(due_date) if task.due_date == Some(due_date) => skipped += 1,
                Some(due_date) => updates.push(async move {
                    let result = Task::set_due_date(pool, task.id, Some(due_date)).await;
                    (task.id, result)
                }),
                None => skipped += 1,
            }
        }

        let mut updated = 0;
        let mut failed = 0;
        for (task_id, result) in join_all(updates).await {
            match result {
                Ok(()) => updated += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        project_id = %project_id,
                        task_id = %task_id,
                        "Failed to reschedule task: {}",
                        e
                    );
                }
            }
        }

        tracing::info!(
            project_id = %project_id,
            %anchor,
            updated,
            skipped,
            failed,
            "Cascaded project due date"
        );

        Ok(CascadeReport {
            project,
            updated,
            skipped,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        project::CreateProject,
        task::{CreateTask, UpdateTask},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[test]
    fn recompute_uses_offset_only() {
        assert_eq!(
            recompute_due_date(ymd(2025, 6, 1), Some(-10)),
            Some(ymd(2025, 5, 22))
        );
        assert_eq!(recompute_due_date(ymd(2025, 6, 1), None), None);
    }

    #[tokio::test]
    async fn repeated_cascades_do_not_drift() {
        let db = setup_db().await;
        let service = DueDateCascadeService::new();
        let project = Project::create(
            &db,
            &CreateProject {
                due_date: Some(ymd(2025, 6, 1)),
                ..CreateProject::named("Cascade")
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let offset_task = Task::create(
            &db,
            &CreateTask {
                due_date: Some(ymd(2025, 5, 22)),
                days_from_meeting: Some(-10),
                ..CreateTask::from_title(project.id, "Submit Report".to_string())
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let fixed_task = Task::create(
            &db,
            &CreateTask {
                due_date: Some(ymd(2025, 1, 1)),
                ..CreateTask::from_title(project.id, "Fixed".to_string())
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        // A manual edit of the due date must not influence later cascades.
        Task::update(
            &db,
            offset_task.id,
            &UpdateTask {
                due_date: Some(ymd(2025, 3, 3)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let first = service
            .update_project_due_date(&db, project.id, ymd(2025, 7, 1))
            .await
            .unwrap();
        assert_eq!(first.project.due_date, Some(ymd(2025, 7, 1)));
        assert_eq!((first.updated, first.skipped, first.failed), (1, 1, 0));

        let second = service
            .update_project_due_date(&db, project.id, ymd(2025, 9, 15))
            .await
            .unwrap();
        assert_eq!(second.updated, 1);

        let moved = Task::find_by_id(&db, offset_task.id).await.unwrap().unwrap();
        assert_eq!(moved.due_date, Some(ymd(2025, 9, 5)));
        assert_eq!(moved.days_from_meeting, Some(-10));
        let untouched = Task::find_by_id(&db, fixed_task.id).await.unwrap().unwrap();
        assert_eq!(untouched.due_date, Some(ymd(2025, 1, 1)));
    }

    #[tokio::test]
    async fn unknown_project_is_rejected() {
        let db = setup_db().await;
        let err = DueDateCascadeService::new()
            .update_project_due_date(&db, Uuid::new_v4(), ymd(2025, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CascadeError::Project(ProjectError::ProjectNotFound)
        ));
    }
}
