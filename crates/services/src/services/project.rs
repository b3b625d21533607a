use db::{
    DbErr, DbPool,
    models::{
        project::{CreateProject, Project, ProjectError, UpdateProject},
        project_template::ProjectTemplate,
    },
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    config::Config,
    due_date_cascade::{CascadeError, DueDateCascadeService},
    instantiation::{InstantiationError, InstantiationReport, InstantiationService},
};

#[derive(Debug, Error)]
pub enum ProjectServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Instantiation(#[from] InstantiationError),
    #[error(transparent)]
    Cascade(#[from] CascadeError),
    #[error("Template not found")]
    TemplateNotFound,
    #[error("A due date is required to create a project from a template")]
    MissingAnchorDate,
}

pub type Result<T> = std::result::Result<T, ProjectServiceError>;

/// Outcome of `POST /projects`: either a bare project or one built from a
/// template.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProjectCreation {
    Plain { project: Project },
    Template(InstantiationReport),
}

impl ProjectCreation {
    pub fn project(&self) -> &Project {
        match self {
            Self::Plain { project } => project,
            Self::Template(report) => &report.project,
        }
    }
}

#[derive(Clone, Default)]
pub struct ProjectService {
    instantiation: InstantiationService,
    cascade: DueDateCascadeService,
}

impl ProjectService {
    pub fn new(instantiation: InstantiationService, cascade: DueDateCascadeService) -> Self {
        Self {
            instantiation,
            cascade,
        }
    }

    /// Template named explicitly, else the first one whose meeting type
    /// matches the payload's.
    async fn template_for(
        &self,
        pool: &DbPool,
        payload: &CreateProject,
    ) -> Result<Option<ProjectTemplate>> {
        if let Some(template_id) = payload.template_id {
            return ProjectTemplate::find_by_id(pool, template_id)
                .await?
                .map(Some)
                .ok_or(ProjectServiceError::TemplateNotFound);
        }
        match payload.meeting_type.as_deref() {
            Some(meeting_type) => Ok(ProjectTemplate::find_by_meeting_type(pool, meeting_type).await?),
            None => Ok(None),
        }
    }

    /// Instantiates a template when one is named, or when the meeting type
    /// matches a template and a due date is given. Otherwise creates a plain
    /// project.
    pub async fn create_project(
        &self,
        pool: &DbPool,
        config: &Config,
        payload: CreateProject,
    ) -> Result<ProjectCreation> {
        let template = self.template_for(pool, &payload).await?;

        match (template, payload.due_date) {
            (Some(template), Some(anchor)) => {
                let report = self
                    .instantiation
                    .instantiate(pool, config, template.id, anchor, &payload)
                    .await?;
                Ok(ProjectCreation::Template(report))
            }
            (Some(_), None) if payload.template_id.is_some() => {
                Err(ProjectServiceError::MissingAnchorDate)
            }
            (template, _) => {
                if let Some(template) = template {
                    tracing::debug!(
                        template_id = %template.id,
                        "Meeting type matches a template but no due date was given"
                    );
                }
                let project = Project::create(pool, &payload, Uuid::new_v4()).await?;
                Ok(ProjectCreation::Plain { project })
            }
        }
    }

    /// A changed due date moves the anchor through the cascade so task dates
    /// follow it.
    pub async fn update_project(
        &self,
        pool: &DbPool,
        existing: &Project,
        payload: UpdateProject,
    ) -> Result<Project> {
        let new_anchor = payload
            .due_date
            .filter(|due_date| existing.due_date != Some(*due_date));
        let project = Project::update(
            pool,
            existing.id,
            &UpdateProject {
                due_date: None,
                ..payload
            },
        )
        .await?;

        match new_anchor {
            Some(anchor) => {
                let report = self
                    .cascade
                    .update_project_due_date(pool, project.id, anchor)
                    .await?;
                Ok(report.project)
            }
            None => Ok(project),
        }
    }

    pub async fn delete_project(&self, pool: &DbPool, project_id: Uuid) -> Result<u64> {
        let rows_affected = Project::delete(pool, project_id).await?;
        if rows_affected > 0 {
            tracing::info!(project_id = %project_id, "Deleted project");
        }
        Ok(rows_affected)
    }
}
