use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::project_template;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Template not found")]
    TemplateNotFound,
    #[error("Template task not found")]
    TemplateTaskNotFound,
    #[error("Template milestone not found")]
    MilestoneNotFound,
    #[error("Reference to {0} outside this template")]
    CrossTemplateReference(&'static str),
    #[error("Invalid template: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meeting_type: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProjectTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meeting_type: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateProjectTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub meeting_type: Option<String>,
}

fn normalize_meeting_type(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl ProjectTemplate {
    fn from_model(model: project_template::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            meeting_type: model.meeting_type,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project_template::Entity::find()
            .order_by_asc(project_template::Column::Name)
            .order_by_asc(project_template::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = project_template::Entity::find()
            .filter(project_template::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// First template (by creation order) whose meeting type matches, ignoring
    /// case and surrounding whitespace.
    pub async fn find_by_meeting_type<C: ConnectionTrait>(
        db: &C,
        meeting_type: &str,
    ) -> Result<Option<Self>, DbErr> {
        let wanted = meeting_type.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let records = project_template::Entity::find()
            .filter(project_template::Column::MeetingType.is_not_null())
            .order_by_asc(project_template::Column::Id)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .find(|record| {
                record
                    .meeting_type
                    .as_deref()
                    .is_some_and(|tag| tag.trim().to_lowercase() == wanted)
            })
            .map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProjectTemplate,
        template_id: Uuid,
    ) -> Result<Self, TemplateError> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(TemplateError::Validation(
                "template name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let active = project_template::ActiveModel {
            uuid: Set(template_id),
            name: Set(name.to_string()),
            description: Set(data.description.clone()),
            meeting_type: Set(normalize_meeting_type(data.meeting_type.as_deref())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateProjectTemplate,
    ) -> Result<Self, TemplateError> {
        let record = project_template::Entity::find()
            .filter(project_template::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TemplateError::TemplateNotFound)?;

        let mut active: project_template::ActiveModel = record.into();
        if let Some(name) = payload.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(TemplateError::Validation(
                    "template name cannot be empty".to_string(),
                ));
            }
            active.name = Set(name.to_string());
        }
        if payload.description.is_some() {
            active.description = Set(payload.description.clone());
        }
        if payload.meeting_type.is_some() {
            active.meeting_type = Set(normalize_meeting_type(payload.meeting_type.as_deref()));
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = project_template::Entity::delete_many()
            .filter(project_template::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
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

    fn template(name: &str, meeting_type: Option<&str>) -> CreateProjectTemplate {
        CreateProjectTemplate {
            name: name.to_string(),
            description: None,
            meeting_type: meeting_type.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn meeting_type_lookup_is_case_insensitive() {
        let db = setup_db().await;
        let created = ProjectTemplate::create(
            &db,
            &template("Design meeting", Some("  Design Meeting ")),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(created.meeting_type.as_deref(), Some("Design Meeting"));

        let found = ProjectTemplate::find_by_meeting_type(&db, "design meeting")
            .await
            .unwrap()
            .expect("template");
        assert_eq!(found.id, created.id);

        assert!(
            ProjectTemplate::find_by_meeting_type(&db, "signing")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            ProjectTemplate::find_by_meeting_type(&db, "  ")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn blank_meeting_type_is_stored_as_none() {
        let db = setup_db().await;
        let created = ProjectTemplate::create(&db, &template("Blank", Some("  ")), Uuid::new_v4())
            .await
            .unwrap();
        assert!(created.meeting_type.is_none());
    }

    #[tokio::test]
    async fn rejects_empty_names() {
        let db = setup_db().await;
        let err = ProjectTemplate::create(&db, &template(" ", None), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::Validation(_)));

        let created = ProjectTemplate::create(&db, &template("Ok", None), Uuid::new_v4())
            .await
            .unwrap();
        let err = ProjectTemplate::update(
            &db,
            created.id,
            &UpdateProjectTemplate {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TemplateError::Validation(_)));
    }
}
