use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::{InteractionDirection, InteractionKind};
use crate::{entities::interaction, models::ids};

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Interaction not found")]
    InteractionNotFound,
    #[error("Contact not found")]
    ContactNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Interaction subject cannot be empty")]
    EmptySubject,
}

/// One logged email, call, meeting or note against a contact.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Interaction {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub project_id: Option<Uuid>,
    pub kind: InteractionKind,
    pub direction: Option<InteractionDirection>,
    pub subject: String,
    pub body: Option<String>,
    #[ts(type = "Date")]
    pub occurred_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateInteraction {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub kind: InteractionKind,
    #[serde(default)]
    pub direction: Option<InteractionDirection>,
    pub subject: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    #[ts(type = "Date | null")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl Interaction {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: interaction::Model,
    ) -> Result<Self, DbErr> {
        let contact_id = ids::contact_uuid_by_id(db, model.contact_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Contact not found".to_string()))?;
        let project_id = match model.project_id {
            Some(id) => ids::project_uuid_by_id(db, id).await?,
            None => None,
        };

        Ok(Self {
            id: model.uuid,
            contact_id,
            project_id,
            kind: model.kind,
            direction: model.direction,
            subject: model.subject,
            body: model.body,
            occurred_at: model.occurred_at.into(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    /// Newest first.
    pub async fn find_by_contact<C: ConnectionTrait>(
        db: &C,
        contact_id: Uuid,
    ) -> Result<Vec<Self>, InteractionError> {
        let contact_row_id = ids::contact_id_by_uuid(db, contact_id)
            .await?
            .ok_or(InteractionError::ContactNotFound)?;
        let records = interaction::Entity::find()
            .filter(interaction::Column::ContactId.eq(contact_row_id))
            .order_by_desc(interaction::Column::OccurredAt)
            .order_by_desc(interaction::Column::Id)
            .all(db)
            .await?;

        let mut interactions = Vec::with_capacity(records.len());
        for record in records {
            interactions.push(Self::from_model(db, record).await?);
        }
        Ok(interactions)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = interaction::Entity::find()
            .filter(interaction::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        contact_id: Uuid,
        data: &CreateInteraction,
        interaction_id: Uuid,
    ) -> Result<Self, InteractionError> {
        let subject = data.subject.trim();
        if subject.is_empty() {
            return Err(InteractionError::EmptySubject);
        }
        let contact_row_id = ids::contact_id_by_uuid(db, contact_id)
            .await?
            .ok_or(InteractionError::ContactNotFound)?;
        let project_row_id = match data.project_id {
            Some(id) => Some(
                ids::project_id_by_uuid(db, id)
                    .await?
                    .ok_or(InteractionError::ProjectNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = interaction::ActiveModel {
            uuid: Set(interaction_id),
            contact_id: Set(contact_row_id),
            project_id: Set(project_row_id),
            kind: Set(data.kind.clone()),
            direction: Set(data.direction.clone()),
            subject: Set(subject.to_string()),
            body: Set(data.body.clone()),
            occurred_at: Set(data.occurred_at.unwrap_or(now).into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(db, model).await?)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = interaction::Entity::delete_many()
            .filter(interaction::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::contact::{Contact, CreateContact};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn call(subject: &str, occurred_at: DateTime<Utc>) -> CreateInteraction {
        CreateInteraction {
            project_id: None,
            kind: InteractionKind::Call,
            direction: Some(InteractionDirection::Outbound),
            subject: subject.to_string(),
            body: None,
            occurred_at: Some(occurred_at),
        }
    }

    #[tokio::test]
    async fn log_is_listed_newest_first() {
        let db = setup_db().await;
        let contact = Contact::create(&db, &CreateContact::named("Dana", "Doe"), Uuid::new_v4())
            .await
            .unwrap();

        let now = Utc::now();
        Interaction::create(&db, contact.id, &call("intro", now - Duration::days(2)), Uuid::new_v4())
            .await
            .unwrap();
        Interaction::create(&db, contact.id, &call("follow-up", now), Uuid::new_v4())
            .await
            .unwrap();

        let log = Interaction::find_by_contact(&db, contact.id).await.unwrap();
        let subjects: Vec<_> = log.iter().map(|i| i.subject.as_str()).collect();
        assert_eq!(subjects, vec!["follow-up", "intro"]);
        assert!(log.iter().all(|i| i.contact_id == contact.id));
    }

    #[tokio::test]
    async fn create_validates_subject_and_contact() {
        let db = setup_db().await;
        let err = Interaction::create(&db, Uuid::new_v4(), &call("hello", Utc::now()), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, InteractionError::ContactNotFound));

        let contact = Contact::create(&db, &CreateContact::named("Eve", "Doe"), Uuid::new_v4())
            .await
            .unwrap();
        let err = Interaction::create(&db, contact.id, &call("   ", Utc::now()), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, InteractionError::EmptySubject));
    }

    #[tokio::test]
    async fn deleting_contact_removes_log() {
        let db = setup_db().await;
        let contact = Contact::create(&db, &CreateContact::named("Finn", "Doe"), Uuid::new_v4())
            .await
            .unwrap();
        let entry = Interaction::create(&db, contact.id, &call("note", Utc::now()), Uuid::new_v4())
            .await
            .unwrap();

        Contact::delete(&db, contact.id).await.unwrap();
        assert!(Interaction::find_by_id(&db, entry.id).await.unwrap().is_none());
    }
}
