use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::{ContactStatus, ContactType};
use crate::entities::contact;

#[derive(Debug, Error)]
pub enum ContactError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Contact not found")]
    ContactNotFound,
    #[error("Invalid contact: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Contact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_type: ContactType,
    pub role: Option<String>,
    pub status: ContactStatus,
    pub notes: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateContact {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub contact_type: Option<ContactType>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<ContactStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateContact {
    pub fn named(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            phone: None,
            contact_type: None,
            role: None,
            status: None,
            notes: None,
        }
    }

    pub fn team_member(first_name: &str, last_name: &str, role: &str) -> Self {
        Self {
            contact_type: Some(ContactType::TeamMember),
            role: Some(role.to_string()),
            ..Self::named(first_name, last_name)
        }
    }
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_type: Option<ContactType>,
    pub role: Option<String>,
    pub status: Option<ContactStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ContactFilter {
    pub contact_type: Option<ContactType>,
    pub status: Option<ContactStatus>,
}

fn required_name(value: &str, field: &str) -> Result<String, ContactError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ContactError::Validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

impl Contact {
    fn from_model(model: contact::Model) -> Self {
        Self {
            id: model.uuid,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            contact_type: model.contact_type,
            role: model.role,
            status: model.status,
            notes: model.notes,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    pub fn is_active_team_member(&self) -> bool {
        self.contact_type == ContactType::TeamMember && self.status == ContactStatus::Active
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        filter: &ContactFilter,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = contact::Entity::find();
        if let Some(contact_type) = filter.contact_type.clone() {
            query = query.filter(contact::Column::ContactType.eq(contact_type));
        }
        if let Some(status) = filter.status.clone() {
            query = query.filter(contact::Column::Status.eq(status));
        }
        let records = query
            .order_by_asc(contact::Column::LastName)
            .order_by_asc(contact::Column::FirstName)
            .order_by_asc(contact::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_type<C: ConnectionTrait>(
        db: &C,
        contact_type: ContactType,
    ) -> Result<Vec<Self>, DbErr> {
        Self::find_all(
            db,
            &ContactFilter {
                contact_type: Some(contact_type),
                status: None,
            },
        )
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = contact::Entity::find()
            .filter(contact::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateContact,
        contact_id: Uuid,
    ) -> Result<Self, ContactError> {
        let first_name = required_name(&data.first_name, "first_name")?;
        let last_name = required_name(&data.last_name, "last_name")?;

        let now = Utc::now();
        let active = contact::ActiveModel {
            uuid: Set(contact_id),
            first_name: Set(first_name),
            last_name: Set(last_name),
            email: Set(data.email.clone()),
            phone: Set(data.phone.clone()),
            contact_type: Set(data.contact_type.clone().unwrap_or_default()),
            role: Set(data.role.as_ref().map(|role| role.trim().to_string())),
            status: Set(data.status.clone().unwrap_or_default()),
            notes: Set(data.notes.clone()),
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
        payload: &UpdateContact,
    ) -> Result<Self, ContactError> {
        let record = contact::Entity::find()
            .filter(contact::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ContactError::ContactNotFound)?;

        let mut active: contact::ActiveModel = record.into();
        if let Some(first_name) = payload.first_name.as_deref() {
            active.first_name = Set(required_name(first_name, "first_name")?);
        }
        if let Some(last_name) = payload.last_name.as_deref() {
            active.last_name = Set(required_name(last_name, "last_name")?);
        }
        if payload.email.is_some() {
            active.email = Set(payload.email.clone());
        }
        if payload.phone.is_some() {
            active.phone = Set(payload.phone.clone());
        }
        if let Some(contact_type) = payload.contact_type.clone() {
            active.contact_type = Set(contact_type);
        }
        if let Some(role) = payload.role.as_deref() {
            active.role = Set(Some(role.trim().to_string()));
        }
        if let Some(status) = payload.status.clone() {
            active.status = Set(status);
        }
        if payload.notes.is_some() {
            active.notes = Set(payload.notes.clone());
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = contact::Entity::delete_many()
            .filter(contact::Column::Uuid.eq(id))
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

    #[tokio::test]
    async fn create_trims_names_and_defaults_to_active_client() {
        let db = setup_db().await;
        let contact = Contact::create(
            &db,
            &CreateContact::named("  Grace ", "Hopper  "),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(contact.first_name, "Grace");
        assert_eq!(contact.last_name, "Hopper");
        assert_eq!(contact.contact_type, ContactType::Client);
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.full_name(), "Grace Hopper");
        assert!(!contact.is_active_team_member());
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let db = setup_db().await;
        let err = Contact::create(&db, &CreateContact::named("  ", "Smith"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::Validation(_)));
    }

    #[tokio::test]
    async fn filters_by_type_and_status() {
        let db = setup_db().await;
        Contact::create(
            &db,
            &CreateContact::team_member("Alice", "Able", "estate_attorney"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let inactive = Contact::create(
            &db,
            &CreateContact::team_member("Bob", "Baker", "paralegal"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Contact::update(
            &db,
            inactive.id,
            &UpdateContact {
                status: Some(ContactStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        Contact::create(&db, &CreateContact::named("Carol", "Client"), Uuid::new_v4())
            .await
            .unwrap();

        let team = Contact::find_by_type(&db, ContactType::TeamMember)
            .await
            .unwrap();
        assert_eq!(team.len(), 2);

        let active_team = Contact::find_all(
            &db,
            &ContactFilter {
                contact_type: Some(ContactType::TeamMember),
                status: Some(ContactStatus::Active),
            },
        )
        .await
        .unwrap();
        assert_eq!(active_team.len(), 1);
        assert_eq!(active_team[0].first_name, "Alice");
        assert!(active_team[0].is_active_team_member());
    }

    #[tokio::test]
    async fn update_missing_contact_is_not_found() {
        let db = setup_db().await;
        let err = Contact::update(&db, Uuid::new_v4(), &UpdateContact::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::ContactNotFound));
        assert_eq!(Contact::delete(&db, Uuid::new_v4()).await.unwrap(), 0);
    }
}
