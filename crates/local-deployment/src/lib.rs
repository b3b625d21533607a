use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::{Config, load_config_from_file, save_config_to_file},
    due_date_cascade::DueDateCascadeService,
    instantiation::InstantiationService,
    notification::NotificationService,
    project::ProjectService,
    role_resolver::RoleResolver,
    template::TemplateService,
};
use tokio::sync::RwLock;
use utils::assets::config_path;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    project: ProjectService,
    templates: TemplateService,
    roles: RoleResolver,
    instantiation: InstantiationService,
    cascade: DueDateCascadeService,
    notifications: NotificationService,
}

struct DomainServices {
    project: ProjectService,
    templates: TemplateService,
    roles: RoleResolver,
    instantiation: InstantiationService,
    cascade: DueDateCascadeService,
    notifications: NotificationService,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Self::load_runtime_config().await?;
        let db = DBService::new().await?;
        Ok(Self::from_parts(config, db))
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn project(&self) -> &ProjectService {
        &self.project
    }

    fn templates(&self) -> &TemplateService {
        &self.templates
    }

    fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    fn instantiation(&self) -> &InstantiationService {
        &self.instantiation
    }

    fn cascade(&self) -> &DueDateCascadeService {
        &self.cascade
    }

    fn notifications(&self) -> &NotificationService {
        &self.notifications
    }
}

impl LocalDeployment {
    /// Wires the services around an already opened database. Used by `new`
    /// and by callers that manage their own storage.
    pub fn from_parts(config: Arc<RwLock<Config>>, db: DBService) -> Self {
        let DomainServices {
            project,
            templates,
            roles,
            instantiation,
            cascade,
            notifications,
        } = Self::build_services();

        Self {
            config,
            db,
            project,
            templates,
            roles,
            instantiation,
            cascade,
            notifications,
        }
    }

    async fn load_runtime_config() -> Result<Arc<RwLock<Config>>, DeploymentError> {
        let path = config_path();
        let raw_config = load_config_from_file(&path).await;
        save_config_to_file(&raw_config, &path).await?;
        tracing::debug!(path = %path.display(), "Loaded configuration");

        Ok(Arc::new(RwLock::new(raw_config)))
    }

    fn build_services() -> DomainServices {
        let roles = RoleResolver::new();
        let instantiation = InstantiationService::new(roles.clone());
        let cascade = DueDateCascadeService::new();
        let project = ProjectService::new(instantiation.clone(), cascade.clone());

        DomainServices {
            project,
            templates: TemplateService::new(),
            roles,
            instantiation,
            cascade,
            notifications: NotificationService::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use db::models::contact::{Contact, CreateContact};
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn from_parts_shares_the_database_with_every_service() {
        let db = DBService::connect("sqlite::memory:").await.unwrap();
        let deployment =
            LocalDeployment::from_parts(Arc::new(RwLock::new(Config::default())), db);

        Contact::create(
            &deployment.db().pool,
            &CreateContact::team_member("Alice", "Lawson", "estate_attorney"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let config = deployment.config_snapshot().await;
        let resolution = deployment
            .roles()
            .resolve(
                &deployment.db().pool,
                &["Estate_Attorney".to_string()],
                &config.roles.placeholder_contacts,
            )
            .await
            .unwrap();
        assert_eq!(resolution.contact_ids().len(), 1);
        assert!(resolution.unassigned_roles.is_empty());
    }

    #[tokio::test]
    async fn runtime_config_is_written_back_to_the_asset_dir() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");

        let config = load_config_from_file(&path).await;
        save_config_to_file(&config, &path).await.unwrap();

        let reloaded = load_config_from_file(&path).await;
        assert_eq!(
            reloaded.instantiation.sealed_packet_offset_days,
            config.instantiation.sealed_packet_offset_days
        );
        assert!(path.exists());
    }
}
