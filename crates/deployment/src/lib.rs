use std::sync::Arc;

use async_trait::async_trait;
use db::{DBService, DbErr};
use services::services::{
    config::{Config, ConfigError},
    due_date_cascade::DueDateCascadeService,
    instantiation::InstantiationService,
    notification::NotificationService,
    project::ProjectService,
    role_resolver::RoleResolver,
    template::TemplateService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs: configuration, storage and the
/// domain services wired together.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn project(&self) -> &ProjectService;

    fn templates(&self) -> &TemplateService;

    fn roles(&self) -> &RoleResolver;

    fn instantiation(&self) -> &InstantiationService;

    fn cascade(&self) -> &DueDateCascadeService;

    fn notifications(&self) -> &NotificationService;

    /// Snapshot of the current configuration, so callers do not hold the
    /// lock across database work.
    async fn config_snapshot(&self) -> Config {
        self.config().read().await.clone()
    }
}
