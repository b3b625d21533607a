use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils::assets::database_path;

pub mod entities;
pub mod models;
pub mod types;

pub use sea_orm::{DbErr, TransactionTrait};

pub type DbPool = DatabaseConnection;

const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Clone)]
pub struct DBService {
    pub pool: DbPool,
}

fn database_url() -> String {
    if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
        let url = url.trim();
        if !url.is_empty() {
            return url.to_string();
        }
    }
    format!("sqlite://{}?mode=rwc", database_path().to_string_lossy())
}

impl DBService {
    pub async fn new() -> Result<DBService, DbErr> {
        Self::connect(&database_url()).await
    }

    pub async fn connect(url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(url.to_string());
        options
            .connect_timeout(Duration::from_secs(30))
            .sqlx_logging(false);

        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        tracing::debug!("Database ready");
        Ok(DBService { pool })
    }
}
