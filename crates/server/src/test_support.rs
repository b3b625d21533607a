use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use deployment::Deployment;
use uuid::Uuid;

use crate::DeploymentImpl;

const DATABASE_URL_ENV: &str = "DATABASE_URL";
const ASSET_DIR_ENV: &str = "CRM_ASSET_DIR";

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Points the asset directory and database at a scratch location for the
/// lifetime of the guard. Guards are serialised so env overrides never
/// interleave between tests.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    prev_database_url: Option<String>,
    prev_asset_dir: Option<String>,
}

impl TestEnvGuard {
    pub fn new(temp_root: &Path, db_url: String) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let prev_database_url = std::env::var(DATABASE_URL_ENV).ok();
        let prev_asset_dir = std::env::var(ASSET_DIR_ENV).ok();

        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var(ASSET_DIR_ENV, temp_root);
            std::env::set_var(DATABASE_URL_ENV, db_url);
        }

        Self {
            _lock: lock,
            prev_database_url,
            prev_asset_dir,
        }
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            match &self.prev_database_url {
                Some(value) => std::env::set_var(DATABASE_URL_ENV, value),
                None => std::env::remove_var(DATABASE_URL_ENV),
            }
            match &self.prev_asset_dir {
                Some(value) => std::env::set_var(ASSET_DIR_ENV, value),
                None => std::env::remove_var(ASSET_DIR_ENV),
            }
        }
    }
}

fn scratch_root() -> PathBuf {
    let temp_root = std::env::temp_dir().join(format!("crm-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&temp_root).unwrap();
    temp_root
}

/// A fresh deployment backed by its own SQLite file and config.
pub async fn test_deployment() -> (TestEnvGuard, DeploymentImpl) {
    let temp_root = scratch_root();
    let db_path = temp_root.join("db.sqlite");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
    let env_guard = TestEnvGuard::new(&temp_root, db_url);

    let deployment = DeploymentImpl::new().await.unwrap();
    (env_guard, deployment)
}
