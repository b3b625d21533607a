use std::path::{Path, PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "CRM_ASSET_DIR";

fn ensure_dir(path: &Path) {
    if !path.exists()
        && let Err(err) = std::fs::create_dir_all(path)
    {
        tracing::warn!("Failed to create asset directory {}: {}", path.display(), err);
    }
}

pub fn asset_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(ASSET_DIR_ENV) {
        let override_dir = override_dir.trim();
        if !override_dir.is_empty() {
            let path = PathBuf::from(override_dir);
            ensure_dir(&path);
            return path;
        }
    }

    let path = if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        match ProjectDirs::from("com", "estateplan", "crm") {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => {
                tracing::warn!("No home directory available, using working directory for assets");
                PathBuf::from(".crm")
            }
        }
    };

    ensure_dir(&path);
    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn database_path() -> PathBuf {
    asset_dir().join("db.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_database_live_in_asset_dir() {
        let dir = asset_dir();
        assert_eq!(config_path(), dir.join("config.json"));
        assert_eq!(database_path(), dir.join("db.sqlite"));
    }
}
