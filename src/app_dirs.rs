use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("uma-stable");
            Some(state_dir.join("stable.db"))
        } else {
            ProjectDirs::from("", "", "uma-stable")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("stable.db"))
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "uma-stable").map(|pd| pd.config_dir().join("config.json"))
    }
}
