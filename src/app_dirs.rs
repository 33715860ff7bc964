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
                .join("stint");
            Some(state_dir.join("timer.db"))
        } else {
            ProjectDirs::from("", "", "stint")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("timer.db"))
        }
    }

    pub fn completion_log_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stint").map(|proj_dirs| proj_dirs.config_dir().join("log.csv"))
    }
}
