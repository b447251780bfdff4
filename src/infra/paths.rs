// src/infra/paths.rs — Path management
//
// All paths respect the FLOCKMIRROR_HOME environment variable for isolation.
// When unset, config uses ~/.flockmirror/ and data uses the platform's local
// data directory.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "flockmirror").expect("Could not determine home directory")
    })
}

fn flockmirror_home() -> Option<PathBuf> {
    std::env::var_os("FLOCKMIRROR_HOME").map(PathBuf::from)
}

/// Configuration directory: $FLOCKMIRROR_HOME/ or ~/.flockmirror/
pub fn config_dir() -> PathBuf {
    if let Some(home) = flockmirror_home() {
        return home;
    }
    dirs_home().join(".flockmirror")
}

/// Data directory: $FLOCKMIRROR_HOME/data/ or the platform data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = flockmirror_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Database path
pub fn db_path() -> PathBuf {
    data_dir().join("flockmirror.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
