//! Application paths for config and data.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable that relocates every lmc file under one directory.
pub const HOME_ENV: &str = "LMC_HOME";

/// Application paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the lmc application.
    ///
    /// `LMC_HOME` wins over the platform directories.
    #[must_use]
    pub fn new() -> Self {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::with_root(Path::new(&root));
        }

        if let Some(proj_dirs) = ProjectDirs::from("dev", "lmc", "lmc") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
            Self {
                config: home.join(".config/lmc"),
                data: home.join(".local/share/lmc"),
            }
        }
    }

    /// Everything under one root (`<root>/config`, `<root>/data`).
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self {
            config: root.join("config"),
            data: root.join("data"),
        }
    }

    /// Path to the TOML config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Path to the file-backed credential store.
    #[must_use]
    pub fn credentials_file(&self) -> PathBuf {
        self.config.join("credentials.json")
    }

    /// Path to customized system prompts.
    #[must_use]
    pub fn prompts_file(&self) -> PathBuf {
        self.data.join("system-prompts.json")
    }

    /// Path to saved user prompts.
    #[must_use]
    pub fn user_prompts_file(&self) -> PathBuf {
        self.data.join("user-prompts.json")
    }

    /// Path to the session record.
    #[must_use]
    pub fn sessions_file(&self) -> PathBuf {
        self.data.join("sessions.json")
    }

    /// Pid of an Ollama server started by lmc.
    #[must_use]
    pub fn ollama_pid_file(&self) -> PathBuf {
        self.data.join("ollama.pid")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_paths_stay_under_root() {
        let paths = AppPaths::with_root(Path::new("/tmp/lmc-test"));
        for file in [
            paths.config_file(),
            paths.credentials_file(),
            paths.prompts_file(),
            paths.user_prompts_file(),
            paths.sessions_file(),
            paths.ollama_pid_file(),
        ] {
            assert!(file.starts_with("/tmp/lmc-test"), "{}", file.display());
        }
        assert_eq!(paths.config_file().file_name().unwrap(), "config.toml");
    }
}
