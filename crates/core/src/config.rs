//! Application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `.advisor/config.yaml`
//! (or the file named by `ADVISOR_CONFIG`), environment variables, then
//! command-line flags applied through [`AppConfig::with_overrides`].
//!
//! ```yaml
//! workspace:
//!   path: /srv/advisor
//! logging:
//!   level: advisor_retrieval=debug
//!   color: false
//! retrieval:
//!   file: catalogs/production.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Directory under the workspace holding local configuration.
pub const ADVISOR_DIR: &str = ".advisor";

const WORKSPACE_ENV: &str = "ADVISOR_WORKSPACE";
const CONFIG_ENV: &str = "ADVISOR_CONFIG";
const RETRIEVAL_CONFIG_ENV: &str = "ADVISOR_RETRIEVAL_CONFIG";

/// Settings shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; `.advisor/` lives here
    pub workspace: PathBuf,

    /// Explicit path of the application config file
    pub config_file: Option<PathBuf>,

    /// Explicit path of the retrieval config; relative paths resolve against the workspace
    pub retrieval_file: Option<PathBuf>,

    /// Tracing filter directive
    pub log_level: Option<String>,

    pub verbose: bool,

    pub no_color: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FileLayer {
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    retrieval: Option<RetrievalSection>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceSection {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RetrievalSection {
    file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            retrieval_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment and the config file.
    ///
    /// Environment variables:
    /// - `ADVISOR_WORKSPACE`: workspace root
    /// - `ADVISOR_CONFIG`: config file path
    /// - `ADVISOR_RETRIEVAL_CONFIG`: retrieval config path
    /// - `RUST_LOG`: log filter
    /// - `NO_COLOR`: disable colored output
    ///
    /// A missing config file is not an error; an unreadable one is.
    ///
    /// # Example
    /// ```no_run
    /// use advisor_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Retrieval config: {:?}", config.retrieval_config_path());
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();
        if let Some(workspace) = env_path(WORKSPACE_ENV) {
            config.workspace = workspace;
        }
        config.config_file = env_path(CONFIG_ENV);

        if !config.workspace.is_dir() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let file = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.advisor_dir().join("config.yaml"));
        if file.exists() {
            config = config.merge_yaml(&file)?;
        }

        config.apply_env();
        Ok(config)
    }

    /// Environment overrides that beat the config file.
    fn apply_env(&mut self) {
        if let Some(path) = env_path(RETRIEVAL_CONFIG_ENV) {
            self.retrieval_file = Some(path);
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var_os("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Layer a YAML config file over a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let layer: FileLayer = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut merged = self.clone();
        if let Some(path) = layer.workspace.and_then(|w| w.path) {
            merged.workspace = path;
        }
        if let Some(logging) = layer.logging {
            merged.log_level = logging.level.or(merged.log_level);
            if let Some(color) = logging.color {
                merged.no_color = !color;
            }
        }
        if let Some(file) = layer.retrieval.and_then(|r| r.file) {
            merged.retrieval_file = Some(file);
        }

        Ok(merged)
    }

    /// Apply command-line flags. Flags beat every other source.
    ///
    /// `verbose` implies a `debug` filter unless a level was given.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        self.workspace = workspace.unwrap_or(self.workspace);
        self.config_file = config_file.or(self.config_file);
        self.log_level = log_level.or(self.log_level);

        if verbose {
            self.verbose = true;
            self.log_level.get_or_insert_with(|| "debug".to_string());
        }
        self.no_color |= no_color;

        self
    }

    pub fn advisor_dir(&self) -> PathBuf {
        self.workspace.join(ADVISOR_DIR)
    }

    /// Where the retrieval config is read from.
    pub fn retrieval_config_path(&self) -> PathBuf {
        match &self.retrieval_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.workspace.join(path),
            None => self.advisor_dir().join("retrieval.yaml"),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn in_workspace(path: &Path) -> AppConfig {
        AppConfig {
            workspace: path.to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert!(config.log_level.is_none());
        assert!(config.advisor_dir().ends_with(ADVISOR_DIR));
    }

    #[test]
    fn test_verbose_implies_debug() {
        let overridden = AppConfig::default().with_overrides(
            Some(PathBuf::from("/tmp")),
            None,
            None,
            true,
            true,
        );

        assert_eq!(overridden.workspace, PathBuf::from("/tmp"));
        assert!(overridden.no_color);
        assert_eq!(overridden.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_level_wins_over_verbose() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("warn".to_string()),
            true,
            false,
        );
        assert_eq!(overridden.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "logging:\n  level: trace\n  color: false\nretrieval:\n  file: catalogs/prod.yaml\n",
        )
        .unwrap();

        let merged = in_workspace(temp.path()).merge_yaml(&path).unwrap();
        assert_eq!(merged.log_level.as_deref(), Some("trace"));
        assert!(merged.no_color);
        assert_eq!(
            merged.retrieval_config_path(),
            temp.path().join("catalogs/prod.yaml")
        );
    }

    #[test]
    fn test_partial_yaml_keeps_existing_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "logging:\n  color: true\n").unwrap();

        let base = AppConfig {
            log_level: Some("info".to_string()),
            ..in_workspace(temp.path())
        };
        let merged = base.merge_yaml(&path).unwrap();
        assert_eq!(merged.log_level.as_deref(), Some("info"));
        assert!(!merged.no_color);
    }

    #[test]
    fn test_merge_yaml_rejects_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "logging: [unterminated").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_retrieval_config_path() {
        let temp = TempDir::new().unwrap();
        let config = in_workspace(temp.path());
        assert_eq!(
            config.retrieval_config_path(),
            temp.path().join(".advisor").join("retrieval.yaml")
        );

        let absolute = AppConfig {
            retrieval_file: Some(PathBuf::from("/etc/advisor/retrieval.yaml")),
            ..config
        };
        assert_eq!(
            absolute.retrieval_config_path(),
            PathBuf::from("/etc/advisor/retrieval.yaml")
        );
    }
}
