//! Project configuration file handling.
//!
//! A project keeps its migration settings in `sly.json` next to its
//! `migrations/` directory. Handlers in the file are external programs (see
//! [`CommandHandler`]); in-process handlers are registered through
//! [`MigrateOptions`] directly.
//!
//! ```json
//! {
//!   "migrationPaths": ["migrations"],
//!   "direction": 1,
//!   "handlers": {
//!     "sql": { "command": "psql", "args": ["-v", "ON_ERROR_STOP=1", "-f", "{file}"] },
//!     "sh": { "command": "sh", "args": ["{file}"] },
//!     "js": null
//!   }
//! }
//! ```

use crate::command_handler::CommandHandler;
use crate::direction::Direction;
use crate::error::{Result, SlyError};
use crate::options::{MigrateOptions, DEFAULT_MIGRATION_DIR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sly.json";

/// One path or a list of paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MigrationPaths {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl MigrationPaths {
    pub fn into_vec(self) -> Vec<PathBuf> {
        match self {
            Self::One(path) => vec![path],
            Self::Many(paths) => paths,
        }
    }

    /// Paths with relative entries joined onto `dir`; `None` when empty
    ///
    /// Used for paths given on the command line, which are relative to the
    /// shell's working directory rather than to the config file.
    pub fn anchored(paths: Vec<PathBuf>, dir: &Path) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        Some(Self::Many(
            paths
                .into_iter()
                .map(|p| if p.is_absolute() { p } else { dir.join(p) })
                .collect(),
        ))
    }
}

/// An external program registered as a handler or hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn to_command(&self, dry_run: bool) -> CommandHandler {
        self.env.iter().fold(
            CommandHandler::new(&self.command)
                .args(self.args.iter().cloned())
                .dry_run(dry_run),
            |handler, (key, value)| handler.env(key, value),
        )
    }
}

/// Contents of `sly.json`
///
/// Handler keys are file extensions; a `null` value disables that extension,
/// which matters when merging overrides over a base file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_paths: Option<MigrationPaths>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub handlers: BTreeMap<String, Option<CommandSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_all: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_all: Option<CommandSpec>,
}

impl ProjectConfig {
    /// Starter configuration written by `sly init`
    pub fn starter() -> Self {
        let mut handlers = BTreeMap::new();
        handlers.insert(
            "sql".to_string(),
            Some(CommandSpec {
                command: "psql".to_string(),
                args: ["-v", "ON_ERROR_STOP=1", "-f", "{file}"]
                    .map(String::from)
                    .to_vec(),
                env: BTreeMap::new(),
            }),
        );
        handlers.insert(
            "sh".to_string(),
            Some(CommandSpec {
                command: "sh".to_string(),
                args: vec!["{file}".to_string()],
                env: BTreeMap::new(),
            }),
        );
        Self {
            migration_paths: Some(MigrationPaths::One(PathBuf::from(DEFAULT_MIGRATION_DIR))),
            direction: Some(Direction::UP),
            handlers,
            before_all: None,
            after_all: None,
        }
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SlyError::config(format!(
                "Unable to open sly configuration at {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SlyError::config(format!(
                "Failed to parse configuration {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (ext, spec) in &self.handlers {
            if ext.trim().is_empty() {
                return Err(SlyError::config("Handler extension must not be empty"));
            }
            if let Some(spec) = spec {
                if spec.command.trim().is_empty() {
                    return Err(SlyError::config(format!(
                        "Handler for '{}' has an empty command",
                        ext
                    )));
                }
            }
        }
        if !self.handlers.values().any(Option::is_some) {
            return Err(SlyError::NoHandlers);
        }

        for (name, hook) in [("beforeAll", &self.before_all), ("afterAll", &self.after_all)] {
            if hook.as_ref().is_some_and(|h| h.command.trim().is_empty()) {
                return Err(SlyError::config(format!("{} has an empty command", name)));
            }
        }
        Ok(())
    }

    /// Layer `overrides` over this configuration
    ///
    /// Scalar settings present in `overrides` win; handlers merge per
    /// extension, so an override of `null` disables a base handler.
    pub fn merge(mut self, overrides: ProjectConfig) -> Self {
        if overrides.migration_paths.is_some() {
            self.migration_paths = overrides.migration_paths;
        }
        if overrides.direction.is_some() {
            self.direction = overrides.direction;
        }
        if overrides.before_all.is_some() {
            self.before_all = overrides.before_all;
        }
        if overrides.after_all.is_some() {
            self.after_all = overrides.after_all;
        }
        self.handlers.extend(overrides.handlers);
        self
    }

    /// Configured migration paths, relative ones resolved against `base_dir`
    pub fn resolved_paths(&self, base_dir: &Path) -> Vec<PathBuf> {
        let paths = self
            .migration_paths
            .clone()
            .map(MigrationPaths::into_vec)
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_MIGRATION_DIR)]);
        paths
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { base_dir.join(p) })
            .collect()
    }

    /// Build run options with every handler backed by an external program
    pub fn into_options(self, base_dir: &Path, dry_run: bool) -> MigrateOptions {
        let direction = self.direction.unwrap_or_default();
        let mut options = MigrateOptions::new()
            .migration_paths(self.resolved_paths(base_dir))
            .direction(direction);

        for (ext, spec) in &self.handlers {
            let handler = spec
                .as_ref()
                .map(|spec| spec.to_command(dry_run).into_handler());
            options = options.handler(ext.as_str(), handler);
        }
        if let Some(spec) = &self.before_all {
            let step = spec.to_command(dry_run).into_step("beforeAll", direction);
            options = options.before_all(step);
        }
        if let Some(spec) = &self.after_all {
            let step = spec.to_command(dry_run).into_step("afterAll", direction);
            options = options.after_all(step);
        }
        options
    }
}
