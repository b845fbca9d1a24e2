//! Migration run options
//!
//! Caller-supplied options are layered over defaults: no-op hooks and
//! reporters, the conventional `migrations` directory, forward direction and
//! no handlers. The default directory is relative; use
//! [`MigrateOptions::for_working_dir`] to anchor it explicitly.

use crate::chain::{Done, Step};
use crate::direction::Direction;
use crate::handler::{normalize_extension, Handler, HandlerTable};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory searched when no migration paths are configured
pub const DEFAULT_MIGRATION_DIR: &str = "migrations";

/// Decision returned by the `before_each` hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Run the handler for this file
    #[default]
    Apply,
    /// Skip the file without running its handler or any reporter
    Skip,
}

impl From<bool> for Disposition {
    /// `false` skips, `true` applies
    fn from(apply: bool) -> Self {
        if apply {
            Self::Apply
        } else {
            Self::Skip
        }
    }
}

pub type BeforeEachFn = dyn Fn(&Path, &str, Direction) -> Disposition + Send + Sync;
pub type SuccessFn = dyn Fn(&Path, &str, Direction) + Send + Sync;
pub type FailureFn = dyn Fn(&Path, &str, Direction, &anyhow::Error) + Send + Sync;

/// Per-file hooks and reporters shared by every migration step
#[derive(Clone)]
pub struct Reporters {
    pub before_each: Arc<BeforeEachFn>,
    pub success: Arc<SuccessFn>,
    pub failure: Arc<FailureFn>,
}

impl Default for Reporters {
    fn default() -> Self {
        Self {
            before_each: Arc::new(|_: &Path, _: &str, _: Direction| Disposition::Apply),
            success: Arc::new(|_: &Path, _: &str, _: Direction| {}),
            failure: Arc::new(|_: &Path, _: &str, _: Direction, _: &anyhow::Error| {}),
        }
    }
}

/// Options governing one migration run
pub struct MigrateOptions {
    pub(crate) before_all: Step,
    pub(crate) after_all: Step,
    pub(crate) reporters: Reporters,
    pub(crate) migration_paths: Vec<PathBuf>,
    pub(crate) direction: Direction,
    pub(crate) handlers: Vec<(String, Option<Handler>)>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            before_all: Step::noop(),
            after_all: Step::noop(),
            reporters: Reporters::default(),
            migration_paths: vec![PathBuf::from(DEFAULT_MIGRATION_DIR)],
            direction: Direction::UP,
            handlers: Vec::new(),
        }
    }
}

impl MigrateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with the migration directory anchored at `dir`
    pub fn for_working_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            migration_paths: vec![dir.as_ref().join(DEFAULT_MIGRATION_DIR)],
            ..Self::default()
        }
    }

    /// Register (or with `None`, disable) the handler for an extension
    ///
    /// A later registration for the same extension replaces the earlier one.
    pub fn handler(mut self, ext: impl Into<String>, handler: Option<Handler>) -> Self {
        let ext = normalize_extension(&ext.into()).to_string();
        match self.handlers.iter_mut().find(|(existing, _)| *existing == ext) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((ext, handler)),
        }
        self
    }

    pub fn sync_handler<F>(self, ext: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Path, Direction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(ext, Some(Handler::sync(f)))
    }

    pub fn callback_handler<F>(self, ext: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Path, Direction, Done) + Send + Sync + 'static,
    {
        self.handler(ext, Some(Handler::callback(f)))
    }

    pub fn disable_handler(self, ext: impl Into<String>) -> Self {
        self.handler(ext, None)
    }

    /// Replace the configured paths with a single path
    pub fn migration_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.migration_paths = vec![path.into()];
        self
    }

    /// Replace the configured paths; each may be a directory, file or glob pattern
    pub fn migration_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.migration_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn direction(mut self, direction: impl Into<Direction>) -> Self {
        self.direction = direction.into();
        self
    }

    pub fn before_all(mut self, step: Step) -> Self {
        self.before_all = step;
        self
    }

    pub fn after_all(mut self, step: Step) -> Self {
        self.after_all = step;
        self
    }

    /// Hook called before each file with `(file, digest, direction)`
    pub fn before_each<F, D>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &str, Direction) -> D + Send + Sync + 'static,
        D: Into<Disposition>,
    {
        self.reporters.before_each =
            Arc::new(move |file: &Path, digest: &str, direction: Direction| {
                f(file, digest, direction).into()
            });
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &str, Direction) + Send + Sync + 'static,
    {
        self.reporters.success = Arc::new(f);
        self
    }

    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &str, Direction, &anyhow::Error) + Send + Sync + 'static,
    {
        self.reporters.failure = Arc::new(f);
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.migration_paths
    }

    pub fn configured_direction(&self) -> Direction {
        self.direction
    }

    /// The effective handler table, with disabled entries dropped
    pub fn handler_table(&self) -> HandlerTable {
        HandlerTable::from_entries(self.handlers.iter().cloned())
    }
}

impl fmt::Debug for MigrateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrateOptions")
            .field("migration_paths", &self.migration_paths)
            .field("direction", &self.direction)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MigrateOptions::default();
        assert_eq!(options.paths(), &[PathBuf::from("migrations")]);
        assert_eq!(options.configured_direction(), Direction::UP);
        assert!(options.handler_table().is_empty());
    }

    #[test]
    fn test_for_working_dir() {
        let options = MigrateOptions::for_working_dir("/srv/app");
        assert_eq!(options.paths(), &[PathBuf::from("/srv/app/migrations")]);
    }

    #[test]
    fn test_disable_overrides_earlier_registration() {
        let options = MigrateOptions::new()
            .sync_handler("js", |_, _| Ok(()))
            .sync_handler("sql", |_, _| Ok(()))
            .disable_handler("js");

        let table = options.handler_table();
        assert_eq!(table.len(), 1);
        assert!(table.get("sql").is_some());
    }

    #[test]
    fn test_disable_matches_dotted_extension() {
        let options = MigrateOptions::new()
            .sync_handler("sql", |_, _| Ok(()))
            .disable_handler(".sql");
        assert!(options.handler_table().is_empty());

        let options = MigrateOptions::new()
            .disable_handler("sql")
            .sync_handler(".sql", |_, _| Ok(()));
        let table = options.handler_table();
        assert_eq!(table.extensions().collect::<Vec<_>>(), vec!["sql"]);
    }

    #[test]
    fn test_before_each_accepts_bool() {
        let options =
            MigrateOptions::new().before_each(|file, _, _| !file.ends_with("1_core.sql"));
        let hook = &options.reporters.before_each;
        assert_eq!(
            hook(Path::new("m/1_core.sql"), "", Direction::UP),
            Disposition::Skip
        );
        assert_eq!(
            hook(Path::new("m/2_secondary.js"), "", Direction::UP),
            Disposition::Apply
        );
    }
}
