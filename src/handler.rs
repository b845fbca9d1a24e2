//! Per-extension migration handlers
//!
//! Every handler is registered with an explicit calling convention instead of
//! having it inferred from its signature:
//!
//! - [`Handler::Synchronous`]: `(file, direction) -> Result`; returning `Err`
//!   fails the migration.
//! - [`Handler::CallbackBased`]: `(file, direction, done)`; the migration
//!   completes when `done` is signalled.

use crate::chain::Done;
use crate::direction::Direction;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use strum::Display;

type SyncFn = dyn Fn(&Path, Direction) -> anyhow::Result<()> + Send + Sync;
type CallbackFn = dyn Fn(&Path, Direction, Done) + Send + Sync;

/// A migration handler tagged with its calling convention
#[derive(Clone)]
pub enum Handler {
    Synchronous(Arc<SyncFn>),
    CallbackBased(Arc<CallbackFn>),
}

/// Calling convention of a [`Handler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum HandlerKind {
    Synchronous,
    CallbackBased,
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Path, Direction) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::Synchronous(Arc::new(f))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Path, Direction, Done) + Send + Sync + 'static,
    {
        Self::CallbackBased(Arc::new(f))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Synchronous(_) => HandlerKind::Synchronous,
            Self::CallbackBased(_) => HandlerKind::CallbackBased,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

/// Strip a leading dot so `.sql` and `sql` name the same extension
pub(crate) fn normalize_extension(ext: &str) -> &str {
    ext.strip_prefix('.').unwrap_or(ext)
}

/// Extension → handler mapping used to dispatch migration files
///
/// Extensions keep the order in which they were first registered; directory
/// expansion produces one pattern per extension in that order.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    entries: Vec<(String, Handler)>,
}

impl HandlerTable {
    /// Build a table from caller-supplied entries, dropping disabled (`None`) ones
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Handler>)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (ext, handler) in entries {
            if let Some(handler) = handler {
                table.insert(ext, handler);
            }
        }
        table
    }

    /// Register `handler` for `ext`, replacing any previous one in place
    pub fn insert(&mut self, ext: impl Into<String>, handler: Handler) {
        let ext = ext.into();
        let ext = normalize_extension(&ext).to_string();
        match self.entries.iter_mut().find(|(existing, _)| *existing == ext) {
            Some(slot) => slot.1 = handler,
            None => self.entries.push((ext, handler)),
        }
    }

    pub fn get(&self, ext: &str) -> Option<&Handler> {
        let ext = normalize_extension(ext);
        self.entries
            .iter()
            .find(|(existing, _)| existing == ext)
            .map(|(_, handler)| handler)
    }

    /// Handler for a file, looked up by its extension
    pub fn for_path(&self, path: &Path) -> Option<&Handler> {
        let ext = path.extension()?.to_str()?;
        self.get(ext)
    }

    /// Registered extensions in registration order
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(ext, _)| ext.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
