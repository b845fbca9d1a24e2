//! sly migration library
//!
//! Applies an ordered set of migration scripts against an external datastore.
//! Each file extension has its own handler, either synchronous or
//! callback-based; both report success and failure through the same
//! sequential, short-circuiting chain.

pub mod chain;
pub mod cli;
pub mod command_handler;
pub mod config_file;
pub mod direction;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod migrate;
pub mod options;
pub mod record;

// Re-export main types for convenience
pub use chain::{chain, Chain, Done, Step, StepState};
pub use command_handler::{CommandHandler, CommandOutput};
pub use config_file::{CommandSpec, ProjectConfig};
pub use direction::Direction;
pub use error::{Result, SlyError};
pub use handler::{Handler, HandlerKind, HandlerTable};
pub use migrate::{
    build_steps, migrate, migrate_blocking, prepare, sort_records, MigrationPlan,
    PlannedMigration,
};
pub use options::{Disposition, MigrateOptions, Reporters, DEFAULT_MIGRATION_DIR};
pub use record::{content_digest, MigrationRecord};
