//! Migration orchestration
//!
//! A run has two phases:
//!
//! 1. **Setup** ([`prepare`]): validate handlers, resolve and expand the
//!    configured paths, digest every file, sort by order key. Any problem here
//!    is a [`SlyError`] returned before a single handler runs.
//! 2. **Execution** ([`migrate`]): one step per file, wrapped by `before_all`
//!    and `after_all`, driven by the chain engine. Failures reach the caller
//!    only through the completion callback.

use crate::chain::{chain, Done, Step};
use crate::direction::Direction;
use crate::discovery::{expand_patterns, resolve_paths};
use crate::error::{Result, SlyError};
use crate::handler::Handler;
use crate::options::{Disposition, MigrateOptions, Reporters};
use crate::record::MigrationRecord;
use anyhow::Context;
use std::path::Path;
use std::sync::mpsc;
use tracing::{debug, error, info};

/// A record paired with the handler that will apply it
#[derive(Debug, Clone)]
pub struct PlannedMigration {
    pub record: MigrationRecord,
    pub handler: Handler,
}

/// The sorted list of migrations a run will execute
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    direction: Direction,
    migrations: Vec<PlannedMigration>,
}

impl MigrationPlan {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn migrations(&self) -> &[PlannedMigration] {
        &self.migrations
    }

    pub fn records(&self) -> impl Iterator<Item = &MigrationRecord> {
        self.migrations.iter().map(|m| &m.record)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Sort by order key (string comparison), reversing the whole list for a
/// negative direction. Equal keys keep their discovery order.
pub fn sort_records(records: &mut [MigrationRecord], direction: Direction) {
    records.sort_by(|a, b| a.order_key.cmp(&b.order_key));
    if direction.is_reverse() {
        records.reverse();
    }
}

/// Run the setup phase and return the sorted plan
pub fn prepare(options: &MigrateOptions) -> Result<MigrationPlan> {
    let handlers = options.handler_table();
    if handlers.is_empty() {
        return Err(SlyError::NoHandlers);
    }

    let extensions: Vec<&str> = handlers.extensions().collect();
    let patterns = resolve_paths(&options.migration_paths, extensions.iter().copied());
    debug!("Resolved migration patterns: {:?}", patterns);

    let files = expand_patterns(&patterns)?;
    let mut records = files
        .iter()
        .map(MigrationRecord::from_file)
        .collect::<Result<Vec<_>>>()?;
    if records.is_empty() {
        return Err(SlyError::NoMigrationFiles);
    }

    sort_records(&mut records, options.direction);

    let migrations = records
        .into_iter()
        .map(|record| -> Result<PlannedMigration> {
            let handler = handlers
                .for_path(&record.file_path)
                .cloned()
                .ok_or_else(|| SlyError::MissingHandler {
                    extension: record.extension().unwrap_or_default().to_string(),
                    file: record.file_path.clone(),
                })?;
            Ok(PlannedMigration { record, handler })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MigrationPlan {
        direction: options.direction,
        migrations,
    })
}

fn report(
    reporters: &Reporters,
    file: &Path,
    digest: &str,
    direction: Direction,
    result: &anyhow::Result<()>,
) {
    match result {
        Ok(()) => {
            info!("Migration {} applied", file.display());
            (reporters.success)(file, digest, direction);
        }
        Err(err) => {
            error!("Migration {} failed: {:#}", file.display(), err);
            (reporters.failure)(file, digest, direction, err);
        }
    }
}

fn migration_step(
    migration: PlannedMigration,
    direction: Direction,
    reporters: Reporters,
) -> Step {
    Step::callback(move |done| {
        let PlannedMigration { record, handler } = migration;
        let file = record.file_path;
        let digest = record.content_digest;

        if (reporters.before_each)(&file, &digest, direction) == Disposition::Skip {
            debug!("Skipping migration {}", file.display());
            return done.succeed();
        }

        info!(
            "Applying migration {} ({}, direction {})",
            file.display(),
            handler.kind(),
            direction
        );
        match handler {
            Handler::Synchronous(handler) => {
                let result = handler(&file, direction);
                report(&reporters, &file, &digest, direction, &result);
                done.finish(result);
            }
            Handler::CallbackBased(handler) => {
                let reported = {
                    let file = file.clone();
                    Done::new(move |result| {
                        report(&reporters, &file, &digest, direction, &result);
                        done.finish(result);
                    })
                };
                handler(&file, direction, reported);
            }
        }
    })
}

/// Build the full step list: `before_all`, one step per migration, `after_all`
pub fn build_steps(
    plan: MigrationPlan,
    reporters: &Reporters,
    before_all: Step,
    after_all: Step,
) -> Vec<Step> {
    let direction = plan.direction;
    let mut steps = Vec::with_capacity(plan.len() + 2);
    steps.push(before_all);
    steps.extend(
        plan.migrations
            .into_iter()
            .map(|migration| migration_step(migration, direction, reporters.clone())),
    );
    steps.push(after_all);
    steps
}

/// Apply every configured migration in order
///
/// Returns `Err` only for configuration problems found during setup. Once
/// execution starts, the outcome is delivered exactly once to `on_complete`.
/// The call returns when the run completes or suspends on a callback that has
/// not fired yet.
pub fn migrate<F>(options: MigrateOptions, on_complete: F) -> Result<()>
where
    F: FnOnce(anyhow::Result<()>) + Send + 'static,
{
    let plan = prepare(&options)?;
    info!(
        "Running {} migration(s), direction {}",
        plan.len(),
        plan.direction()
    );

    let MigrateOptions {
        before_all,
        after_all,
        reporters,
        ..
    } = options;
    let steps = build_steps(plan, &reporters, before_all, after_all);

    chain(steps, move |result| {
        match &result {
            Ok(()) => info!("Migration run complete"),
            Err(err) => error!("Migration run aborted: {:#}", err),
        }
        on_complete(result);
    })
    .run();
    Ok(())
}

/// Run [`migrate`] and block until the completion callback fires
///
/// If every completion handle is dropped without being signalled the run can
/// never finish; that is reported as an error instead of hanging.
pub fn migrate_blocking(options: MigrateOptions) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    migrate(options, move |result| {
        // Receiver only disappears if the caller gave up waiting
        let _ = tx.send(result);
    })?;
    rx.recv()
        .context("Migration run stalled: a step dropped its completion handle")?
}
