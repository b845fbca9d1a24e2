//! sly - Main entry point
//!
//! Loads `sly.json`, layers command-line overrides on top, and drives the
//! migration engine with external-program handlers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use sly::cli::{Cli, Commands};
use sly::config_file::{MigrationPaths, ProjectConfig, DEFAULT_CONFIG_FILE};
use sly::{migrate_blocking, prepare, Direction, MigrateOptions, DEFAULT_MIGRATION_DIR};

/// Initialize the logger with appropriate settings
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    // Allows RUST_LOG env var to override
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => std::env::current_dir()
            .context("Failed to determine working directory")?
            .join(DEFAULT_CONFIG_FILE),
    };

    match cli.command {
        Commands::Up { paths } => run_migrations(&config_path, paths, Direction::UP, cli.dry_run),
        Commands::Down { paths } => {
            run_migrations(&config_path, paths, Direction::DOWN, cli.dry_run)
        }
        Commands::Plan { down, paths } => {
            let direction = if down { Direction::DOWN } else { Direction::UP };
            show_plan(&config_path, paths, direction)
        }
        Commands::Validate => validate_config(&config_path),
        Commands::Init { force } => init_project(&config_path, force),
    }
}

/// Directory that relative paths in the config file are resolved against
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the project config and apply command-line overrides
fn load_options(
    config_path: &Path,
    paths: Vec<PathBuf>,
    direction: Direction,
    dry_run: bool,
) -> Result<MigrateOptions> {
    info!("Loading configuration from: {:?}", config_path);
    let config = ProjectConfig::load_from_file(config_path)?;

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let overrides = ProjectConfig {
        migration_paths: MigrationPaths::anchored(paths, &cwd),
        direction: Some(direction),
        ..ProjectConfig::default()
    };
    let config = config.merge(overrides);
    config.validate()?;

    Ok(config.into_options(&base_dir(config_path), dry_run))
}

fn run_migrations(
    config_path: &Path,
    paths: Vec<PathBuf>,
    direction: Direction,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        info!("Dry-run mode: handler commands will be logged, not executed");
    }

    let options = load_options(config_path, paths, direction, dry_run)?
        .on_success(|file, digest, _| println!("✓ {} ({})", file.display(), digest))
        .on_failure(|file, _, _, err| eprintln!("✗ {}: {:#}", file.display(), err));

    match migrate_blocking(options) {
        Ok(()) => {
            println!("Migration complete");
            Ok(())
        }
        Err(err) => {
            error!("Migration failed: {:#}", err);
            eprintln!("\n✗ Migration failed: {:#}", err);
            std::process::exit(1);
        }
    }
}

fn show_plan(config_path: &Path, paths: Vec<PathBuf>, direction: Direction) -> Result<()> {
    let options = load_options(config_path, paths, direction, true)?;
    let plan = prepare(&options)?;

    println!(
        "{} migration(s), direction {}:",
        plan.len(),
        plan.direction()
    );
    for migration in plan.migrations() {
        let record = &migration.record;
        println!(
            "  {:>8}  {}  {}  [{}]",
            record.order_key,
            &record.content_digest[..12],
            record.file_path.display(),
            migration.handler.kind()
        );
    }
    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_path);
    let config = ProjectConfig::load_from_file(config_path)?;
    match config.validate() {
        Ok(()) => {
            info!("Configuration validation successful");
            println!("✓ Configuration file is valid: {}", config_path.display());
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_project(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    ProjectConfig::starter().save_to_file(config_path)?;
    let migrations_dir = base_dir(config_path).join(DEFAULT_MIGRATION_DIR);
    std::fs::create_dir_all(&migrations_dir)
        .with_context(|| format!("Failed to create {}", migrations_dir.display()))?;

    println!("✓ Wrote {}", config_path.display());
    println!("✓ Migrations directory: {}", migrations_dir.display());
    Ok(())
}
