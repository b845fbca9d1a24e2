use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sly - apply ordered migration scripts with per-extension handlers
#[derive(Parser)]
#[command(name = "sly")]
#[command(about = "Apply ordered migration scripts with per-extension handlers")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (default: ./sly.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dry-run mode: log handler commands without executing them.
    ///
    /// Files are still discovered, digested and reported, so the output
    /// shows exactly which migrations would run and in which order.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run migrations in ascending order
    Up {
        /// Migration directory, file or glob pattern (overrides the config)
        #[arg(short, long = "path")]
        paths: Vec<PathBuf>,
    },
    /// Run migrations in descending order
    Down {
        /// Migration directory, file or glob pattern (overrides the config)
        #[arg(short, long = "path")]
        paths: Vec<PathBuf>,
    },
    /// Show which migrations would run, in order, with their digests
    Plan {
        /// Show the descending order
        #[arg(long)]
        down: bool,
        /// Migration directory, file or glob pattern (overrides the config)
        #[arg(short, long = "path")]
        paths: Vec<PathBuf>,
    },
    /// Validate the configuration file
    Validate,
    /// Write a starter configuration and create the migrations directory
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["sly"]).is_err());
    }

    #[test]
    fn test_cli_up_with_paths() {
        let cli = Cli::try_parse_from([
            "sly",
            "up",
            "--path",
            "db/migrations",
            "-p",
            "db/seeds/1_users.sql",
        ])
        .unwrap();
        match cli.command {
            Commands::Up { paths } => {
                assert_eq!(
                    paths,
                    vec![
                        PathBuf::from("db/migrations"),
                        PathBuf::from("db/seeds/1_users.sql")
                    ]
                );
            }
            _ => panic!("Expected Up command"),
        }
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["sly", "down", "--dry-run", "--config", "/srv/sly.json"]).unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.config, Some(PathBuf::from("/srv/sly.json")));
        assert!(matches!(cli.command, Commands::Down { .. }));
    }

    #[test]
    fn test_cli_plan_down() {
        let cli = Cli::try_parse_from(["sly", "plan", "--down"]).unwrap();
        match cli.command {
            Commands::Plan { down, paths } => {
                assert!(down);
                assert!(paths.is_empty());
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_cli_init_force() {
        let cli = Cli::try_parse_from(["sly", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { force: true }));
    }
}
