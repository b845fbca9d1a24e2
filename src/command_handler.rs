//! External Program Handlers
//!
//! Runs one external program per migration file, which is how the `sly`
//! binary talks to real datastores (`psql`, `mysql`, `sqlite3`, `sh`, ...).
//!
//! # Argument Contract
//!
//! Arguments may contain two placeholders, substituted per invocation:
//!
//! - `{file}`: path of the migration file (empty for `beforeAll`/`afterAll`)
//! - `{direction}`: the signed direction value
//!
//! The same values are exported to the child as `SLY_MIGRATION_FILE` and
//! `SLY_DIRECTION`, followed by any configured environment variables.

use crate::chain::Step;
use crate::direction::Direction;
use crate::handler::Handler;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub const FILE_PLACEHOLDER: &str = "{file}";
pub const DIRECTION_PLACEHOLDER: &str = "{direction}";
pub const FILE_ENV: &str = "SLY_MIGRATION_FILE";
pub const DIRECTION_ENV: &str = "SLY_DIRECTION";

/// A program invoked once per migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHandler {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Log the command instead of spawning it
    pub dry_run: bool,
}

impl CommandHandler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            dry_run: false,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Arguments with placeholders substituted
    pub fn expand_args(&self, file: &str, direction: Direction) -> Vec<String> {
        let direction = direction.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(FILE_PLACEHOLDER, file)
                    .replace(DIRECTION_PLACEHOLDER, &direction)
            })
            .collect()
    }

    /// Environment for the child: the fixed contract first, then configured pairs
    pub fn env_vars(&self, file: &str, direction: Direction) -> Vec<(String, String)> {
        let mut vars = vec![
            (FILE_ENV.to_string(), file.to_string()),
            (DIRECTION_ENV.to_string(), direction.to_string()),
        ];
        vars.extend(self.env.iter().cloned());
        vars
    }

    /// Execute the program for `file`, capturing its output
    ///
    /// Returns `Err` only when the program cannot be spawned or waited on; a
    /// non-zero exit is reported through [`CommandOutput::success`].
    pub fn run(&self, file: Option<&Path>, direction: Direction) -> Result<CommandOutput> {
        let file = file
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args = self.expand_args(&file, direction);
        let env_vars = self.env_vars(&file, direction);

        info!(
            "{}run_command: {} args={:?} env={:?}",
            if self.dry_run { "[DRY RUN] " } else { "" },
            self.program,
            args,
            env_vars
        );

        if self.dry_run {
            return Ok(CommandOutput {
                stdout: format!("[DRY RUN] Skipped: {} {}\n", self.program, args.join(" ")),
                stderr: String::new(),
                exit_code: Some(0),
                success: true,
                dry_run: true,
            });
        }

        let output = Command::new(&self.program)
            .args(&args)
            .envs(env_vars)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to run command: {}", self.program))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
            dry_run: false,
        };
        if result.success {
            debug!("Command {} executed successfully", self.program);
        } else {
            info!(
                "Command {} failed with exit code {}",
                self.program,
                result.exit_code.unwrap_or(-1)
            );
        }
        Ok(result)
    }

    /// Wrap as a synchronous migration handler
    pub fn into_handler(self) -> Handler {
        Handler::sync(move |file, direction| {
            self.run(Some(file), direction)?
                .ensure_success(&format!("Migration {}", file.display()))
        })
    }

    /// Wrap as a `beforeAll`/`afterAll` hook step
    pub fn into_step(self, name: &'static str, direction: Direction) -> Step {
        Step::sync(move || self.run(None, direction)?.ensure_success(name))
    }
}

/// Output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// Whether the command was skipped because of dry-run mode.
    pub dry_run: bool,
}

impl CommandOutput {
    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.unwrap_or(-1);
            anyhow::bail!(
                "{} failed (exit code {}): {}",
                context,
                code,
                self.stderr.trim()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_substituted() {
        let handler = CommandHandler::new("psql").args(["-v", "dir={direction}", "-f", "{file}"]);
        assert_eq!(
            handler.expand_args("migrations/1_core.sql", Direction::DOWN),
            vec!["-v", "dir=-1", "-f", "migrations/1_core.sql"]
        );
    }

    #[test]
    fn test_env_contract_comes_first() {
        let handler = CommandHandler::new("sh").env("PGDATABASE", "app");
        let vars = handler.env_vars("m/1_core.sql", Direction::UP);
        assert_eq!(vars[0], (FILE_ENV.to_string(), "m/1_core.sql".to_string()));
        assert_eq!(vars[1], (DIRECTION_ENV.to_string(), "1".to_string()));
        assert_eq!(vars[2], ("PGDATABASE".to_string(), "app".to_string()));
    }

    #[test]
    fn test_dry_run_does_not_spawn() {
        let handler = CommandHandler::new("definitely-not-a-real-program").dry_run(true);
        let output = handler
            .run(Some(Path::new("m/1_core.sql")), Direction::UP)
            .unwrap();
        assert!(output.dry_run);
        assert!(output.success);
        assert!(output.stdout.contains("DRY RUN"));
    }

    #[test]
    fn test_ensure_success_reports_stderr() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "ERROR: relation \"users\" already exists\n".to_string(),
            exit_code: Some(3),
            success: false,
            dry_run: false,
        };
        let err = output.ensure_success("Migration 1_core.sql").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Migration 1_core.sql failed (exit code 3): ERROR: relation \"users\" already exists"
        );
    }

    #[test]
    fn test_missing_program_is_error() {
        let handler = CommandHandler::new("definitely-not-a-real-program");
        assert!(handler.run(None, Direction::UP).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_program_with_env() {
        let handler =
            CommandHandler::new("sh").args(["-c", "echo \"$SLY_MIGRATION_FILE $SLY_DIRECTION\""]);
        let output = handler
            .run(Some(Path::new("m/2_secondary.sh")), Direction::DOWN)
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "m/2_secondary.sh -1");
    }

    #[cfg(unix)]
    #[test]
    fn test_into_handler_fails_on_non_zero_exit() {
        let handler = CommandHandler::new("sh")
            .args(["-c", "echo broken >&2; exit 2"])
            .into_handler();
        let Handler::Synchronous(run) = handler else {
            panic!("command handlers are synchronous");
        };
        let err = run(Path::new("m/1_core.sql"), Direction::UP).unwrap_err();
        assert!(err.to_string().contains("exit code 2"));
        assert!(err.to_string().contains("broken"));
    }
}
