//! Migration file discovery
//!
//! Turns configured paths into concrete files in two passes:
//!
//! 1. [`resolve_paths`] probes each configured path. A directory becomes one
//!    pattern per handler extension, a file passes through, a glob pattern
//!    passes through, anything else is dropped without complaint.
//! 2. [`expand_patterns`] runs every pattern through `glob`, concatenating in
//!    pattern order then match order. No sorting happens here.

use crate::error::{Result, SlyError};
use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const GLOB_METACHARACTERS: &[char] = &['*', '?', '['];

fn is_glob_pattern(path: &str) -> bool {
    path.contains(GLOB_METACHARACTERS)
}

/// Resolve configured paths into glob patterns
///
/// A directory expands to `<dir>/*.<ext>` for each extension, matching only
/// its direct children.
pub fn resolve_paths<'a, P, E>(paths: P, extensions: E) -> Vec<String>
where
    P: IntoIterator<Item = &'a PathBuf>,
    E: IntoIterator<Item = &'a str> + Clone,
{
    let mut patterns = Vec::new();
    for path in paths {
        let raw = path.to_string_lossy();
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                let dir = Pattern::escape(&raw);
                let dir = dir.trim_end_matches('/');
                for ext in extensions.clone() {
                    patterns.push(format!("{}/*.{}", dir, ext));
                }
            }
            Ok(_) => patterns.push(Pattern::escape(&raw)),
            Err(_) if is_glob_pattern(&raw) => patterns.push(raw.into_owned()),
            Err(err) => debug!("Skipping migration path {:?}: {}", path, err),
        }
    }
    patterns
}

/// Expand glob patterns into the regular files they match
pub fn expand_patterns<I, S>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches =
            glob::glob_with(pattern, match_options()).map_err(|source| SlyError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
        for entry in matches {
            let path = entry.map_err(|err| SlyError::Io(err.into_error()))?;
            if is_regular_file(&path) {
                files.push(path);
            }
        }
        debug!("Pattern {} matched {} file(s) so far", pattern, files.len());
    }
    Ok(files)
}

/// Hidden files only match when the pattern spells out the leading dot
fn match_options() -> MatchOptions {
    MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2_secondary.js", "1_core.sql", "3_tertiary.c"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("nested").join("4_deep.sql")).unwrap();
        dir
    }

    #[test]
    fn test_directory_expands_per_extension() {
        let dir = fixture();
        let paths = vec![dir.path().to_path_buf()];
        let patterns = resolve_paths(&paths, ["sql", "js"]);

        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].ends_with("/*.sql"));
        assert!(patterns[1].ends_with("/*.js"));

        let files = expand_patterns(&patterns).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        // Pattern order, not name order; nested directories are not searched
        assert_eq!(names, vec!["1_core.sql", "2_secondary.js"]);
    }

    #[test]
    fn test_explicit_file_passes_through() {
        let dir = fixture();
        let paths = vec![dir.path().join("3_tertiary.c")];
        let files = expand_patterns(resolve_paths(&paths, ["sql"])).unwrap();
        assert_eq!(files, vec![dir.path().join("3_tertiary.c")]);
    }

    #[test]
    fn test_missing_path_is_dropped() {
        let paths = vec![PathBuf::from("/definitely/not/here")];
        assert!(resolve_paths(&paths, ["sql"]).is_empty());
    }

    #[test]
    fn test_glob_pattern_passes_through() {
        let dir = fixture();
        let pattern = dir.path().join("*_*.c");
        let paths = vec![pattern.clone()];
        let patterns = resolve_paths(&paths, ["sql"]);
        assert_eq!(patterns, vec![pattern.to_string_lossy().into_owned()]);

        let files = expand_patterns(&patterns).unwrap();
        assert_eq!(files, vec![dir.path().join("3_tertiary.c")]);
    }

    #[test]
    fn test_hidden_files_are_not_discovered() {
        let dir = fixture();
        File::create(dir.path().join("._1_core.sql")).unwrap();
        File::create(dir.path().join(".1_core.sql.swp.sql")).unwrap();

        let paths = vec![dir.path().to_path_buf()];
        let files = expand_patterns(resolve_paths(&paths, ["sql"])).unwrap();
        assert_eq!(files, vec![dir.path().join("1_core.sql")]);

        // Named explicitly, a hidden file is still picked up
        let paths = vec![dir.path().join("._1_core.sql")];
        let files = expand_patterns(resolve_paths(&paths, ["sql"])).unwrap();
        assert_eq!(files, vec![dir.path().join("._1_core.sql")]);
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let err = expand_patterns(["[unclosed"]).unwrap_err();
        assert!(matches!(err, SlyError::Pattern { .. }));
    }
}
