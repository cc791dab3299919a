// Apps file: one launch per line, comma-separated
//
//   workingDirectory, executablePath, [arg]*, mode, settleSeconds
//
// Lines starting with `#` are comments.

use crate::error::{AppKeeperError, Result};
use crate::process::types::{LaunchMode, LaunchSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fewest fields a usable row can have
pub const MIN_FIELDS: usize = 3;

/// One non-comment line of the apps file, split and trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRow {
    /// 1-based line number in the source file
    pub line: usize,
    pub fields: Vec<String>,
}

/// A launch derived from a well-formed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupEntry {
    pub spec: LaunchSpec,
    /// Pause after this launch before the next row is processed
    pub settle: Duration,
}

/// Split apps file text into rows, dropping blank lines and comments
pub fn parse_rows(contents: &str) -> Vec<ConfigRow> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(ConfigRow {
                line: idx + 1,
                fields: trimmed.split(',').map(|f| f.trim().to_string()).collect(),
            })
        })
        .collect()
}

/// Read the apps file at `path`
///
/// An unreadable file is logged and treated as empty; the daemon then
/// runs with no preconfigured apps.
pub fn load_rows(path: &Path) -> Vec<ConfigRow> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let rows = parse_rows(&contents);
            tracing::info!("Loaded {} row(s) from {}", rows.len(), path.display());
            rows
        }
        Err(e) => {
            let err = AppKeeperError::ConfigFileUnreadable(path.display().to_string(), e.to_string());
            tracing::warn!("{}; starting with no preconfigured apps", err);
            Vec::new()
        }
    }
}

impl TryFrom<&ConfigRow> for StartupEntry {
    type Error = AppKeeperError;

    fn try_from(row: &ConfigRow) -> Result<Self> {
        let malformed = |reason: String| AppKeeperError::ConfigRowMalformed(row.line, reason);
        let fields = &row.fields;

        if fields.len() < MIN_FIELDS {
            return Err(malformed(format!(
                "expected at least {} fields, found {}",
                MIN_FIELDS,
                fields.len()
            )));
        }

        let path = &fields[1];
        if path.is_empty() {
            return Err(malformed("executable path is empty".to_string()));
        }

        // Three fields carry no settle time; otherwise the last two are mode and settle
        let (mode_field, settle_field, args) = if fields.len() == MIN_FIELDS {
            (&fields[2], None, &fields[2..2])
        } else {
            let n = fields.len();
            (&fields[n - 2], Some(&fields[n - 1]), &fields[2..n - 2])
        };

        let mode_value: i64 = mode_field
            .parse()
            .map_err(|_| malformed(format!("mode '{}' is not an integer", mode_field)))?;
        let mode = LaunchMode::try_from(mode_value).map_err(|e| malformed(e.to_string()))?;

        let settle_secs: u64 = match settle_field {
            Some(value) => value.parse().map_err(|_| {
                malformed(format!("settle time '{}' is not a whole number", value))
            })?,
            None => 0,
        };

        Ok(StartupEntry {
            spec: LaunchSpec::new(
                path.as_str(),
                args.to_vec(),
                Some(PathBuf::from(&fields[0])),
                mode,
            ),
            settle: Duration::from_secs(settle_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::home_directory;
    use std::fs;
    use tempfile::TempDir;

    fn entry(line: &str) -> Result<StartupEntry> {
        let rows = parse_rows(line);
        assert_eq!(rows.len(), 1);
        StartupEntry::try_from(&rows[0])
    }

    #[test]
    fn test_parse_rows_skips_comments_and_blanks() {
        let contents = "# apps\n\n  # indented comment\n/home,/bin/true,0,0\n   \n/tmp , /bin/sleep , 5 , 1 , 2\n";
        let rows = parse_rows(contents);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 4);
        assert_eq!(rows[0].fields, vec!["/home", "/bin/true", "0", "0"]);
        assert_eq!(rows[1].line, 6);
        assert_eq!(rows[1].fields, vec!["/tmp", "/bin/sleep", "5", "1", "2"]);
    }

    #[test]
    fn test_run_once_row_without_args() {
        let entry = entry("/home/user,/bin/true,0,0").unwrap();
        assert_eq!(entry.spec.path, PathBuf::from("/bin/true"));
        assert!(entry.spec.args.is_empty());
        assert_eq!(entry.spec.mode, LaunchMode::RunOnce);
        assert_eq!(entry.spec.working_directory, PathBuf::from("/home/user"));
        assert_eq!(entry.settle, Duration::ZERO);
    }

    #[test]
    fn test_monitor_row() {
        let entry = entry("/home/user,/bin/false,1,0").unwrap();
        assert_eq!(entry.spec.mode, LaunchMode::Monitor);
    }

    #[test]
    fn test_row_with_args_and_settle() {
        let entry = entry("/srv, /usr/bin/app, --port, 8080, 2, 3").unwrap();
        assert_eq!(entry.spec.args, vec!["--port", "8080"]);
        assert_eq!(entry.spec.mode, LaunchMode::Test);
        assert_eq!(entry.settle, Duration::from_secs(3));
    }

    #[test]
    fn test_three_field_row_has_no_settle() {
        let entry = entry("/srv,/usr/bin/app,1").unwrap();
        assert_eq!(entry.spec.mode, LaunchMode::Monitor);
        assert!(entry.spec.args.is_empty());
        assert_eq!(entry.settle, Duration::ZERO);
    }

    #[test]
    fn test_empty_working_directory_defaults_to_home() {
        let entry = entry(",/bin/true,0,0").unwrap();
        assert_eq!(entry.spec.working_directory, home_directory());
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        assert!(matches!(
            entry("onlyonefield"),
            Err(AppKeeperError::ConfigRowMalformed(1, _))
        ));
        assert!(matches!(
            entry("/home,/bin/true"),
            Err(AppKeeperError::ConfigRowMalformed(1, _))
        ));
    }

    #[test]
    fn test_bad_mode_is_malformed() {
        assert!(matches!(
            entry("/home,/bin/true,monitor,0"),
            Err(AppKeeperError::ConfigRowMalformed(_, _))
        ));
        assert!(matches!(
            entry("/home,/bin/true,7,0"),
            Err(AppKeeperError::ConfigRowMalformed(_, _))
        ));
    }

    #[test]
    fn test_bad_settle_is_malformed() {
        assert!(matches!(
            entry("/home,/bin/true,0,soon"),
            Err(AppKeeperError::ConfigRowMalformed(_, _))
        ));
        assert!(matches!(
            entry("/home,/bin/true,0,-1"),
            Err(AppKeeperError::ConfigRowMalformed(_, _))
        ));
    }

    #[test]
    fn test_empty_path_is_malformed() {
        assert!(matches!(
            entry("/home,,0,0"),
            Err(AppKeeperError::ConfigRowMalformed(_, _))
        ));
    }

    #[test]
    fn test_load_rows_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apps.conf");
        fs::write(&path, "# comment\n/tmp,/bin/true,0,0\n").unwrap();

        let rows = load_rows(&path);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_load_rows_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let rows = load_rows(&temp_dir.path().join("missing.conf"));
        assert!(rows.is_empty());
    }
}
