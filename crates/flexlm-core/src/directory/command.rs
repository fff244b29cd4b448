//! Directory backend that delegates to an external helper executable.
//!
//! The helper is called as `<program> <username>` and prints one
//! `attribute: value` pair per line (see [`parse_directory_output`]). A
//! non-zero exit or an output without known attributes means "not found".
//! This keeps protocol details (LDAP binds, search bases, credentials) in a
//! site-specific script such as a `Get-ADUser` or `ldapsearch` wrapper.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Directory, DirectoryEntry, DirectoryError, parse_directory_output};
use crate::collector::command::{CommandError, run_with_timeout};

/// Runs a helper command per lookup.
#[derive(Debug, Clone)]
pub struct CommandDirectory {
    program: String,
    timeout: Duration,
}

impl CommandDirectory {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the helper resolves to an executable file, either as a path
    /// or through `PATH`.
    pub fn is_runnable(&self) -> bool {
        find_executable(&self.program).is_some()
    }
}

/// Locates `program` the way the OS would when spawning it.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return is_executable(path).then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[async_trait]
impl Directory for CommandDirectory {
    async fn lookup(&self, username: &str) -> Result<DirectoryEntry, DirectoryError> {
        let args = [username.to_string()];
        let output = run_with_timeout(&self.program, &args, self.timeout)
            .await
            .map_err(|e| match e {
                CommandError::Timeout(t) => DirectoryError::Timeout(t),
                CommandError::Spawn(e) => DirectoryError::Unavailable(e.to_string()),
            })?;

        if !output.success() {
            debug!(
                username,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "directory helper reported no match"
            );
            return Err(DirectoryError::NotFound(username.to_string()));
        }

        parse_directory_output(&output.stdout)
            .ok_or_else(|| DirectoryError::NotFound(username.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn helper_script(body: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new()
            .prefix("dir-helper")
            .suffix(".sh")
            .tempfile()
            .unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        file.flush().unwrap();
        let path = file.into_temp_path();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_lookup_parses_helper_output() {
        let script = helper_script(
            r#"if [ "$1" = "jdoe" ]; then
  echo "displayName: Jane Doe"
  echo "l: Berlin"
  echo "department: Engineering"
  exit 0
fi
exit 1"#,
        );
        let dir = CommandDirectory::new(script.to_str().unwrap(), Duration::from_secs(5));

        let entry = dir.lookup("jdoe").await.unwrap();
        assert_eq!(entry.full_name, "Jane Doe");
        assert_eq!(entry.city, "Berlin");

        let err = dir.lookup("ghost").await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_times_out() {
        let script = helper_script("sleep 5");
        let dir = CommandDirectory::new(script.to_str().unwrap(), Duration::from_millis(100));
        assert!(matches!(
            dir.lookup("jdoe").await,
            Err(DirectoryError::Timeout(_))
        ));
    }

    #[test]
    fn test_runnable_check() {
        let script = helper_script("exit 0");
        let dir = CommandDirectory::new(script.to_str().unwrap(), Duration::from_secs(1));
        assert!(dir.is_runnable());

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!dir.is_runnable());

        let missing = CommandDirectory::new("/nonexistent/dir-helper", Duration::from_secs(1));
        assert!(!missing.is_runnable());
        assert!(find_executable("sh").is_some());
        assert!(find_executable("no-such-helper-on-path").is_none());
    }

    #[tokio::test]
    async fn test_missing_helper_is_unavailable() {
        let dir = CommandDirectory::new("/nonexistent/dir-helper", Duration::from_secs(1));
        assert!(matches!(
            dir.lookup("jdoe").await,
            Err(DirectoryError::Unavailable(_))
        ));
    }
}
