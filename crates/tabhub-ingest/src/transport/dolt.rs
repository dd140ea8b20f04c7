//! Dolt repositories: shallow clone, then dump every table as CSV

use super::{DoltSource, Result, TransportError, TransportExecutor, TransportProgress};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run `program` with `args` in `cwd`, failing on a non-zero exit status
pub(crate) async fn run_command<I, S>(program: &OsStr, args: I, cwd: &Path) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let rendered = args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    debug!(program = %program.to_string_lossy(), args = %rendered, cwd = %cwd.display(), "Running command");

    let output = Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(TransportError::Command {
            program: program.to_string_lossy().into_owned(),
            args: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `program` can be started at all
pub(crate) async fn program_available(program: &OsStr, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct DoltExecutor {
    program: PathBuf,
}

impl Default for DoltExecutor {
    fn default() -> Self {
        Self::new("dolt")
    }
}

impl DoltExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TransportExecutor for DoltExecutor {
    type Source = DoltSource;

    async fn can_acquire(&self, source: &DoltSource) -> bool {
        !source.repository.trim().is_empty()
            && program_available(self.program.as_os_str(), "version").await
    }

    async fn acquire(
        &self,
        source: &DoltSource,
        staging: &Path,
        _progress: Option<&dyn TransportProgress>,
    ) -> Result<PathBuf> {
        let name = source.local_name();
        let branch = format!("--branch={}", source.branch);
        run_command(
            self.program.as_os_str(),
            [
                "clone",
                "--depth=1",
                branch.as_str(),
                source.repository.as_str(),
                name,
            ],
            staging,
        )
        .await?;
        Ok(staging.join(name))
    }

    async fn post_process(&self, source: &DoltSource, staging: &Path) -> Result<()> {
        let directory = staging.join(source.local_name());
        let target = format!("--directory={}", directory.display());
        run_command(
            self.program.as_os_str(),
            ["dump", "-f", "--result-format=csv", target.as_str()],
            &directory,
        )
        .await?;
        Ok(())
    }

    fn describe(&self, source: &DoltSource) -> String {
        format!("dolt/{}", source.repository)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source() -> DoltSource {
        DoltSource {
            repository: "org/db".to_string(),
            branch: "master".to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_missing_program_cannot_acquire() {
        let executor = DoltExecutor::new("tabhub-no-such-dolt-binary");
        assert!(!executor.can_acquire(&source()).await);
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = DoltExecutor::new("tabhub-no-such-dolt-binary");
        let err = executor.acquire(&source(), dir.path(), None).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_command_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(OsStr::new("sh"), ["-c", "echo boom >&2; exit 3"], dir.path())
            .await
            .unwrap_err();
        match err {
            TransportError::Command { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "boom");
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(DoltExecutor::default().describe(&source()), "dolt/org/db");
    }
}
