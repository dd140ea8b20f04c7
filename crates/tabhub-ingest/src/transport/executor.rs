use super::{Result, TransportProgress};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One acquisition strategy.
///
/// The orchestrator calls [`can_acquire`](Self::can_acquire) first and skips sources that
/// fail it; the check is best-effort and a `true` does not guarantee `acquire` succeeds.
#[async_trait]
pub trait TransportExecutor: Send + Sync {
    type Source: Send + Sync;

    /// Cheap pre-flight check (DNS, credentials, tool availability, identifiers)
    async fn can_acquire(&self, source: &Self::Source) -> bool;

    /// Fetch the source into `staging`, returning the path that was written
    async fn acquire(
        &self,
        source: &Self::Source,
        staging: &Path,
        progress: Option<&dyn TransportProgress>,
    ) -> Result<PathBuf>;

    /// Work that runs after a successful acquire (extraction, dumps)
    async fn post_process(&self, _source: &Self::Source, _staging: &Path) -> Result<()> {
        Ok(())
    }

    /// Short label for logs
    fn describe(&self, source: &Self::Source) -> String;
}
