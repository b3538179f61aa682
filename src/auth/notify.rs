use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Out-of-band delivery of a freshly generated reset code.
#[async_trait]
pub trait ResetCodeNotifier: Send + Sync {
    async fn deliver(&self, email: &str, code: &str, expires_at: OffsetDateTime) -> anyhow::Result<()>;
}

/// Stands in for a mail sender: records the delivery in the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl ResetCodeNotifier for LogNotifier {
    async fn deliver(&self, email: &str, code: &str, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        info!(%email, %expires_at, "reset code issued");
        debug!(%email, %code, "reset code value");
        Ok(())
    }
}
