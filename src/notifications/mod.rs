pub mod email;

pub use email::EmailSender;

use crate::error::Result;
use async_trait::async_trait;

/// Outbound notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message with the given subject and body
    async fn send(&self, subject: &str, body: &str) -> Result<()>;

    /// Channel name used in logs
    fn name(&self) -> &str;
}
