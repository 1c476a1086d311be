//! Mailbox work source for the polling driver.

use std::sync::Arc;

use async_trait::async_trait;
use meetflow_engine::{EngineError, ItemKey, Result, WorkSource};
use tracing::{debug, info, warn};

use crate::MailWorkspace;
use crate::collab::MailFetcher;
use crate::meeting::MailItem;

const SOURCE: &str = "mailbox_source";

/// Polls the mailbox and admits relevant messages into the workspace.
///
/// A message is admitted only when the authorized user appears as its
/// sender or a copied party; everything else in the mailbox is left
/// alone.  Messages already in flight (same id) are not re-admitted, so
/// re-fetching unread mail between batches cannot duplicate work.
pub struct MailboxSource {
    fetcher: Arc<dyn MailFetcher>,
    authorized_user: String,
}

impl MailboxSource {
    /// `authorized_user` must already be a normalized bare address.
    pub fn new(fetcher: Arc<dyn MailFetcher>, authorized_user: String) -> Self {
        Self {
            fetcher,
            authorized_user,
        }
    }
}

#[async_trait]
impl WorkSource<MailWorkspace> for MailboxSource {
    async fn poll(&self, ws: &MailWorkspace) -> Result<Vec<ItemKey>> {
        let messages = self
            .fetcher
            .fetch_unread()
            .await
            .map_err(|e| EngineError::Execution {
                node: SOURCE,
                reason: e.to_string(),
            })?;
        debug!(fetched = messages.len(), "mailbox polled");

        let mut admitted = Vec::new();
        for message in messages {
            if !message.involves(&self.authorized_user) {
                debug!(id = %message.id, "message does not involve the authorized user; skipping");
                continue;
            }
            let key = ItemKey::new(message.id.clone());
            if ws.contains(&key) {
                warn!(id = %message.id, "message already in flight; skipping");
                continue;
            }
            ws.insert(key.clone(), MailItem::new(message));
            admitted.push(key);
        }

        if !admitted.is_empty() {
            info!(admitted = admitted.len(), "messages admitted for processing");
        }
        Ok(admitted)
    }
}
