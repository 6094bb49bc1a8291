//! Message store seam
//!
//! The consolidation pipeline only sees [`MessageStore`]. [`ImapStore`] is the
//! shipped adapter over one authenticated IMAP session.

use async_trait::async_trait;

use crate::config::{AccountConfig, ServerConfig};
use crate::errors::AppResult;
use crate::imap::{self, ImapSession};
use crate::query::SearchQuery;

/// Full source of one fetched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub uid: u32,
    /// RFC 822 bytes
    pub source: Vec<u8>,
    /// Store arrival date (RFC 2822), if reported
    pub internal_date: Option<String>,
}

/// Searchable, fetchable mailbox store
#[async_trait]
pub trait MessageStore: Send {
    /// UIDs of messages in `mailbox` matching `query`, ascending
    async fn search(&mut self, mailbox: &str, query: &SearchQuery) -> AppResult<Vec<u32>>;

    /// Fetch one message without altering its flags
    ///
    /// Returns `NotFound` if the message no longer exists.
    async fn fetch_message(&mut self, mailbox: &str, uid: u32) -> AppResult<RawMessage>;
}

/// [`MessageStore`] over a read-only IMAP session
pub struct ImapStore<'a> {
    config: &'a ServerConfig,
    session: ImapSession,
    /// Mailbox currently examined, as requested (not UTF-7 encoded)
    selected: Option<String>,
}

impl<'a> ImapStore<'a> {
    /// Connect and authenticate `account`
    pub async fn connect(config: &'a ServerConfig, account: &AccountConfig) -> AppResult<Self> {
        let session = imap::connect_authenticated(config, account).await?;
        Ok(Self {
            config,
            session,
            selected: None,
        })
    }

    async fn ensure_examined(&mut self, mailbox: &str) -> AppResult<()> {
        if self.selected.as_deref() == Some(mailbox) {
            return Ok(());
        }
        let wire_name = utf7_imap::encode_utf7_imap(mailbox.to_owned());
        let exists = imap::examine_mailbox(self.config, &mut self.session, &wire_name).await?;
        tracing::debug!(mailbox, exists, "mailbox examined");
        self.selected = Some(mailbox.to_owned());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for ImapStore<'_> {
    async fn search(&mut self, mailbox: &str, query: &SearchQuery) -> AppResult<Vec<u32>> {
        self.ensure_examined(mailbox).await?;
        imap::uid_search(self.config, &mut self.session, &query.predicate).await
    }

    async fn fetch_message(&mut self, mailbox: &str, uid: u32) -> AppResult<RawMessage> {
        self.ensure_examined(mailbox).await?;
        let (source, internal_date) =
            imap::fetch_message_source(self.config, &mut self.session, uid).await?;
        Ok(RawMessage {
            uid,
            source,
            internal_date,
        })
    }
}
