//! LISTEN/NOTIFY observers.

use pgfoundation_core::error::Result;
use pgfoundation_core::Notification;

use crate::client::{Client, ClientContext, client_type};
use crate::session::Session;

/// Client listening on one notification channel.
///
/// Registration issues `LISTEN`; shutdown issues `UNLISTEN` while the
/// connection is still open. Notifications for other channels stay queued
/// on the connection for their own observers.
#[derive(Debug)]
pub struct Observer {
    channel: String,
    context: ClientContext,
}

impl Observer {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            context: ClientContext::new(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next pending notification on this channel, if any.
    pub fn get_notification(&self) -> Result<Option<Notification>> {
        let session = self.context.session()?;
        let mut connection = session.connection()?;
        connection.next_notification(&self.channel)
    }

    /// Send `NOTIFY` on this channel.
    pub fn notify(&self, payload: &str) -> Result<()> {
        let session = self.context.session()?;
        let mut connection = session.connection()?;
        let sql = format!(
            "NOTIFY {}, {}",
            connection.escape_identifier(&self.channel),
            connection.escape_literal(payload)
        );
        connection.execute_raw(&sql)?;
        Ok(())
    }
}

impl Client for Observer {
    fn client_type(&self) -> &str {
        client_type::OBSERVER
    }

    fn client_identifier(&self) -> &str {
        &self.channel
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn initialize(&self, session: &Session) -> Result<()> {
        self.context.bind(session);
        let mut connection = session.connection()?;
        let sql = format!("LISTEN {}", connection.escape_identifier(&self.channel));
        connection.execute_raw(&sql)?;
        tracing::debug!(channel = %self.channel, "Listening");
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let Ok(session) = self.context.session() else {
            return Ok(());
        };
        let mut connection = session.connection()?;
        if connection.is_open() {
            let sql = format!("UNLISTEN {}", connection.escape_identifier(&self.channel));
            connection.execute_raw(&sql)?;
        }
        Ok(())
    }
}
