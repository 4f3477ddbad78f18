//! Poolers: per-type client factories with get-or-create semantics.
//!
//! Asking a pooler for an identifier first looks in the session's registry.
//! A hit returns the registered instance untouched; a miss builds the client,
//! registers it (which binds it to the session) and returns it. Two calls
//! with the same identifier therefore yield the same `Rc`.

mod converter;
mod inspector;
mod notification;
mod query;

pub use converter::ConverterPooler;
pub use inspector::InspectorPooler;
pub use notification::{ListenerPooler, ObserverPooler};
pub use query::{PreparedStatementPooler, QueryManagerPooler, QueryPooler};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use crate::client::{AsAnyRc, Client};
use crate::session::{Session, SessionInner};

pub trait Pooler: AsAnyRc {
    /// Client type this pooler creates.
    fn pooler_type(&self) -> &str;

    fn context(&self) -> &PoolerContext;

    /// Bind the pooler to the session registering it.
    fn register(&self, session: &Session) {
        self.context().bind(session);
    }

    /// Return the client for `identifier`, creating it on first use.
    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>>;
}

/// Weak back-reference from a pooler to its session.
#[derive(Debug, Default)]
pub struct PoolerContext {
    session: RefCell<Weak<SessionInner>>,
}

impl PoolerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, session: &Session) {
        *self.session.borrow_mut() = session.downgrade();
    }

    pub fn session(&self) -> Result<Session> {
        Session::upgrade(&self.session.borrow()).ok_or_else(|| {
            Error::foundation(
                FoundationErrorKind::NotRegistered,
                "pooler is not registered in a live session",
            )
        })
    }

    /// Registry hit or build-and-register.
    pub fn get_or_create(
        &self,
        client_type: &str,
        identifier: &str,
        create: impl FnOnce(&Session) -> Result<Rc<dyn Client>>,
    ) -> Result<Rc<dyn Client>> {
        let session = self.session()?;
        if let Some(client) = session.get_client(client_type, identifier) {
            return Ok(client);
        }

        tracing::debug!(client_type = client_type, identifier = identifier, "Creating client");
        let client = create(&session)?;
        session.register_client(Rc::clone(&client))?;
        Ok(client)
    }
}
