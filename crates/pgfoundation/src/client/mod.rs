//! Clients: stateful services bound to one session.
//!
//! A client is identified by its `(type, identifier)` pair. The type is the
//! namespace of the pooler that creates it (see [`client_type`]); the
//! identifier tells instances of one type apart (an SQL text, a wire type
//! name, a channel).
//!
//! Clients never own their session. They compose a [`ClientContext`] holding
//! a weak back-reference that is bound when the session registers them.

mod registry;

pub use registry::{ClientRegistry, shutdown_clients};

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use crate::session::{Session, SessionInner};

/// Client type namespace shared by clients and their poolers.
pub mod client_type {
    pub const QUERY: &str = "query";
    pub const QUERY_MANAGER: &str = "query_manager";
    pub const CONVERTER: &str = "converter";
    pub const PREPARED_STATEMENT: &str = "prepared_statement";
    pub const INSPECTOR: &str = "inspector";
    pub const LISTENER: &str = "listener";
    pub const OBSERVER: &str = "observer";
}

/// Upcast to `Rc<dyn Any>` so trait objects can be downcast to their
/// concrete type.
pub trait AsAnyRc {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAnyRc for T {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

pub trait Client: AsAnyRc {
    /// Pooler namespace this client belongs to.
    fn client_type(&self) -> &str;

    fn client_identifier(&self) -> &str;

    fn context(&self) -> &ClientContext;

    /// Called by [`Session::register_client`] before the client is stored.
    fn initialize(&self, session: &Session) -> Result<()> {
        self.context().bind(session);
        Ok(())
    }

    /// Release whatever the client holds on the server.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Downcast a client to its concrete type.
pub fn downcast_client<T: Client + 'static>(client: Rc<dyn Client>) -> Result<Rc<T>> {
    let client_type = client.client_type().to_string();
    let identifier = client.client_identifier().to_string();
    client.into_any_rc().downcast::<T>().map_err(|_| {
        Error::foundation(
            FoundationErrorKind::ClientType,
            format!(
                "client '{identifier}' of type '{client_type}' is not a {}",
                std::any::type_name::<T>()
            ),
        )
    })
}

/// Weak back-reference from a client to the session it is registered in.
#[derive(Debug, Default)]
pub struct ClientContext {
    session: RefCell<Weak<SessionInner>>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, session: &Session) {
        *self.session.borrow_mut() = session.downgrade();
    }

    pub fn is_bound(&self) -> bool {
        self.session.borrow().strong_count() > 0
    }

    /// The session this client is registered in.
    pub fn session(&self) -> Result<Session> {
        Session::upgrade(&self.session.borrow()).ok_or_else(|| {
            Error::foundation(
                FoundationErrorKind::NotRegistered,
                "client is not registered in a live session",
            )
        })
    }
}
