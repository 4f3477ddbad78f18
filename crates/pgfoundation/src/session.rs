//! The session façade.
//!
//! A [`Session`] owns one [`Connection`], one [`ClientRegistry`] and the
//! poolers registered for each client type. Everything else (queries,
//! converters, the inspector, notifications) is a client reached through a
//! pooler, so services share the connection without knowing each other.
//!
//! # Threading
//!
//! A session is single-threaded. It is built on `Rc` and `RefCell`, which
//! makes it neither `Send` nor `Sync`; the compiler rejects moving it to
//! another thread. Every call blocks until the backend has answered.
//!
//! # Lifecycle
//!
//! `Session` is a cheap handle; clones share the same state. Clients and
//! poolers keep only weak back-references, so dropping the last handle runs
//! [`Session::shutdown`]: clients are shut down, poolers cleared and the
//! connection closed.

use std::cell::{Cell, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use pgfoundation_core::error::{ConnectionErrorKind, Error, FoundationErrorKind, Result};
use pgfoundation_core::Value;

use crate::client::{Client, ClientRegistry, client_type, downcast_client, shutdown_clients};
use crate::connection::Connection;
use crate::converter::{ConverterClient, array_element_type, ARRAY_TYPE};
use crate::inspector::Inspector;
use crate::listener::Listener;
use crate::observer::Observer;
use crate::pooler::{ConverterPooler, ListenerPooler, Pooler};
use crate::query::{PreparedStatement, Query, QueryManager};
use crate::result_iterator::ResultIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    ShuttingDown,
    Shutdown,
}

pub(crate) struct SessionInner {
    stamp: Option<String>,
    connection: RefCell<Connection>,
    registry: RefCell<ClientRegistry>,
    poolers: RefCell<HashMap<String, Rc<dyn Pooler>>>,
    state: Cell<SessionState>,
}

/// Handle to a database session.
#[derive(Clone)]
pub struct Session(Rc<SessionInner>);

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut poolers: Vec<String> = self.0.poolers.borrow().keys().cloned().collect();
        poolers.sort();
        f.debug_struct("Session")
            .field("stamp", &self.0.stamp)
            .field("state", &self.0.state.get())
            .field("poolers", &poolers)
            .field("clients", &self.0.registry.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session with no poolers; see
    /// [`SessionBuilder`](crate::SessionBuilder) for the usual setup.
    pub fn new(connection: Connection, stamp: Option<String>) -> Self {
        Session(Rc::new(SessionInner {
            stamp,
            connection: RefCell::new(connection),
            registry: RefCell::new(ClientRegistry::new()),
            poolers: RefCell::new(HashMap::new()),
            state: Cell::new(SessionState::Open),
        }))
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<SessionInner>) -> Option<Session> {
        weak.upgrade().map(Session)
    }

    /// Free-form label given at build time, carried in listener events.
    pub fn stamp(&self) -> Option<&str> {
        self.0.stamp.as_deref()
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.state.get() == SessionState::Shutdown
    }

    /// Borrow the connection.
    ///
    /// Fails once the session is shut down. The guard must not be held
    /// across calls that reach the connection again.
    pub fn connection(&self) -> Result<RefMut<'_, Connection>> {
        if self.is_shutdown() {
            return Err(shutdown_error());
        }
        self.0.connection.try_borrow_mut().map_err(|_| {
            Error::foundation(
                FoundationErrorKind::Unsupported,
                "connection is already borrowed by another operation",
            )
        })
    }

    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    /// Bind a client to this session and store it, replacing any client
    /// registered under the same `(type, identifier)`.
    pub fn register_client(&self, client: Rc<dyn Client>) -> Result<()> {
        if self.is_shutdown() {
            return Err(shutdown_error());
        }
        client.initialize(self)?;
        tracing::debug!(
            client_type = client.client_type(),
            identifier = client.client_identifier(),
            "Registering client"
        );
        self.0.registry.borrow_mut().add(client);
        Ok(())
    }

    pub fn get_client(&self, client_type: &str, identifier: &str) -> Option<Rc<dyn Client>> {
        self.0.registry.borrow().get(client_type, identifier)
    }

    pub fn has_client(&self, client_type: &str, identifier: &str) -> bool {
        self.0.registry.borrow().has(client_type, identifier)
    }

    pub fn clients_of_type(&self, client_type: &str) -> Vec<Rc<dyn Client>> {
        self.0.registry.borrow().clients_of_type(client_type)
    }

    /// Shut down and forget one client; no-op when it is not registered.
    pub fn clear_client(&self, client_type: &str, identifier: &str) -> Result<()> {
        let removed = self.0.registry.borrow_mut().remove(client_type, identifier);
        match removed {
            Some(client) => client.shutdown(),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Poolers
    // ------------------------------------------------------------------

    pub fn register_pooler(&self, pooler: Rc<dyn Pooler>) -> Result<()> {
        let pooler_type = pooler.pooler_type().to_string();
        if pooler_type.is_empty() {
            return Err(Error::foundation(
                FoundationErrorKind::Configuration,
                "pooler declares an empty client type",
            ));
        }
        pooler.register(self);
        tracing::debug!(pooler_type = %pooler_type, "Registering pooler");
        self.0.poolers.borrow_mut().insert(pooler_type, pooler);
        Ok(())
    }

    pub fn has_pooler_for_type(&self, client_type: &str) -> bool {
        self.0.poolers.borrow().contains_key(client_type)
    }

    pub fn get_pooler_for_type(&self, client_type: &str) -> Option<Rc<dyn Pooler>> {
        self.0.poolers.borrow().get(client_type).cloned()
    }

    /// The pooler for `client_type` as its concrete type.
    pub fn pooler<P: Pooler + 'static>(&self, client_type: &str) -> Result<Rc<P>> {
        let pooler = self
            .get_pooler_for_type(client_type)
            .ok_or_else(|| missing_pooler(client_type))?;
        pooler.into_any_rc().downcast::<P>().map_err(|_| {
            Error::foundation(
                FoundationErrorKind::ClientType,
                format!(
                    "pooler for type '{client_type}' is not a {}",
                    std::any::type_name::<P>()
                ),
            )
        })
    }

    /// The entry point every typed accessor goes through.
    pub fn get_client_via_pooler(
        &self,
        client_type: &str,
        identifier: &str,
    ) -> Result<Rc<dyn Client>> {
        if self.is_shutdown() {
            return Err(shutdown_error());
        }
        let pooler = self
            .get_pooler_for_type(client_type)
            .ok_or_else(|| missing_pooler(client_type))?;
        pooler.get_client(identifier)
    }

    fn typed_client<T: Client + 'static>(&self, client_type: &str, identifier: &str) -> Result<Rc<T>> {
        downcast_client(self.get_client_via_pooler(client_type, identifier)?)
    }

    /// Query manager by kind: `simple` (the default, also for `""`) or
    /// `prepared`.
    pub fn query_manager(&self, kind: &str) -> Result<Rc<QueryManager>> {
        self.typed_client(client_type::QUERY_MANAGER, kind)
    }

    pub fn query_client(&self, sql: &str) -> Result<Rc<Query>> {
        self.typed_client(client_type::QUERY, sql)
    }

    pub fn prepared_statement(&self, sql: &str) -> Result<Rc<PreparedStatement>> {
        self.typed_client(client_type::PREPARED_STATEMENT, sql)
    }

    pub fn converter(&self, wire_type: &str) -> Result<Rc<ConverterClient>> {
        self.typed_client(client_type::CONVERTER, wire_type)
    }

    pub fn inspector(&self) -> Result<Rc<Inspector>> {
        self.typed_client(client_type::INSPECTOR, "")
    }

    pub fn listener(&self, name: &str) -> Result<Rc<Listener>> {
        self.typed_client(client_type::LISTENER, name)
    }

    pub fn observer(&self, channel: &str) -> Result<Rc<Observer>> {
        self.typed_client(client_type::OBSERVER, channel)
    }

    // ------------------------------------------------------------------
    // Conveniences
    // ------------------------------------------------------------------

    /// Run a query through the default query manager.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<ResultIterator> {
        self.query_manager("")?.query(sql, params)
    }

    /// Decode wire text of `wire_type`; `_x` and `x[]` go through the array
    /// codec with element type `x`.
    pub fn decode_value(&self, data: Option<&str>, wire_type: &str) -> Result<Value> {
        let (converter, subtype) = self.route(wire_type)?;
        converter.decode(data, subtype, self)
    }

    /// Render a value as an SQL literal of `wire_type`.
    pub fn encode_value(&self, value: &Value, wire_type: &str) -> Result<String> {
        let (converter, subtype) = self.route(wire_type)?;
        converter.encode(value, subtype, self)
    }

    /// Render a value in the standard text format of `wire_type`.
    pub fn encode_plain_value(&self, value: &Value, wire_type: &str) -> Result<Option<String>> {
        let (converter, subtype) = self.route(wire_type)?;
        converter.encode_plain(value, subtype, self)
    }

    /// Whether a codec is registered for `wire_type`.
    pub fn has_converter_for_type(&self, wire_type: &str) -> bool {
        self.pooler::<ConverterPooler>(client_type::CONVERTER)
            .is_ok_and(|pooler| pooler.has_type(wire_type))
    }

    fn route<'t>(&self, wire_type: &'t str) -> Result<(Rc<ConverterClient>, &'t str)> {
        match array_element_type(wire_type) {
            Some(element) => Ok((self.converter(ARRAY_TYPE)?, element)),
            None => Ok((self.converter(wire_type)?, wire_type)),
        }
    }

    pub fn escape_identifier(&self, name: &str) -> Result<String> {
        Ok(self.connection()?.escape_identifier(name))
    }

    pub fn escape_literal(&self, text: &str) -> Result<String> {
        Ok(self.connection()?.escape_literal(text))
    }

    pub fn escape_bytea(&self, data: &[u8]) -> Result<String> {
        Ok(self.connection()?.escape_bytea(data))
    }

    pub fn unescape_bytea(&self, text: &str) -> Result<Vec<u8>> {
        self.connection()?.unescape_bytea(text)
    }

    /// Dispatch an in-process event to the listeners registered for it.
    /// Does nothing when no listener pooler is registered.
    pub fn notify_listeners(&self, event: &str, payload: &serde_json::Value) -> Result<()> {
        if !self.has_pooler_for_type(client_type::LISTENER) {
            return Ok(());
        }
        self.pooler::<ListenerPooler>(client_type::LISTENER)?
            .notify(event, payload)
            .map(|_| ())
    }

    /// Shut every client down, clear the poolers and close the connection.
    ///
    /// Client failures do not stop the others; they are returned. A second
    /// call does nothing and returns no errors.
    pub fn shutdown(&self) -> Vec<Error> {
        if self.0.state.get() != SessionState::Open {
            return Vec::new();
        }
        self.0.state.set(SessionState::ShuttingDown);
        tracing::info!(stamp = ?self.0.stamp, "Shutting down session");

        let clients = self.0.registry.borrow_mut().take_all();
        let mut errors = shutdown_clients(clients);

        let poolers: Vec<Rc<dyn Pooler>> = self.0.poolers.borrow_mut().drain().map(|(_, p)| p).collect();
        drop(poolers);

        match self.0.connection.try_borrow_mut() {
            Ok(mut connection) => {
                if let Err(e) = connection.close() {
                    tracing::warn!(error = %e, "Connection close failed");
                    errors.push(e);
                }
            }
            Err(_) => errors.push(Error::foundation(
                FoundationErrorKind::Unsupported,
                "connection still borrowed during shutdown",
            )),
        }

        self.0.state.set(SessionState::Shutdown);
        errors
    }

    /// Configuration the connection applies when it opens.
    pub fn configuration(&self) -> BTreeMap<String, String> {
        self.0.connection.borrow().configuration().clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) == 1 && self.0.state.get() == SessionState::Open {
            let errors = self.shutdown();
            if !errors.is_empty() {
                tracing::debug!(errors = errors.len(), "Dropped session shut down with errors");
            }
        }
    }
}

fn shutdown_error() -> Error {
    Error::connection(ConnectionErrorKind::Closed, "session is shutdown")
}

fn missing_pooler(client_type: &str) -> Error {
    Error::foundation(
        FoundationErrorKind::MissingPooler,
        format!("no pooler for type '{client_type}'"),
    )
}

#[cfg(test)]
impl Session {
    /// Bare session over a mock connector, without poolers.
    pub(crate) fn for_tests(connector: &crate::testing::MockConnector) -> Session {
        Session::new(
            Connection::new("pgsql://tester@localhost/test", connector.rc(), BTreeMap::new()),
            Some("test".to_string()),
        )
    }
}
