//! The session's single logical connection.
//!
//! [`Connection`] owns the driver handle and tracks its status:
//!
//! ```text
//!   None ──open ok──▶ Good ──non-SQL failure──▶ Bad
//!    │                 │                          │
//!    └──bad DSN──▶ Bad └────────close────────▶ Closed ◀──close──┘
//! ```
//!
//! The handle is opened lazily by the first operation that needs it. SQL
//! errors leave the status untouched; any other driver failure moves it to
//! `Bad`, after which every operation fails until the session is rebuilt.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use pgfoundation_core::error::{ConnectionErrorKind, Error, FoundationErrorKind, Result};
use pgfoundation_core::{Connector, Driver, Dsn, Notification, PreparedStatement, ResultSet, escape};

/// Status of the wire handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not opened yet
    None,
    /// Open and usable
    Good,
    /// Failed; unusable for the rest of the session
    Bad,
    /// Closed on shutdown; terminal
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::None => "NONE",
            ConnectionStatus::Good => "GOOD",
            ConnectionStatus::Bad => "BAD",
            ConnectionStatus::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

pub struct Connection {
    dsn: String,
    connector: Rc<dyn Connector>,
    configuration: BTreeMap<String, String>,
    driver: Option<Box<dyn Driver>>,
    status: ConnectionStatus,
    type_names: HashMap<u32, String>,
    notifications: VecDeque<Notification>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status)
            .field("configuration", &self.configuration)
            .field("pending_notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection that will open `dsn` on first use. No I/O happens
    /// here; a malformed DSN is only reported by the first operation.
    pub fn new(
        dsn: impl Into<String>,
        connector: Rc<dyn Connector>,
        configuration: BTreeMap<String, String>,
    ) -> Self {
        Self {
            dsn: dsn.into(),
            connector,
            configuration,
            driver: None,
            status: ConnectionStatus::None,
            type_names: HashMap::new(),
            notifications: VecDeque::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the handle is open and usable, without opening it.
    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Good && self.driver.is_some()
    }

    pub fn configuration(&self) -> &BTreeMap<String, String> {
        &self.configuration
    }

    /// Change a setting applied at open time.
    pub fn set_configuration(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        if self.status != ConnectionStatus::None {
            return Err(Error::foundation(
                FoundationErrorKind::Configuration,
                format!(
                    "cannot change configuration of a connection in status {}",
                    self.status
                ),
            ));
        }
        self.configuration.insert(key.into(), value.into());
        Ok(())
    }

    /// Open the handle if it is not open yet.
    pub fn open(&mut self) -> Result<()> {
        match self.status {
            ConnectionStatus::Good => return Ok(()),
            ConnectionStatus::Bad => {
                return Err(Error::connection(
                    ConnectionErrorKind::Bad,
                    "connection is in BAD state",
                ));
            }
            ConnectionStatus::Closed => return Err(closed_error()),
            ConnectionStatus::None => {}
        }

        let dsn = Dsn::parse(&self.dsn).inspect_err(|_| {
            self.status = ConnectionStatus::Bad;
        })?;
        tracing::debug!(dsn = ?dsn, "Opening connection");

        let mut driver = match self.connector.connect(&dsn) {
            Ok(driver) => driver,
            Err(e) => {
                self.status = ConnectionStatus::Bad;
                tracing::warn!(error = %e, "Connection failed to open");
                return Err(e);
            }
        };

        if !self.configuration.is_empty() {
            let sql = configuration_sql(driver.as_ref(), &self.configuration);
            tracing::trace!(sql = %sql, "Applying connection configuration");
            if let Err(e) = driver.simple_query(&sql) {
                self.status = ConnectionStatus::Bad;
                tracing::warn!(error = %e, "Connection configuration rejected");
                // best effort; the handle is abandoned either way
                let _ = driver.close();
                return Err(e);
            }
        }

        if !driver.is_ok() {
            self.status = ConnectionStatus::Bad;
            return Err(Error::connection(
                ConnectionErrorKind::Bad,
                "connection reported a bad state right after opening",
            ));
        }

        self.driver = Some(driver);
        self.status = ConnectionStatus::Good;
        tracing::debug!("Connection is GOOD");
        Ok(())
    }

    /// Run one or more statements with the simple query protocol.
    pub fn execute_raw(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        tracing::debug!(sql = %sql, "Executing raw statement");
        self.with_driver(|driver| driver.simple_query(sql))
    }

    /// Run one statement with `$n` placeholders and wire-encoded parameters.
    pub fn execute_parameterized(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet> {
        tracing::debug!(sql = %sql, params = params.len(), "Executing parameterized statement");
        self.with_driver(|driver| driver.query_params(sql, params))
    }

    pub fn prepare(&mut self, name: &str, sql: &str) -> Result<PreparedStatement> {
        tracing::debug!(name = %name, sql = %sql, "Preparing statement");
        self.with_driver(|driver| driver.prepare(name, sql))
    }

    pub fn execute_prepared(&mut self, name: &str, params: &[Option<String>]) -> Result<ResultSet> {
        tracing::debug!(name = %name, params = params.len(), "Executing prepared statement");
        self.with_driver(|driver| driver.execute_prepared(name, params))
    }

    /// Wire type names for result column OIDs.
    ///
    /// Built-in types come from the driver; the rest are looked up in
    /// `pg_catalog.pg_type` with a single query and cached. OIDs the
    /// catalog does not know resolve to `unknown`.
    pub fn resolve_type_names(&mut self, oids: &[u32]) -> Result<Vec<String>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        self.open()?;
        let mut missing: Vec<u32> = Vec::new();
        for &oid in oids {
            if self.type_names.contains_key(&oid) || missing.contains(&oid) {
                continue;
            }
            let builtin = self
                .driver
                .as_ref()
                .and_then(|driver| driver.builtin_type_name(oid));
            match builtin {
                Some(name) => {
                    self.type_names.insert(oid, name.to_string());
                }
                None => missing.push(oid),
            }
        }

        if !missing.is_empty() {
            let list = missing
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("SELECT oid, typname FROM pg_catalog.pg_type WHERE oid IN ({list})");
            let results = self.execute_raw(&sql)?;
            if let Some(result) = results.first() {
                for row in 0..result.row_count() {
                    let oid = result.value(row, 0).flatten().and_then(|v| v.parse::<u32>().ok());
                    let name = result.value(row, 1).flatten();
                    if let (Some(oid), Some(name)) = (oid, name) {
                        self.type_names.insert(oid, name.to_string());
                    }
                }
            }
            for oid in missing {
                self.type_names
                    .entry(oid)
                    .or_insert_with(|| "unknown".to_string());
            }
        }

        Ok(oids
            .iter()
            .map(|oid| {
                self.type_names
                    .get(oid)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string())
            })
            .collect())
    }

    /// Every pending notification, oldest first.
    pub fn take_notifications(&mut self) -> Result<Vec<Notification>> {
        self.poll()?;
        Ok(self.notifications.drain(..).collect())
    }

    /// Pending notifications for one channel; the others stay queued.
    pub fn notifications_for(&mut self, channel: &str) -> Result<Vec<Notification>> {
        self.poll()?;
        let (matching, rest): (VecDeque<_>, VecDeque<_>) = self
            .notifications
            .drain(..)
            .partition(|n| n.channel == channel);
        self.notifications = rest;
        Ok(matching.into_iter().collect())
    }

    /// The oldest pending notification for one channel.
    pub fn next_notification(&mut self, channel: &str) -> Result<Option<Notification>> {
        self.poll()?;
        let position = self.notifications.iter().position(|n| n.channel == channel);
        Ok(position.and_then(|i| self.notifications.remove(i)))
    }

    fn poll(&mut self) -> Result<()> {
        let received = self.with_driver(|driver| driver.poll_notifications())?;
        if !received.is_empty() {
            tracing::trace!(count = received.len(), "Received notifications");
        }
        self.notifications.extend(received);
        Ok(())
    }

    pub fn escape_identifier(&self, name: &str) -> String {
        match &self.driver {
            Some(driver) => driver.escape_identifier(name),
            None => escape::escape_identifier(name),
        }
    }

    pub fn escape_literal(&self, text: &str) -> String {
        match &self.driver {
            Some(driver) => driver.escape_literal(text),
            None => escape::escape_literal(text),
        }
    }

    pub fn escape_bytea(&self, data: &[u8]) -> String {
        match &self.driver {
            Some(driver) => driver.escape_bytea(data),
            None => escape::escape_bytea(data),
        }
    }

    pub fn unescape_bytea(&self, text: &str) -> Result<Vec<u8>> {
        match &self.driver {
            Some(driver) => driver.unescape_bytea(text),
            None => escape::unescape_bytea(text),
        }
    }

    /// Terminate the handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.status == ConnectionStatus::Closed {
            return Ok(());
        }
        self.status = ConnectionStatus::Closed;
        self.notifications.clear();
        match self.driver.take() {
            Some(mut driver) => {
                tracing::debug!("Closing connection");
                driver.close()
            }
            None => Ok(()),
        }
    }

    fn with_driver<T>(&mut self, op: impl FnOnce(&mut dyn Driver) -> Result<T>) -> Result<T> {
        self.open()?;
        let driver = self
            .driver
            .as_deref_mut()
            .ok_or_else(|| Error::connection(ConnectionErrorKind::Bad, "connection has no handle"))?;

        match op(driver) {
            Ok(value) => Ok(value),
            Err(e @ Error::Sql(_)) => Err(e),
            Err(e) => {
                self.status = ConnectionStatus::Bad;
                tracing::warn!(error = %e, "Connection moved to BAD");
                Err(match e {
                    e @ Error::Connection(_) => e,
                    other => Error::connection(ConnectionErrorKind::Disconnected, other.to_string()),
                })
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "Error while closing dropped connection");
        }
    }
}

fn closed_error() -> Error {
    Error::connection(ConnectionErrorKind::Closed, "use after shutdown: connection is closed")
}

/// `SET "k1" = 'v1'; SET "k2" = 'v2'` in key order.
fn configuration_sql(driver: &dyn Driver, configuration: &BTreeMap<String, String>) -> String {
    configuration
        .iter()
        .map(|(key, value)| {
            format!(
                "SET {} = {}",
                driver.escape_identifier(key),
                driver.escape_literal(value)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
