//! Blocking PostgreSQL connection.
//!
//! [`PgConnection`] owns one socket and speaks protocol 3.0 over it:
//! startup and authentication, the simple query protocol, the extended
//! protocol (unnamed and named statements) and asynchronous notifications.
//! Every request is answered up to ReadyForQuery before the call returns,
//! also when the server reported an error, so the socket is always left
//! synchronized.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use pgfoundation_core::error::{ConnectionError, ConnectionErrorKind, Error, Result, SqlError};
use pgfoundation_core::{
    Connector, Driver, Dsn, FieldDescription, Notification, PreparedStatement, ResultSet,
};

use crate::auth::{SCRAM_SHA_256, ScramClient, md5_password};
use crate::config::{Endpoint, PgConfig, SslMode};
use crate::protocol::{
    BackendMessage, DescribeKind, ErrorFields, FrontendMessage, MessageReader, MessageWriter,
    PROTOCOL_VERSION, TransactionStatus,
};
#[cfg(feature = "tls")]
use crate::tls;

enum PgStream {
    Plain(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    #[cfg(feature = "tls")]
    Tls(Box<tls::TlsStream>),
    Closed,
}

fn not_connected() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "connection closed")
}

impl Read for PgStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            PgStream::Plain(s) => s.read(buf),
            #[cfg(unix)]
            PgStream::Unix(s) => s.read(buf),
            #[cfg(feature = "tls")]
            PgStream::Tls(s) => s.read(buf),
            PgStream::Closed => Err(not_connected()),
        }
    }
}

impl Write for PgStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            PgStream::Plain(s) => s.write(buf),
            #[cfg(unix)]
            PgStream::Unix(s) => s.write(buf),
            #[cfg(feature = "tls")]
            PgStream::Tls(s) => s.write(buf),
            PgStream::Closed => Err(not_connected()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            PgStream::Plain(s) => s.flush(),
            #[cfg(unix)]
            PgStream::Unix(s) => s.flush(),
            #[cfg(feature = "tls")]
            PgStream::Tls(s) => s.flush(),
            PgStream::Closed => Err(not_connected()),
        }
    }
}

/// Connection state in the protocol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket open, startup not finished
    Connecting,
    /// Waiting for the authentication exchange to finish
    Authenticating,
    /// Ready for queries
    Ready(TransactionStatus),
    /// The socket broke or the protocol desynchronized
    Error,
    /// Terminate was sent
    Closed,
}

/// PostgreSQL connection.
pub struct PgConnection {
    stream: PgStream,
    state: ConnectionState,
    /// Backend process ID (for query cancellation)
    process_id: i32,
    secret_key: i32,
    /// Server parameters reported by ParameterStatus
    parameters: HashMap<String, String>,
    config: PgConfig,
    reader: MessageReader,
    writer: MessageWriter,
    read_buf: Vec<u8>,
    notifications: VecDeque<Notification>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .field("endpoint", &self.config.endpoint())
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Establish a new connection.
    ///
    /// 1. TCP or unix socket connection
    /// 2. SSL negotiation (TCP only, if configured)
    /// 3. Startup message
    /// 4. Authentication
    /// 5. Server parameters until ReadyForQuery
    pub fn connect(config: PgConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        tracing::debug!(endpoint = %endpoint.address(), database = %config.database, "connecting");

        let stream = open_stream(&endpoint, &config)?;
        let mut conn = Self {
            stream,
            state: ConnectionState::Connecting,
            process_id: 0,
            secret_key: 0,
            parameters: HashMap::new(),
            config,
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            read_buf: vec![0u8; 8192],
            notifications: VecDeque::new(),
        };

        let wants_tls = cfg!(feature = "tls") || conn.config.ssl_mode.refuses_plaintext();
        if matches!(endpoint, Endpoint::Tcp { .. })
            && conn.config.ssl_mode.requests_tls()
            && wants_tls
        {
            conn.negotiate_ssl()?;
        }

        let params = conn.config.startup_params();
        conn.send_message(&FrontendMessage::Startup {
            version: PROTOCOL_VERSION,
            params,
        })?;
        conn.state = ConnectionState::Authenticating;
        conn.handle_auth()?;
        conn.read_startup_messages()?;

        tracing::debug!(
            process_id = conn.process_id,
            server_version = conn.parameter("server_version").unwrap_or("unknown"),
            "connection ready"
        );
        Ok(conn)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready(_))
    }

    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        match self.state {
            ConnectionState::Ready(status) => Some(status),
            _ => None,
        }
    }

    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    pub fn secret_key(&self) -> i32 {
        self.secret_key
    }

    /// A server parameter such as `server_version` or `TimeZone`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Run `;`-separated statements with the simple query protocol.
    pub fn simple_query(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        self.ensure_ready()?;
        tracing::debug!(sql = %sql, "simple query");
        self.send_message(&FrontendMessage::Query(sql.to_string()))?;
        self.read_results(sql)
    }

    /// Run one statement through the unnamed statement and portal.
    pub fn query_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet> {
        self.ensure_ready()?;
        tracing::debug!(sql = %sql, params = params.len(), "extended query");
        self.writer.clear();
        self.writer.push(&FrontendMessage::Parse {
            name: String::new(),
            query: sql.to_string(),
            param_types: Vec::new(),
        });
        self.push_execute("", params);
        self.flush_writer()?;
        self.read_single_result(sql)
    }

    /// Create a named statement and describe its parameters and columns.
    pub fn prepare(&mut self, name: &str, sql: &str) -> Result<PreparedStatement> {
        self.ensure_ready()?;
        tracing::debug!(statement = %name, sql = %sql, "prepare");
        self.writer.clear();
        self.writer.push(&FrontendMessage::Parse {
            name: name.to_string(),
            query: sql.to_string(),
            param_types: Vec::new(),
        });
        self.writer.push(&FrontendMessage::Describe {
            kind: DescribeKind::Statement,
            name: name.to_string(),
        });
        self.writer.push(&FrontendMessage::Sync);
        self.flush_writer()?;

        let mut param_types = Vec::new();
        let mut fields = Vec::new();
        let mut error = None;
        loop {
            match self.receive_message()? {
                BackendMessage::ParameterDescription(oids) => param_types = oids,
                BackendMessage::RowDescription(desc) => {
                    fields = desc
                        .into_iter()
                        .map(|f| FieldDescription::new(f.name, f.type_oid))
                        .collect();
                }
                BackendMessage::ParseComplete | BackendMessage::NoData => {}
                BackendMessage::ErrorResponse(e) => {
                    error.get_or_insert(e);
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.state = ConnectionState::Ready(status);
                    break;
                }
                other => return Err(self.unexpected(&other)),
            }
        }

        match error {
            Some(fields) => Err(self.error_from_fields(&fields, sql)),
            None => Ok(PreparedStatement::new(name, sql, param_types, fields)),
        }
    }

    /// Bind and execute a statement created by [`PgConnection::prepare`].
    pub fn execute_prepared(&mut self, name: &str, params: &[Option<String>]) -> Result<ResultSet> {
        self.ensure_ready()?;
        tracing::debug!(statement = %name, params = params.len(), "execute prepared");
        self.writer.clear();
        self.push_execute(name, params);
        self.flush_writer()?;
        self.read_single_result(name)
    }

    /// Collect notifications buffered so far plus any the server has queued.
    ///
    /// The server only delivers notifications between commands, so an empty
    /// query is sent to give it the chance.
    pub fn poll_notifications(&mut self) -> Result<Vec<Notification>> {
        self.ensure_ready()?;
        self.send_message(&FrontendMessage::Query(String::new()))?;
        self.read_results("")?;
        Ok(self.notifications.drain(..).collect())
    }

    /// Send Terminate and drop the socket. Calling it twice is harmless.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.state, ConnectionState::Closed) {
            return Ok(());
        }
        let was_ready = self.is_ready();
        self.state = ConnectionState::Closed;
        let result = if was_ready {
            let data = self.writer.write(&FrontendMessage::Terminate);
            self.stream
                .write_all(data)
                .and_then(|()| self.stream.flush())
                .map_err(|e| io_error("failed to send terminate", e))
        } else {
            Ok(())
        };
        self.stream = PgStream::Closed;
        tracing::debug!(process_id = self.process_id, "connection closed");
        result
    }

    // ==================== SSL Negotiation ====================

    fn negotiate_ssl(&mut self) -> Result<()> {
        self.send_message(&FrontendMessage::SSLRequest)?;

        let mut answer = [0u8; 1];
        self.stream.read_exact(&mut answer).map_err(|e| {
            Error::Connection(
                ConnectionError::new(
                    ConnectionErrorKind::Ssl,
                    format!("failed to read SSL response: {e}"),
                )
                .with_source(e),
            )
        })?;

        match answer[0] {
            b'S' => self.upgrade_tls(),
            b'N' if self.config.ssl_mode.refuses_plaintext() => Err(Error::connection(
                ConnectionErrorKind::Ssl,
                "server does not support SSL",
            )),
            b'N' => Ok(()),
            other => Err(Error::connection(
                ConnectionErrorKind::Ssl,
                format!("unexpected SSL response: 0x{other:02x}"),
            )),
        }
    }

    #[cfg(feature = "tls")]
    fn upgrade_tls(&mut self) -> Result<()> {
        let PgStream::Plain(plain) = std::mem::replace(&mut self.stream, PgStream::Closed) else {
            return Err(Error::connection(
                ConnectionErrorKind::Ssl,
                "TLS upgrade requires a plain TCP stream",
            ));
        };
        let host = match &self.config.endpoint() {
            Endpoint::Tcp { host, .. } => host.clone(),
            Endpoint::Socket { .. } => String::new(),
        };
        let mut stream = tls::wrap(plain, &host, self.config.ssl_mode)?;
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock).map_err(|e| {
                Error::Connection(
                    ConnectionError::new(
                        ConnectionErrorKind::Ssl,
                        format!("TLS handshake failed: {e}"),
                    )
                    .with_source(e),
                )
            })?;
        }
        self.stream = PgStream::Tls(Box::new(stream));
        Ok(())
    }

    #[cfg(not(feature = "tls"))]
    fn upgrade_tls(&mut self) -> Result<()> {
        Err(Error::connection(
            ConnectionErrorKind::Ssl,
            "TLS requested but 'pgfoundation-postgres' was built without feature 'tls'",
        ))
    }

    // ==================== Authentication ====================

    fn require_password(&self) -> Result<String> {
        self.config.password.clone().ok_or_else(|| {
            Error::connection(
                ConnectionErrorKind::Authentication,
                "server requested a password but none was given",
            )
        })
    }

    fn handle_auth(&mut self) -> Result<()> {
        loop {
            match self.receive_message()? {
                BackendMessage::AuthenticationOk => return Ok(()),
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = self.require_password()?;
                    self.send_message(&FrontendMessage::PasswordMessage(password))?;
                }
                BackendMessage::AuthenticationMD5Password(salt) => {
                    let password = self.require_password()?;
                    let hash = md5_password(&self.config.user, &password, salt);
                    self.send_message(&FrontendMessage::PasswordMessage(hash))?;
                }
                BackendMessage::AuthenticationSASL(mechanisms) => {
                    if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                        return Err(Error::connection(
                            ConnectionErrorKind::Authentication,
                            format!("unsupported SASL mechanisms: {}", mechanisms.join(", ")),
                        ));
                    }
                    self.scram_auth()?;
                }
                BackendMessage::ErrorResponse(e) => {
                    self.state = ConnectionState::Error;
                    return Err(self.error_from_fields(&e, ""));
                }
                other => return Err(self.unexpected(&other)),
            }
        }
    }

    fn scram_auth(&mut self) -> Result<()> {
        let password = self.require_password()?;
        let mut client = ScramClient::new(&self.config.user, &password);

        self.send_message(&FrontendMessage::SASLInitialResponse {
            mechanism: SCRAM_SHA_256.to_string(),
            data: client.client_first(),
        })?;

        let server_first = match self.receive_message()? {
            BackendMessage::AuthenticationSASLContinue(data) => data,
            BackendMessage::ErrorResponse(e) => {
                self.state = ConnectionState::Error;
                return Err(self.error_from_fields(&e, ""));
            }
            other => return Err(self.unexpected(&other)),
        };
        let client_final = client.process_server_first(&server_first)?;
        self.send_message(&FrontendMessage::SASLResponse(client_final))?;

        match self.receive_message()? {
            BackendMessage::AuthenticationSASLFinal(data) => client.verify_server_final(&data),
            BackendMessage::ErrorResponse(e) => {
                self.state = ConnectionState::Error;
                Err(self.error_from_fields(&e, ""))
            }
            other => Err(self.unexpected(&other)),
        }
        // AuthenticationOk follows and is consumed by handle_auth.
    }

    fn read_startup_messages(&mut self) -> Result<()> {
        loop {
            match self.receive_message()? {
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    self.process_id = process_id;
                    self.secret_key = secret_key;
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.state = ConnectionState::Ready(status);
                    return Ok(());
                }
                BackendMessage::ErrorResponse(e) => {
                    self.state = ConnectionState::Error;
                    return Err(self.error_from_fields(&e, ""));
                }
                other => return Err(self.unexpected(&other)),
            }
        }
    }

    // ==================== Results ====================

    fn push_execute(&mut self, statement: &str, params: &[Option<String>]) {
        self.writer.push(&FrontendMessage::Bind {
            portal: String::new(),
            statement: statement.to_string(),
            params: params.to_vec(),
        });
        self.writer.push(&FrontendMessage::Describe {
            kind: DescribeKind::Portal,
            name: String::new(),
        });
        self.writer.push(&FrontendMessage::Execute {
            portal: String::new(),
            max_rows: 0,
        });
        self.writer.push(&FrontendMessage::Sync);
    }

    fn read_single_result(&mut self, sql: &str) -> Result<ResultSet> {
        Ok(self.read_results(sql)?.into_iter().next().unwrap_or_default())
    }

    /// Read until ReadyForQuery. The first error reported by the server is
    /// returned once the connection is synchronized again.
    fn read_results(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        let mut results = Vec::new();
        let mut fields: Vec<FieldDescription> = Vec::new();
        let mut rows = Vec::new();
        let mut error: Option<ErrorFields> = None;

        loop {
            match self.receive_message()? {
                BackendMessage::RowDescription(desc) => {
                    fields = desc
                        .into_iter()
                        .map(|f| FieldDescription::new(f.name, f.type_oid))
                        .collect();
                    rows.clear();
                }
                BackendMessage::DataRow(values) => rows.push(text_row(values)?),
                BackendMessage::CommandComplete(tag) => {
                    let fields = std::mem::take(&mut fields);
                    let rows = std::mem::take(&mut rows);
                    results.push(ResultSet::new(fields, rows, Some(tag)));
                }
                BackendMessage::ErrorResponse(e) => {
                    error.get_or_insert(e);
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.state = ConnectionState::Ready(status);
                    break;
                }
                BackendMessage::EmptyQueryResponse
                | BackendMessage::ParseComplete
                | BackendMessage::BindComplete
                | BackendMessage::CloseComplete
                | BackendMessage::NoData
                | BackendMessage::PortalSuspended
                | BackendMessage::ParameterDescription(_) => {}
                other => return Err(self.unexpected(&other)),
            }
        }

        match error {
            Some(fields) => Err(self.error_from_fields(&fields, sql)),
            None => Ok(results),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            ConnectionState::Ready(_) => Ok(()),
            ConnectionState::Closed => Err(Error::connection(
                ConnectionErrorKind::Closed,
                "connection is closed",
            )),
            _ => Err(Error::connection(
                ConnectionErrorKind::Disconnected,
                "connection is not ready for queries",
            )),
        }
    }

    /// Turn an ErrorResponse into an error value. FATAL errors also end the
    /// session on the server side.
    fn error_from_fields(&mut self, fields: &ErrorFields, sql: &str) -> Error {
        if fields.severity == "FATAL" || fields.severity == "PANIC" {
            self.state = ConnectionState::Error;
        }
        error_from_fields(fields, sql)
    }

    fn unexpected(&mut self, msg: &BackendMessage) -> Error {
        let state = std::mem::replace(&mut self.state, ConnectionState::Error);
        Error::connection(
            ConnectionErrorKind::Protocol,
            format!("unexpected message in state {state:?}: {msg:?}"),
        )
    }

    // ==================== Low-Level I/O ====================

    fn send_message(&mut self, msg: &FrontendMessage) -> Result<()> {
        self.writer.write(msg);
        self.flush_writer()
    }

    fn flush_writer(&mut self) -> Result<()> {
        let result = self
            .stream
            .write_all(self.writer.as_bytes())
            .and_then(|()| self.stream.flush());
        self.writer.clear();
        result.map_err(|e| {
            self.state = ConnectionState::Error;
            io_error("failed to write to server", e)
        })
    }

    /// Next message that is not asynchronous. Notifications are queued,
    /// notices logged and parameter changes recorded on the way.
    fn receive_message(&mut self) -> Result<BackendMessage> {
        loop {
            let msg = match self.reader.next_message() {
                Ok(Some(msg)) => msg,
                Ok(None) => {
                    self.fill_reader()?;
                    continue;
                }
                Err(e) => {
                    self.state = ConnectionState::Error;
                    return Err(e);
                }
            };

            match msg {
                BackendMessage::NotificationResponse {
                    process_id,
                    channel,
                    payload,
                } => {
                    tracing::debug!(channel = %channel, "notification received");
                    self.notifications.push_back(Notification {
                        channel,
                        payload,
                        process_id,
                    });
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!(severity = %notice.severity, code = %notice.code, "{}", notice.message);
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                other => return Ok(other),
            }
        }
    }

    fn fill_reader(&mut self) -> Result<()> {
        let n = self.stream.read(&mut self.read_buf).map_err(|e| {
            self.state = ConnectionState::Error;
            io_error("failed to read from server", e)
        })?;
        if n == 0 {
            self.state = ConnectionState::Error;
            return Err(Error::connection(
                ConnectionErrorKind::Disconnected,
                "connection closed by server",
            ));
        }
        self.reader.feed(&self.read_buf[..n]);
        Ok(())
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Driver for PgConnection {
    fn simple_query(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        PgConnection::simple_query(self, sql)
    }

    fn query_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet> {
        PgConnection::query_params(self, sql, params)
    }

    fn prepare(&mut self, name: &str, sql: &str) -> Result<PreparedStatement> {
        PgConnection::prepare(self, name, sql)
    }

    fn execute_prepared(&mut self, name: &str, params: &[Option<String>]) -> Result<ResultSet> {
        PgConnection::execute_prepared(self, name, params)
    }

    fn poll_notifications(&mut self) -> Result<Vec<Notification>> {
        PgConnection::poll_notifications(self)
    }

    fn is_ok(&self) -> bool {
        self.is_ready()
    }

    fn close(&mut self) -> Result<()> {
        PgConnection::close(self)
    }

    fn builtin_type_name(&self, oid: u32) -> Option<&'static str> {
        crate::types::builtin_type_name(oid)
    }
}

/// Opens [`PgConnection`]s from a parsed DSN.
///
/// Settings the DSN cannot express (SSL, timeouts, application name) are
/// taken from the connector.
#[derive(Debug, Clone, Default)]
pub struct PgConnector {
    ssl_mode: SslMode,
    application_name: Option<String>,
    connect_timeout: Option<std::time::Duration>,
    io_timeout: Option<std::time::Duration>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn io_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Connection parameters for `dsn` with this connector's settings applied.
    pub fn config_for(&self, dsn: &Dsn) -> PgConfig {
        let mut config = PgConfig::from_dsn(dsn).ssl_mode(self.ssl_mode);
        if let Some(name) = &self.application_name {
            config = config.application_name(name.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            config = config.connect_timeout(timeout);
        }
        if let Some(timeout) = self.io_timeout {
            config = config.io_timeout(timeout);
        }
        config
    }
}

impl Connector for PgConnector {
    fn connect(&self, dsn: &Dsn) -> Result<Box<dyn Driver>> {
        let conn = PgConnection::connect(self.config_for(dsn))?;
        Ok(Box::new(conn))
    }
}

// ==================== Helper Functions ====================

fn open_stream(endpoint: &Endpoint, config: &PgConfig) -> Result<PgStream> {
    match endpoint {
        Endpoint::Tcp { .. } => {
            let address = endpoint.address();
            let addrs = address.to_socket_addrs().map_err(|e| {
                Error::Connection(
                    ConnectionError::new(
                        ConnectionErrorKind::Connect,
                        format!("cannot resolve {address}: {e}"),
                    )
                    .with_source(e),
                )
            })?;

            let mut last_error = None;
            for addr in addrs {
                match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                    Ok(stream) => {
                        stream.set_nodelay(true).ok();
                        stream.set_read_timeout(config.io_timeout).ok();
                        stream.set_write_timeout(config.io_timeout).ok();
                        return Ok(PgStream::Plain(stream));
                    }
                    Err(e) => last_error = Some(e),
                }
            }
            Err(match last_error {
                Some(e) => connect_error(&address, e),
                None => Error::connection(
                    ConnectionErrorKind::Connect,
                    format!("{address} resolved to no addresses"),
                ),
            })
        }
        #[cfg(unix)]
        Endpoint::Socket { .. } => {
            let path = endpoint.address();
            let stream = UnixStream::connect(&path).map_err(|e| connect_error(&path, e))?;
            stream.set_read_timeout(config.io_timeout).ok();
            stream.set_write_timeout(config.io_timeout).ok();
            Ok(PgStream::Unix(stream))
        }
        #[cfg(not(unix))]
        Endpoint::Socket { .. } => Err(Error::connection(
            ConnectionErrorKind::Connect,
            "unix sockets are not available on this platform",
        )),
    }
}

fn connect_error(address: &str, e: std::io::Error) -> Error {
    let kind = if e.kind() == std::io::ErrorKind::ConnectionRefused {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Connect
    };
    Error::Connection(
        ConnectionError::new(kind, format!("failed to connect to {address}: {e}")).with_source(e),
    )
}

fn io_error(context: &str, e: std::io::Error) -> Error {
    Error::Connection(
        ConnectionError::new(ConnectionErrorKind::Disconnected, format!("{context}: {e}"))
            .with_source(e),
    )
}

fn text_row(values: Vec<Option<Vec<u8>>>) -> Result<Vec<Option<String>>> {
    values
        .into_iter()
        .map(|value| {
            value
                .map(|bytes| {
                    String::from_utf8(bytes).map_err(|e| {
                        Error::connection(
                            ConnectionErrorKind::Protocol,
                            format!("non UTF-8 text value: {e}"),
                        )
                    })
                })
                .transpose()
        })
        .collect()
}

fn error_from_fields(fields: &ErrorFields, sql: &str) -> Error {
    match fields.code.get(..2) {
        // connection exception
        Some("08") => Error::connection(ConnectionErrorKind::Connect, fields.message.clone()),
        // invalid authorization specification
        Some("28") => Error::connection(ConnectionErrorKind::Authentication, fields.message.clone()),
        _ => {
            let mut error = SqlError::new(fields.message.clone());
            error.sqlstate = Some(fields.code.clone()).filter(|c| !c.is_empty());
            error.severity = Some(fields.severity.clone()).filter(|s| !s.is_empty());
            error.detail = fields.detail.clone();
            error.hint = fields.hint.clone();
            error.position = fields.position;
            if !sql.is_empty() {
                error = error.with_sql(sql);
            }
            Error::Sql(error)
        }
    }
}
