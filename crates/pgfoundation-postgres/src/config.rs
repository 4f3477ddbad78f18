//! Connection parameters for the wire driver.
//!
//! A [`PgConfig`] is usually derived from a parsed [`Dsn`] and then refined
//! with the builder methods before being handed to
//! [`PgConnection::connect`](crate::PgConnection::connect).

use std::collections::BTreeMap;
use std::time::Duration;

use pgfoundation_core::{Dsn, Host};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;

/// Whether the socket is upgraded with an `SSLRequest` before startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    /// Upgrade when the server answers `S`, plain text otherwise
    Prefer,
    Require,
    /// Like `Require`, checking the certificate chain and host name
    VerifyFull,
}

impl SslMode {
    /// Send an `SSLRequest` at all.
    pub const fn requests_tls(self) -> bool {
        !matches!(self, SslMode::Disable)
    }

    /// A server refusing TLS is a connection failure.
    pub const fn refuses_plaintext(self) -> bool {
        matches!(self, SslMode::Require | SslMode::VerifyFull)
    }
}

/// Where to open the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    /// Unix socket file `<dir>/.s.PGSQL.<port>`
    Socket { dir: String, port: u16 },
}

/// Everything the driver needs to open and authenticate one socket.
#[derive(Clone)]
pub struct PgConfig {
    pub host: Host,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    /// Visible in `pg_stat_activity`
    pub application_name: Option<String>,
    pub connect_timeout: Duration,
    /// Socket read/write timeout; `None` blocks indefinitely
    pub io_timeout: Option<Duration>,
    pub ssl_mode: SslMode,
    /// Extra startup parameters
    pub options: BTreeMap<String, String>,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: Host::Tcp(DEFAULT_HOST.to_string()),
            port: DEFAULT_PORT,
            user: String::new(),
            password: None,
            database: String::new(),
            application_name: None,
            connect_timeout: Duration::from_secs(30),
            io_timeout: None,
            ssl_mode: SslMode::default(),
            options: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

impl PgConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: Host::Tcp(host.into()),
            user: user.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Take user, password, host, port and database from a parsed DSN.
    pub fn from_dsn(dsn: &Dsn) -> Self {
        Self {
            host: dsn
                .host
                .clone()
                .unwrap_or_else(|| Host::Tcp(DEFAULT_HOST.to_string())),
            port: dsn.port.unwrap_or(DEFAULT_PORT),
            user: dsn.user.clone(),
            password: dsn.password.clone(),
            database: dsn.database.clone(),
            ..Default::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn socket_dir(mut self, dir: impl Into<String>) -> Self {
        self.host = Host::Socket(dir.into());
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Key/value pairs of the StartupMessage. `user`, `database` and
    /// `client_encoding` come first; extra options follow in key order.
    pub fn startup_params(&self) -> Vec<(String, String)> {
        let fixed = [
            ("user", Some(self.user.as_str())),
            ("database", Some(self.database.as_str())),
            ("client_encoding", Some("UTF8")),
            ("application_name", self.application_name.as_deref()),
        ];
        fixed
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string())))
            .chain(self.options.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    pub fn endpoint(&self) -> Endpoint {
        match &self.host {
            Host::Tcp(host) => Endpoint::Tcp {
                host: host.clone(),
                port: self.port,
            },
            Host::Socket(dir) => Endpoint::Socket {
                dir: dir.clone(),
                port: self.port,
            },
        }
    }
}

impl Endpoint {
    /// `host:port` for TCP, the socket file path otherwise.
    pub fn address(&self) -> String {
        match self {
            Endpoint::Tcp { host, port } => format!("{host}:{port}"),
            Endpoint::Socket { dir, port } => {
                format!("{}/.s.PGSQL.{}", dir.trim_end_matches('/'), port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_builder_overrides_dsn_values() {
        let dsn = Dsn::parse("pgsql://app:pw@db.internal:6000/orders").unwrap();
        let config = PgConfig::from_dsn(&dsn)
            .port(6001)
            .application_name("billing")
            .io_timeout(Duration::from_millis(250))
            .ssl_mode(SslMode::VerifyFull);

        assert_eq!(config.endpoint().address(), "db.internal:6001");
        assert_eq!(config.io_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.ssl_mode, SslMode::VerifyFull);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_debug_masks_password() {
        let config = PgConfig::new("db", "app", "orders").password("hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_from_dsn_defaults() {
        let dsn = Dsn::parse("pgsql://greg/app").unwrap();
        let config = PgConfig::from_dsn(&dsn);
        assert_eq!(config.endpoint().address(), "localhost:5432");
        assert_eq!(config.user, "greg");
        assert_eq!(config.database, "app");
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_from_dsn_socket() {
        let dsn = Dsn::parse("pgsql://greg:pw@!/var/run/postgresql!:5433/app").unwrap();
        let config = PgConfig::from_dsn(&dsn);
        assert_eq!(
            config.endpoint().address(),
            "/var/run/postgresql/.s.PGSQL.5433"
        );
        assert_eq!(config.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_startup_params_order_and_options() {
        let params = PgConfig::new("db", "app", "orders")
            .option("search_path", "billing")
            .option("DateStyle", "ISO")
            .startup_params();

        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["user", "database", "client_encoding", "DateStyle", "search_path"]
        );
        assert_eq!(param(&params, "client_encoding"), Some("UTF8"));
        assert_eq!(param(&params, "application_name"), None);
    }

    #[test]
    fn test_ssl_mode_negotiation_flags() {
        assert!(!SslMode::Disable.requests_tls());
        assert!(SslMode::Prefer.requests_tls());
        assert!(!SslMode::Prefer.refuses_plaintext());
        assert!(SslMode::Require.refuses_plaintext());
        assert!(SslMode::VerifyFull.refuses_plaintext());
    }
}
