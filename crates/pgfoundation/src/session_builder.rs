//! Session construction.
//!
//! [`SessionConfig`] holds what a deployment configures (DSN, connection
//! settings, stamp) and can be read from JSON. [`SessionBuilder`] adds what
//! code configures (transport, extra converters, post-configure hooks) and
//! builds any number of sessions from the same setup.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgfoundation::{SessionBuilder, SessionConfig};
//!
//! let session = SessionBuilder::new(SessionConfig::new("pgsql://app@localhost/app"))
//!     .with_configuration("application_name", "worker")
//!     .build_session(Some("worker-1"))?;
//! let rows = session.query("select $*::int4 + 1 as n", &[41.into()])?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};
use pgfoundation_core::Connector;
use pgfoundation_postgres::PgConnector;
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::converter::{Codec, ConverterRegistry};
use crate::pooler::{
    ConverterPooler, InspectorPooler, ListenerPooler, ObserverPooler, PreparedStatementPooler,
    QueryManagerPooler, QueryPooler,
};
use crate::session::Session;

/// Environment variable read by [`SessionBuilder::from_env`].
pub const DSN_ENV_VAR: &str = "PGFOUNDATION_DSN";

/// Connection settings applied to every session unless overridden.
pub fn default_configuration() -> BTreeMap<String, String> {
    [
        ("bytea_output", "hex"),
        ("intervalstyle", "ISO_8601"),
        ("datestyle", "ISO"),
        ("standard_conforming_strings", "true"),
        ("timezone", "UTC"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub dsn: String,
    /// Settings layered over [`default_configuration`].
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
    #[serde(default)]
    pub stamp: Option<String>,
}

impl SessionConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            configuration: BTreeMap::new(),
            stamp: None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::foundation(
                FoundationErrorKind::Configuration,
                format!("invalid session configuration: {e}"),
            )
        })
    }

    /// Defaults overridden by the configured entries.
    pub fn resolved_configuration(&self) -> BTreeMap<String, String> {
        let mut resolved = default_configuration();
        resolved.extend(self.configuration.iter().map(|(k, v)| (k.clone(), v.clone())));
        resolved
    }
}

/// Hook run on every new session once its poolers are registered.
pub type PostConfigureHook = Box<dyn Fn(&Session) -> Result<()>>;

struct ExtraConverter {
    name: String,
    codec: Rc<dyn Codec>,
    wire_types: Vec<String>,
}

pub struct SessionBuilder {
    config: SessionConfig,
    connector: Option<Rc<dyn Connector>>,
    converters: Vec<ExtraConverter>,
    hooks: Vec<PostConfigureHook>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .field(
                "converters",
                &self.converters.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            connector: None,
            converters: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Builder for the DSN in `PGFOUNDATION_DSN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dsn = lookup(DSN_ENV_VAR)
            .filter(|dsn| !dsn.trim().is_empty())
            .ok_or_else(|| {
                Error::foundation(
                    FoundationErrorKind::Configuration,
                    format!("{DSN_ENV_VAR} is not set"),
                )
            })?;
        Ok(Self::new(SessionConfig::new(dsn)))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transport used to open connections; the wire driver by default.
    pub fn with_connector(mut self, connector: Rc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.configuration.insert(key.into(), value.into());
        self
    }

    /// Register `codec` for `wire_types` in every session built. A name
    /// already used by a built-in codec replaces it.
    pub fn add_converter(mut self, name: impl Into<String>, codec: Rc<dyn Codec>, wire_types: &[&str]) -> Self {
        self.converters.push(ExtraConverter {
            name: name.into(),
            codec,
            wire_types: wire_types.iter().map(|t| (*t).to_string()).collect(),
        });
        self
    }

    pub fn with_post_configure(mut self, hook: impl Fn(&Session) -> Result<()> + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Build a session. `stamp` overrides the configured stamp.
    ///
    /// No connection is opened here; the first statement opens it.
    pub fn build_session(&self, stamp: Option<&str>) -> Result<Session> {
        let stamp = stamp.map(str::to_string).or_else(|| self.config.stamp.clone());
        let connector = self
            .connector
            .clone()
            .unwrap_or_else(|| Rc::new(PgConnector::new()) as Rc<dyn Connector>);
        let connection = Connection::new(
            self.config.dsn.clone(),
            connector,
            self.config.resolved_configuration(),
        );
        let session = Session::new(connection, stamp);

        let mut registry = ConverterRegistry::with_defaults();
        for extra in &self.converters {
            let wire_types: Vec<&str> = extra.wire_types.iter().map(String::as_str).collect();
            registry.register(&extra.name, Rc::clone(&extra.codec), &wire_types, true)?;
        }

        session.register_pooler(Rc::new(ConverterPooler::new(registry)))?;
        session.register_pooler(Rc::new(QueryManagerPooler::new()))?;
        session.register_pooler(Rc::new(QueryPooler::new()))?;
        session.register_pooler(Rc::new(PreparedStatementPooler::new()))?;
        session.register_pooler(Rc::new(InspectorPooler::new()))?;
        session.register_pooler(Rc::new(ListenerPooler::new()))?;
        session.register_pooler(Rc::new(ObserverPooler::new()))?;

        for hook in &self.hooks {
            hook(&session)?;
        }

        tracing::info!(stamp = ?session.stamp(), converters = self.converters.len(), "Session built");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::client_type;
    use crate::converter::{CompositeCodec, StringCodec};
    use crate::testing::MockConnector;
    use pgfoundation_core::Value;
    use std::cell::Cell;

    #[test]
    fn test_user_configuration_overrides_defaults() {
        let config = SessionConfig::from_json(
            r#"{"dsn": "pgsql://app@localhost/app", "configuration": {"timezone": "Europe/Paris", "search_path": "app"}}"#,
        )
        .unwrap();
        let resolved = config.resolved_configuration();
        assert_eq!(resolved["timezone"], "Europe/Paris");
        assert_eq!(resolved["search_path"], "app");
        assert_eq!(resolved["bytea_output"], "hex");
        assert_eq!(config.stamp, None);

        let err = SessionConfig::from_json(r#"{"configuration": {}}"#).unwrap_err();
        assert!(matches!(err, Error::Foundation(ref f) if f.kind == FoundationErrorKind::Configuration));
    }

    #[test]
    fn test_build_registers_seven_poolers() {
        let connector = MockConnector::new();
        let session = SessionBuilder::new(SessionConfig::new("pgsql://app@localhost/app"))
            .with_connector(connector.rc())
            .build_session(None)
            .unwrap();
        for pooler_type in [
            client_type::CONVERTER,
            client_type::QUERY_MANAGER,
            client_type::QUERY,
            client_type::PREPARED_STATEMENT,
            client_type::INSPECTOR,
            client_type::LISTENER,
            client_type::OBSERVER,
        ] {
            assert!(session.has_pooler_for_type(pooler_type), "{pooler_type}");
        }
        // lazy: nothing sent yet
        assert_eq!(connector.connects(), 0);
        assert_eq!(session.configuration()["datestyle"], "ISO");
    }

    #[test]
    fn test_stamp_and_hooks() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let builder = SessionBuilder::new(SessionConfig {
            stamp: Some("configured".to_string()),
            ..SessionConfig::new("pgsql://app@localhost/app")
        })
        .with_connector(MockConnector::new().rc())
        .with_post_configure(move |session| {
            counter.set(counter.get() + 1);
            session.listener("query").map(|_| ())
        });

        let first = builder.build_session(None).unwrap();
        assert_eq!(first.stamp(), Some("configured"));
        assert!(first.has_client(client_type::LISTENER, "query"));
        let second = builder.build_session(Some("override")).unwrap();
        assert_eq!(second.stamp(), Some("override"));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_failing_hook_fails_the_build() {
        let builder = SessionBuilder::new(SessionConfig::new("pgsql://app@localhost/app"))
            .with_connector(MockConnector::new().rc())
            .with_post_configure(|_| {
                Err(Error::foundation(FoundationErrorKind::Configuration, "nope"))
            });
        assert!(builder.build_session(None).is_err());
    }

    #[test]
    fn test_added_converters() {
        let session = SessionBuilder::new(SessionConfig::new("pgsql://app@localhost/app"))
            .with_connector(MockConnector::new().rc())
            .add_converter("Citext", Rc::new(StringCodec), &["citext"])
            .add_converter(
                "Pair",
                Rc::new(CompositeCodec::new(vec![
                    ("x".to_string(), "int4".to_string()),
                    ("y".to_string(), "citext".to_string()),
                ])),
                &["pair"],
            )
            .build_session(None)
            .unwrap();
        let value = session.decode_value(Some("(1,Hi)"), "pair").unwrap();
        assert_eq!(
            value,
            Value::Composite(BTreeMap::from([
                ("x".to_string(), Value::Int(1)),
                ("y".to_string(), Value::Text("Hi".into())),
            ]))
        );
        assert!(session.has_converter_for_type("_pair"));
    }

    #[test]
    fn test_from_env_lookup() {
        let builder = SessionBuilder::from_lookup(|key| {
            (key == DSN_ENV_VAR).then(|| "pgsql://env@localhost/env".to_string())
        })
        .unwrap();
        assert_eq!(builder.config().dsn, "pgsql://env@localhost/env");

        let err = SessionBuilder::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(DSN_ENV_VAR));
    }
}
