use std::fmt;
use std::time::Instant;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};
use pgfoundation_core::Value;
use serde_json::json;

use crate::client::{Client, ClientContext, client_type};
use crate::result_iterator::ResultIterator;

/// How a [`QueryManager`] runs statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Extended protocol, unnamed statement
    Simple,
    /// Named server-side prepared statement, reused per SQL text
    Prepared,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Simple => "simple",
            QueryKind::Prepared => "prepared",
        }
    }

    /// Parse a manager identifier; `""` selects `simple`.
    pub fn parse(identifier: &str) -> Result<Self> {
        match identifier {
            "" | "simple" => Ok(QueryKind::Simple),
            "prepared" => Ok(QueryKind::Prepared),
            other => Err(Error::foundation(
                FoundationErrorKind::UnknownClient,
                format!("unknown query manager '{other}' (expected 'simple' or 'prepared')"),
            )),
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct QueryManager {
    kind: QueryKind,
    context: ClientContext,
}

impl QueryManager {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            context: ClientContext::new(),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Run `sql` with `params` and return the converted rows.
    ///
    /// Listeners for `query` (or exactly `query:pre` / `query:post`) are
    /// told before the statement is sent and after it succeeded.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<ResultIterator> {
        let session = self.context.session()?;
        let parameters = serde_json::to_value(params).map_err(|e| {
            Error::foundation(
                FoundationErrorKind::Configuration,
                format!("cannot serialize query parameters for listeners: {e}"),
            )
        })?;
        session.notify_listeners(
            "query:pre",
            &json!({
                "sql": sql,
                "parameters": parameters,
                "session_stamp": session.stamp(),
            }),
        )?;

        let started = Instant::now();
        let rows = match self.kind {
            QueryKind::Simple => session.query_client(sql)?.execute(params)?,
            QueryKind::Prepared => session.prepared_statement(sql)?.execute(params)?,
        };
        let elapsed = started.elapsed();
        tracing::debug!(
            kind = %self.kind,
            rows = rows.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Query executed"
        );

        session.notify_listeners(
            "query:post",
            &json!({
                "sql": sql,
                "parameters": parameters,
                "session_stamp": session.stamp(),
                "result_count": rows.len(),
                "time_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        )?;
        Ok(rows)
    }
}

impl Client for QueryManager {
    fn client_type(&self) -> &str {
        client_type::QUERY_MANAGER
    }

    fn client_identifier(&self) -> &str {
        self.kind.as_str()
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }
}
