//! Query execution clients.
//!
//! - [`Query`]: one SQL text run with the extended protocol
//! - [`PreparedStatement`]: one SQL text prepared server-side on first use
//! - [`QueryManager`]: the entry point; picks one of the above per call and
//!   emits `query:pre` / `query:post` listener events

mod manager;
mod prepared;
mod template;

pub use manager::{QueryKind, QueryManager};
pub use prepared::PreparedStatement;
pub use template::SqlTemplate;

use pgfoundation_core::error::Result;
use pgfoundation_core::Value;

use crate::client::{Client, ClientContext, client_type};
use crate::result_iterator::ResultIterator;

/// Client running one SQL template with `execute_parameterized`.
#[derive(Debug)]
pub struct Query {
    sql: String,
    template: SqlTemplate,
    context: ClientContext,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Result<Self> {
        let sql = sql.into();
        Ok(Self {
            template: SqlTemplate::parse(&sql)?,
            sql,
            context: ClientContext::new(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }

    pub fn execute(&self, params: &[Value]) -> Result<ResultIterator> {
        let session = self.context.session()?;
        let encoded = self.template.encode_parameters(&session, params)?;
        let result = session
            .connection()?
            .execute_parameterized(self.template.sql(), &encoded)?;
        ResultIterator::new(result, &session)
    }
}

impl Client for Query {
    fn client_type(&self) -> &str {
        client_type::QUERY
    }

    fn client_identifier(&self) -> &str {
        &self.sql
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session, text_result};
    use std::rc::Rc;

    #[test]
    fn test_query_encodes_and_converts() {
        let connector = MockConnector::with_handler(|_| {
            Ok(vec![text_result(&[("n", 23)], vec![vec![Some("42")]])])
        });
        let session = default_session(&connector);
        let query = session.query_client("select $*::int4 + $* as n").unwrap();
        assert_eq!(query.template().sql(), "select $1::int4 + $2 as n");

        let mut rows = query.execute(&[Value::Int(40), Value::BigInt(2)]).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get_by_name("n"), Some(&Value::Int(42)));
        assert_eq!(
            connector.params(),
            vec![vec![Some("40".to_string()), Some("2".to_string())]]
        );
        assert!(Rc::ptr_eq(&query, &session.query_client("select $*::int4 + $* as n").unwrap()));
    }

    #[test]
    fn test_sql_error_leaves_connection_good() {
        let connector = MockConnector::new();
        let session = default_session(&connector);
        let err = session.query_client("SELEC 1").unwrap().execute(&[]).unwrap_err();
        assert_eq!(err.sqlstate(), Some("42601"));
        assert_eq!(
            session.connection().unwrap().status(),
            crate::connection::ConnectionStatus::Good
        );
    }
}
