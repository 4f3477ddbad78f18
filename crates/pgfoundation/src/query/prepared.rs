use std::cell::Cell;

use pgfoundation_core::error::Result;
use pgfoundation_core::Value;

use super::SqlTemplate;
use crate::client::{Client, ClientContext, client_type};
use crate::result_iterator::ResultIterator;

/// Client owning one server-side prepared statement.
///
/// The statement is named after the MD5 digest of its SQL, prepared on the
/// first [`execute`](Self::execute) and deallocated on shutdown.
#[derive(Debug)]
pub struct PreparedStatement {
    sql: String,
    name: String,
    template: SqlTemplate,
    prepared: Cell<bool>,
    context: ClientContext,
}

impl PreparedStatement {
    pub fn new(sql: impl Into<String>) -> Result<Self> {
        let sql = sql.into();
        Ok(Self {
            name: statement_name(&sql),
            template: SqlTemplate::parse(&sql)?,
            sql,
            prepared: Cell::new(false),
            context: ClientContext::new(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Server-side name, `pgf_<md5 of the sql>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.get()
    }

    pub fn execute(&self, params: &[Value]) -> Result<ResultIterator> {
        let session = self.context.session()?;
        let encoded = self.template.encode_parameters(&session, params)?;
        let result = {
            let mut connection = session.connection()?;
            if !self.prepared.get() {
                connection.prepare(&self.name, self.template.sql())?;
                self.prepared.set(true);
            }
            connection.execute_prepared(&self.name, &encoded)?
        };
        ResultIterator::new(result, &session)
    }
}

impl Client for PreparedStatement {
    fn client_type(&self) -> &str {
        client_type::PREPARED_STATEMENT
    }

    fn client_identifier(&self) -> &str {
        &self.sql
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }

    fn shutdown(&self) -> Result<()> {
        if !self.prepared.replace(false) {
            return Ok(());
        }
        let Ok(session) = self.context.session() else {
            return Ok(());
        };
        let mut connection = session.connection()?;
        if connection.is_open() {
            let sql = format!("DEALLOCATE {}", connection.escape_identifier(&self.name));
            connection.execute_raw(&sql)?;
        }
        Ok(())
    }
}

fn statement_name(sql: &str) -> String {
    format!("pgf_{:x}", md5::compute(sql.as_bytes()))
}
