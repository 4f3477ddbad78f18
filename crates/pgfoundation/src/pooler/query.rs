use std::rc::Rc;

use pgfoundation_core::error::{Error, FoundationErrorKind, Result};

use super::{Pooler, PoolerContext};
use crate::client::{Client, client_type};
use crate::query::{PreparedStatement, Query, QueryKind, QueryManager};

/// `simple` and `prepared` query managers; `""` is `simple`.
#[derive(Debug, Default)]
pub struct QueryManagerPooler {
    context: PoolerContext,
}

impl QueryManagerPooler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pooler for QueryManagerPooler {
    fn pooler_type(&self) -> &str {
        client_type::QUERY_MANAGER
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        let kind = QueryKind::parse(identifier)?;
        self.context
            .get_or_create(client_type::QUERY_MANAGER, kind.as_str(), |_| {
                Ok(Rc::new(QueryManager::new(kind)))
            })
    }
}

/// One [`Query`] per SQL text.
#[derive(Debug, Default)]
pub struct QueryPooler {
    context: PoolerContext,
}

impl QueryPooler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pooler for QueryPooler {
    fn pooler_type(&self) -> &str {
        client_type::QUERY
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        require_sql(identifier)?;
        self.context.get_or_create(client_type::QUERY, identifier, |_| {
            Ok(Rc::new(Query::new(identifier)?))
        })
    }
}

/// One [`PreparedStatement`] per SQL text.
#[derive(Debug, Default)]
pub struct PreparedStatementPooler {
    context: PoolerContext,
}

impl PreparedStatementPooler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pooler for PreparedStatementPooler {
    fn pooler_type(&self) -> &str {
        client_type::PREPARED_STATEMENT
    }

    fn context(&self) -> &PoolerContext {
        &self.context
    }

    fn get_client(&self, identifier: &str) -> Result<Rc<dyn Client>> {
        require_sql(identifier)?;
        self.context
            .get_or_create(client_type::PREPARED_STATEMENT, identifier, |_| {
                Ok(Rc::new(PreparedStatement::new(identifier)?))
            })
    }
}

fn require_sql(sql: &str) -> Result<()> {
    if sql.trim().is_empty() {
        return Err(Error::foundation(
            FoundationErrorKind::UnknownClient,
            "a query needs a non-empty SQL text",
        ));
    }
    Ok(())
}
