//! Scripted in-memory driver for unit tests.
//!
//! Every statement is logged. Answers come from a handler closure; the
//! default one acknowledges every statement with an empty command result and
//! rejects anything starting with `SELEC ` as a syntax error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use pgfoundation_core::error::{ConnectionErrorKind, Error, Result, SqlError};
use pgfoundation_core::{
    Connector, Driver, Dsn, FieldDescription, Notification, PreparedStatement, ResultSet,
};

pub(crate) type Handler = Rc<dyn Fn(&str) -> Result<Vec<ResultSet>>>;

#[derive(Default)]
pub(crate) struct MockState {
    pub log: Vec<String>,
    pub params: Vec<Vec<Option<String>>>,
    pub notifications: Vec<Notification>,
    pub broken: bool,
    pub connects: usize,
    pub closed: bool,
}

#[derive(Clone)]
pub(crate) struct MockConnector {
    state: Rc<RefCell<MockState>>,
    handler: Handler,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_handler(default_handler)
    }

    pub fn with_handler(handler: impl Fn(&str) -> Result<Vec<ResultSet>> + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::default())),
            handler: Rc::new(handler),
        }
    }

    pub fn rc(&self) -> Rc<dyn Connector> {
        Rc::new(self.clone())
    }

    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    pub fn params(&self) -> Vec<Vec<Option<String>>> {
        self.state.borrow().params.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    pub fn closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn set_ok(&self, ok: bool) {
        self.state.borrow_mut().broken = !ok;
    }

    pub fn push_notification(&self, channel: &str, payload: &str) {
        self.state.borrow_mut().notifications.push(Notification {
            channel: channel.to_string(),
            payload: payload.to_string(),
            process_id: 42,
        });
    }
}

impl Connector for MockConnector {
    fn connect(&self, _dsn: &Dsn) -> Result<Box<dyn Driver>> {
        self.state.borrow_mut().connects += 1;
        Ok(Box::new(MockDriver {
            state: Rc::clone(&self.state),
            handler: Rc::clone(&self.handler),
            prepared: HashMap::new(),
        }))
    }
}

struct MockDriver {
    state: Rc<RefCell<MockState>>,
    handler: Handler,
    prepared: HashMap<String, String>,
}

impl MockDriver {
    fn run(&self, sql: &str) -> Result<Vec<ResultSet>> {
        {
            let mut state = self.state.borrow_mut();
            if state.broken {
                return Err(Error::connection(
                    ConnectionErrorKind::Disconnected,
                    "mock connection lost",
                ));
            }
            state.log.push(sql.to_string());
        }
        (self.handler)(sql)
    }
}

impl Driver for MockDriver {
    fn simple_query(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        self.run(sql)
    }

    fn query_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet> {
        self.state.borrow_mut().params.push(params.to_vec());
        Ok(self.run(sql)?.into_iter().next().unwrap_or_default())
    }

    fn prepare(&mut self, name: &str, sql: &str) -> Result<PreparedStatement> {
        self.run(&format!("PREPARE {name} AS {sql}"))?;
        self.prepared.insert(name.to_string(), sql.to_string());
        Ok(PreparedStatement::new(name, sql, Vec::new(), Vec::new()))
    }

    fn execute_prepared(&mut self, name: &str, params: &[Option<String>]) -> Result<ResultSet> {
        let sql = self
            .prepared
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Sql(SqlError::new(format!("prepared statement \"{name}\" does not exist"))))?;
        self.state.borrow_mut().params.push(params.to_vec());
        Ok(self.run(&sql)?.into_iter().next().unwrap_or_default())
    }

    fn poll_notifications(&mut self) -> Result<Vec<Notification>> {
        Ok(std::mem::take(&mut self.state.borrow_mut().notifications))
    }

    fn is_ok(&self) -> bool {
        !self.state.borrow().broken
    }

    fn close(&mut self) -> Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }

    fn builtin_type_name(&self, oid: u32) -> Option<&'static str> {
        pgfoundation_postgres::builtin_type_name(oid)
    }
}

fn default_handler(sql: &str) -> Result<Vec<ResultSet>> {
    if sql.starts_with("SELEC ") {
        return Err(Error::Sql(SqlError {
            sqlstate: Some("42601".to_string()),
            severity: Some("ERROR".to_string()),
            ..SqlError::new("syntax error at or near \"SELEC\"")
        }));
    }
    Ok(sql
        .split("; ")
        .map(|statement| {
            let tag = statement.split_whitespace().next().unwrap_or("SELECT");
            ResultSet::command(tag)
        })
        .collect())
}

/// Text-format result with `(name, oid)` columns.
pub(crate) fn text_result(columns: &[(&str, u32)], rows: Vec<Vec<Option<&str>>>) -> ResultSet {
    let count = rows.len();
    ResultSet::new(
        columns
            .iter()
            .map(|(name, oid)| FieldDescription::new(*name, *oid))
            .collect(),
        rows.into_iter()
            .map(|row| row.into_iter().map(|cell| cell.map(str::to_string)).collect())
            .collect(),
        Some(format!("SELECT {count}")),
    )
}

/// Session over `connector` with the default converters and poolers.
pub(crate) fn default_session(connector: &MockConnector) -> crate::Session {
    crate::SessionBuilder::new(crate::SessionConfig::new("pgsql://tester@localhost/test"))
        .with_connector(connector.rc())
        .build_session(Some("test"))
        .expect("mock session builds")
}
