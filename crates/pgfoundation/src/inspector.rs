//! Catalog introspection.
//!
//! Every lookup runs through the session's default query manager, so the
//! answers come back already converted and the `query` listener events fire
//! for them like for any other statement.

use pgfoundation_core::error::{Error, Result};
use pgfoundation_core::{Row, Value};

use crate::client::{Client, ClientContext, client_type};

/// One column of a table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInformation {
    pub name: String,
    /// `format_type` spelling, e.g. `character varying(20)`
    pub type_name: String,
    pub default_value: Option<String>,
    pub is_notnull: bool,
    pub is_primary: bool,
    pub comment: Option<String>,
}

#[derive(Debug)]
pub struct Inspector {
    identifier: String,
    context: ClientContext,
}

impl Inspector {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            context: ClientContext::new(),
        }
    }

    fn rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.context.session()?.query(sql, params)?.extract()
    }

    /// User schemas, sorted; `pg_*` and `information_schema` are left out.
    pub fn schemas(&self) -> Result<Vec<String>> {
        self.rows(
            "select n.nspname as name \
             from pg_catalog.pg_namespace n \
             where n.nspname !~ '^pg_' and n.nspname <> 'information_schema' \
             order by n.nspname",
            &[],
        )?
        .iter()
        .map(|row| row.get_named("name"))
        .collect()
    }

    pub fn table_oid(&self, schema: &str, table: &str) -> Result<Option<u32>> {
        let rows = self.rows(
            "select c.oid as oid \
             from pg_catalog.pg_class c \
             join pg_catalog.pg_namespace n on n.oid = c.relnamespace \
             where n.nspname = $*::name and c.relname = $*::name",
            &[schema.into(), table.into()],
        )?;
        first_oid(&rows)
    }

    /// Columns of relation `oid` in attribute order.
    pub fn table_field_information(&self, oid: u32) -> Result<Vec<FieldInformation>> {
        let rows = self.rows(
            "select a.attname as name, \
                    pg_catalog.format_type(a.atttypid, a.atttypmod) as type, \
                    pg_catalog.pg_get_expr(d.adbin, d.adrelid) as default_value, \
                    a.attnotnull as is_notnull, \
                    exists(select 1 from pg_catalog.pg_index i \
                           where i.indrelid = a.attrelid and i.indisprimary \
                             and a.attnum = any(i.indkey)) as is_primary, \
                    pg_catalog.col_description(a.attrelid, a.attnum) as comment \
             from pg_catalog.pg_attribute a \
             left join pg_catalog.pg_attrdef d on d.adrelid = a.attrelid and d.adnum = a.attnum \
             where a.attrelid = $*::oid and a.attnum > 0 and not a.attisdropped \
             order by a.attnum",
            &[Value::from(oid)],
        )?;
        rows.iter()
            .map(|row| {
                Ok(FieldInformation {
                    name: row.get_named("name")?,
                    type_name: row.get_named("type")?,
                    default_value: row.get_named("default_value")?,
                    is_notnull: row.get_named("is_notnull")?,
                    is_primary: row.get_named("is_primary")?,
                    comment: row.get_named("comment")?,
                })
            })
            .collect()
    }

    /// Primary key columns of relation `oid` in key order; empty when the
    /// relation has none.
    pub fn primary_key(&self, oid: u32) -> Result<Vec<String>> {
        self.rows(
            "select a.attname as name \
             from pg_catalog.pg_index i \
             join pg_catalog.pg_attribute a on a.attrelid = i.indrelid and a.attnum = any(i.indkey) \
             where i.indrelid = $*::oid and i.indisprimary \
             order by array_position(i.indkey::int2[], a.attnum)",
            &[Value::from(oid)],
        )?
        .iter()
        .map(|row| row.get_named("name"))
        .collect()
    }

    pub fn type_oid(&self, schema: &str, name: &str) -> Result<Option<u32>> {
        let rows = self.rows(
            "select t.oid as oid \
             from pg_catalog.pg_type t \
             join pg_catalog.pg_namespace n on n.oid = t.typnamespace \
             where n.nspname = $*::name and t.typname = $*::name",
            &[schema.into(), name.into()],
        )?;
        first_oid(&rows)
    }

    /// Fields of a composite type as `(name, typname)` pairs in attribute
    /// order, ready for [`CompositeCodec::new`](crate::converter::CompositeCodec::new).
    /// Array fields carry the `_` spelling (`_varchar`).
    pub fn composite_structure(&self, schema: &str, name: &str) -> Result<Vec<(String, String)>> {
        self.rows(
            "select a.attname as name, t.typname as type \
             from pg_catalog.pg_type ct \
             join pg_catalog.pg_namespace n on n.oid = ct.typnamespace \
             join pg_catalog.pg_attribute a on a.attrelid = ct.typrelid \
             join pg_catalog.pg_type t on t.oid = a.atttypid \
             where n.nspname = $*::name and ct.typname = $*::name \
               and a.attnum > 0 and not a.attisdropped \
             order by a.attnum",
            &[schema.into(), name.into()],
        )?
        .iter()
        .map(|row| Ok((row.get_named("name")?, row.get_named("type")?)))
        .collect()
    }

    /// `server_version` as reported by the backend, e.g. `16.2`.
    pub fn server_version(&self) -> Result<String> {
        let rows = self.rows("show server_version", &[])?;
        match rows.first() {
            Some(row) => row.get_as(0),
            None => Err(Error::converter("text", "server did not report its version")),
        }
    }
}

fn first_oid(rows: &[Row]) -> Result<Option<u32>> {
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let oid: i64 = row.get_named("oid")?;
    u32::try_from(oid)
        .map(Some)
        .map_err(|_| Error::converter("oid", format!("oid {oid} out of range")))
}

impl Client for Inspector {
    fn client_type(&self) -> &str {
        client_type::INSPECTOR
    }

    fn client_identifier(&self) -> &str {
        &self.identifier
    }

    fn context(&self) -> &ClientContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, default_session, text_result};
    use pgfoundation_core::ResultSet;

    fn catalog(sql: &str) -> Result<Vec<ResultSet>> {
        let result = if sql.contains("pg_namespace n where") {
            text_result(&[("name", 19)], vec![vec![Some("app")], vec![Some("public")]])
        } else if sql.contains("from pg_catalog.pg_class") {
            text_result(&[("oid", 26)], vec![vec![Some("16384")]])
        } else if sql.contains("format_type") {
            text_result(
                &[
                    ("name", 19),
                    ("type", 25),
                    ("default_value", 25),
                    ("is_notnull", 16),
                    ("is_primary", 16),
                    ("comment", 25),
                ],
                vec![
                    vec![Some("id"), Some("integer"), Some("nextval('s'::regclass)"), Some("t"), Some("t"), None],
                    vec![Some("label"), Some("character varying(20)"), None, Some("f"), Some("f"), Some("shown")],
                ],
            )
        } else if sql.contains("indisprimary order by") {
            text_result(&[("name", 19)], vec![vec![Some("id")]])
        } else if sql.contains("ct.typrelid") {
            text_result(
                &[("name", 19), ("type", 19)],
                vec![vec![Some("a"), Some("int4")], vec![Some("b"), Some("_varchar")]],
            )
        } else if sql.contains("pg_catalog.pg_type t") {
            text_result(&[("oid", 26)], vec![])
        } else if sql.starts_with("show") {
            text_result(&[("server_version", 25)], vec![vec![Some("16.2")]])
        } else {
            ResultSet::command("SET")
        };
        Ok(vec![result])
    }

    #[test]
    fn test_catalog_lookups() {
        let session = default_session(&MockConnector::with_handler(catalog));
        let inspector = session.inspector().unwrap();
        assert_eq!(inspector.schemas().unwrap(), vec!["app", "public"]);
        assert_eq!(inspector.table_oid("public", "item").unwrap(), Some(16384));
        assert_eq!(inspector.type_oid("public", "missing").unwrap(), None);
        assert_eq!(inspector.primary_key(16384).unwrap(), vec!["id"]);
        assert_eq!(inspector.server_version().unwrap(), "16.2");

        let fields = inspector.table_field_information(16384).unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].is_primary && fields[0].is_notnull);
        assert_eq!(fields[1].type_name, "character varying(20)");
        assert_eq!(fields[1].default_value, None);
        assert_eq!(fields[1].comment.as_deref(), Some("shown"));
    }

    #[test]
    fn test_composite_structure_feeds_codec() {
        let connector = MockConnector::with_handler(catalog);
        let session = default_session(&connector);
        let fields = session
            .inspector()
            .unwrap()
            .composite_structure("public", "pikachu")
            .unwrap();
        assert_eq!(
            fields,
            vec![
                ("a".to_string(), "int4".to_string()),
                ("b".to_string(), "_varchar".to_string()),
            ]
        );
        assert!(connector.params().iter().any(|p| p == &vec![Some("public".to_string()), Some("pikachu".to_string())]));
    }
}
