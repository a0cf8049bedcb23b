//! SQLite driver backed by rusqlite
//!
//! The catalog comes from `sqlite_master` and `PRAGMA table_info`. Result
//! columns report their declared type names, which SQLite keeps verbatim,
//! so kinds are resolved by name. Generated keys are read back through
//! `last_insert_rowid`, which is the value of an `INTEGER PRIMARY KEY`.
//!
//! ```ignore
//! let mut connection = SqliteConnection::open_in_memory("shop")?;
//! connection.execute_batch("CREATE TABLE Orders (ID INTEGER PRIMARY KEY, NAME VARCHAR(30))")?;
//! let mut session = rowbind.session(&mut connection)?;
//! ```

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection as RusqliteConnection};
use type_mapping::{debug_log, Value, DEFAULT_DATE_FORMAT};

use crate::driver::{CatalogColumn, Connection, DriverError, ResultColumn, ResultSet};

#[derive(Debug)]
pub struct SqliteConnection {
    endpoint: String,
    connection: RusqliteConnection,
}

impl SqliteConnection {
    /// Open a private in-memory database; `name` only distinguishes endpoints
    pub fn open_in_memory(name: &str) -> Result<Self, DriverError> {
        let connection = RusqliteConnection::open_in_memory()
            .map_err(|e| DriverError::with_cause("failed to open SQLite database", e))?;
        Ok(Self {
            endpoint: format!("sqlite::memory:{}", name),
            connection,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let connection = RusqliteConnection::open(path)
            .map_err(|e| DriverError::with_cause("failed to open SQLite database", e))?;
        Ok(Self {
            endpoint: format!("sqlite:{}", path.display()),
            connection,
        })
    }

    /// Run semicolon separated statements without parameters, such as schema setup
    pub fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        debug_log!("sqlite batch: {}", sql);
        self.connection
            .execute_batch(sql)
            .map_err(|e| DriverError::with_cause("failed to execute batch", e))
    }

    fn table_info(&self, table: &str) -> Result<Vec<TableInfo>, DriverError> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|e| DriverError::with_cause("failed to read table info", e))?;
        let rows = statement
            .query_map([], |row| {
                Ok(TableInfo {
                    name: row.get("name")?,
                    type_name: row.get("type")?,
                    default: row.get("dflt_value")?,
                    pk: row.get("pk")?,
                })
            })
            .map_err(|e| DriverError::with_cause("failed to read table info", e))?;
        let columns = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DriverError::with_cause("failed to read table info", e))?;

        if columns.is_empty() {
            return Err(DriverError::new(format!("no such table: {}", table)));
        }
        Ok(columns)
    }
}

/// One row of `PRAGMA table_info`
struct TableInfo {
    name: String,
    type_name: String,
    default: Option<String>,
    pk: i64,
}

impl Connection for SqliteConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn table_names(&mut self) -> Result<Vec<String>, DriverError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| DriverError::with_cause("failed to list tables", e))?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DriverError::with_cause("failed to list tables", e))?;
        names
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DriverError::with_cause("failed to list tables", e))
    }

    fn catalog_columns(&mut self, table: &str) -> Result<Vec<CatalogColumn>, DriverError> {
        let info = self.table_info(table)?;
        let key_count = info.iter().filter(|column| column.pk > 0).count();

        Ok(info
            .into_iter()
            .map(|column| {
                // Only a sole INTEGER PRIMARY KEY aliases the rowid
                let rowid = key_count == 1
                    && column.pk == 1
                    && column.type_name.eq_ignore_ascii_case("INTEGER");
                CatalogColumn {
                    name: column.name,
                    data_type: None,
                    type_name: Some(column.type_name).filter(|name| !name.is_empty()),
                    default: column.default,
                    is_autoincrement: Some(rowid),
                }
            })
            .collect())
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, DriverError> {
        let mut keys: Vec<TableInfo> = self
            .table_info(table)?
            .into_iter()
            .filter(|column| column.pk > 0)
            .collect();
        keys.sort_by_key(|column| column.pk);
        Ok(keys.into_iter().map(|column| column.name).collect())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|e| DriverError::with_cause("failed to prepare query", e))?;

        let columns: Vec<ResultColumn> = statement
            .columns()
            .iter()
            .map(|column| ResultColumn {
                type_name: column.decl_type().map(str::to_string),
                display_size: column.decl_type().and_then(declared_length),
                ..ResultColumn::new(column.name())
            })
            .collect();

        let bound: Vec<SqlValue> = params.iter().map(to_sql_value).collect();
        let mut rows = statement
            .query(params_from_iter(bound.iter()))
            .map_err(|e| DriverError::with_cause("failed to execute query", e))?;

        let mut values = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DriverError::with_cause("failed to fetch row", e))?
        {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                let value = row
                    .get_ref(index)
                    .map_err(|e| DriverError::with_cause("failed to read column value", e))?;
                record.push(from_sql_value(value)?);
            }
            values.push(record);
        }

        Ok(ResultSet::new(columns, values))
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        let bound: Vec<SqlValue> = params.iter().map(to_sql_value).collect();
        let count = self
            .connection
            .execute(sql, params_from_iter(bound.iter()))
            .map_err(|e| DriverError::with_cause("failed to execute statement", e))?;
        Ok(count as u64)
    }

    fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        key_columns: &[&str],
    ) -> Result<(u64, ResultSet), DriverError> {
        let count = self.execute(sql, params)?;
        // The rowid only ever stands for the first generated column
        let generated = match key_columns.first() {
            Some(key) if count > 0 => ResultSet::new(
                vec![ResultColumn::new(*key)],
                vec![vec![Value::I64(self.connection.last_insert_rowid())]],
            ),
            _ => ResultSet::default(),
        };
        Ok((count, generated))
    }

    fn is_auto_commit(&self) -> bool {
        self.connection.is_autocommit()
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        if self.connection.is_autocommit() {
            return Ok(());
        }
        self.execute_batch("ROLLBACK")
    }
}

/// Length of a character type such as `VARCHAR(30)`; SQLite itself never enforces it
fn declared_length(type_name: &str) -> Option<usize> {
    let lower = type_name.to_ascii_lowercase();
    if !(lower.contains("char") || lower.contains("clob") || lower.contains("text")) {
        return None;
    }
    let (_, rest) = lower.split_once('(')?;
    let (size, _) = rest.split_once(')')?;
    size.split(',').next()?.trim().parse().ok()
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Bind a mapper value in one of SQLite's storage classes
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::I16(n) => SqlValue::Integer(i64::from(*n)),
        Value::I32(n) => SqlValue::Integer(i64::from(*n)),
        Value::I64(n) => SqlValue::Integer(*n),
        Value::F32(f) => SqlValue::Real(f64::from(*f)),
        Value::F64(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::Text(text) | Value::Clob(text) | Value::Enum(text) => SqlValue::Text(text.clone()),
        Value::Bytes(bytes) | Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
        Value::Uuid(id) => SqlValue::Text(id.to_string()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(DEFAULT_DATE_FORMAT).to_string()),
        Value::TimestampTz(ts) => SqlValue::Text(ts.naive_utc().format(DEFAULT_DATE_FORMAT).to_string()),
        Value::Date(date) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
        Value::Time(time) => SqlValue::Text(time.format("%H:%M:%S").to_string()),
        Value::Json(json) => SqlValue::Text(json.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Result<Value, DriverError> {
    let value = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::I64(n),
        ValueRef::Real(f) => Value::F64(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| DriverError::with_cause("invalid UTF-8 in text value", e))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Item, Order};
    use crate::metadata::MetadataCache;
    use crate::session::Session;
    use config::MetadataConfig;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use type_mapping::Coercer;

    const SHOP: &str = "
        CREATE TABLE Orders (
            ID INTEGER PRIMARY KEY,
            NAME VARCHAR(30),
            QTY INTEGER,
            AMOUNT DECIMAL(10, 2),
            CREATED TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE Items (
            SKU VARCHAR(12) PRIMARY KEY,
            LABEL VARCHAR(10),
            PRICE DOUBLE
        );
    ";

    fn shop(name: &str) -> (SqliteConnection, Arc<MetadataCache>) {
        let mut connection = SqliteConnection::open_in_memory(name).unwrap();
        connection.execute_batch(SHOP).unwrap();
        let metadata = MetadataCache::new(&mut connection, &MetadataConfig::default()).unwrap();
        (connection, Arc::new(metadata))
    }

    #[test]
    fn test_catalog_reports_keys_defaults_and_rowid() {
        let mut connection = SqliteConnection::open_in_memory("catalog").unwrap();
        connection.execute_batch(SHOP).unwrap();

        assert_eq!(connection.table_names().unwrap(), vec!["Items", "Orders"]);
        assert_eq!(connection.primary_keys("Orders").unwrap(), vec!["ID"]);

        let columns = connection.catalog_columns("Orders").unwrap();
        assert_eq!(columns[0].is_autoincrement, Some(true));
        assert_eq!(columns[1].type_name.as_deref(), Some("VARCHAR(30)"));
        assert_eq!(columns[4].default.as_deref(), Some("CURRENT_TIMESTAMP"));

        let items = connection.catalog_columns("Items").unwrap();
        assert!(items.iter().all(|column| column.is_autoincrement == Some(false)));
        assert!(connection.catalog_columns("Missing").is_err());
    }

    #[test]
    fn test_declared_length_of_character_types() {
        assert_eq!(declared_length("VARCHAR(30)"), Some(30));
        assert_eq!(declared_length("nvarchar( 12 )"), Some(12));
        assert_eq!(declared_length("DECIMAL(10, 2)"), None);
        assert_eq!(declared_length("TEXT"), None);
    }

    #[test]
    fn test_order_maps_to_orders() {
        let (mut connection, metadata) = shop("resolve");
        assert_eq!(metadata.table_name::<Order>().unwrap(), "Orders");

        let columns = metadata.columns_of::<Order>(&mut connection).unwrap();
        assert_eq!(columns.primary_keys, vec!["ID"]);
        assert!(columns.get("ID").unwrap().auto_increment);
        assert!(columns.get("CREATED").unwrap().has_default);
        assert_eq!(columns.get("NAME").unwrap().native_type_name.as_deref(), Some("VARCHAR(30)"));
    }

    #[test]
    fn test_insert_populates_key_and_default_then_round_trips() {
        let (mut connection, metadata) = shop("insert");
        let insert = metadata.insert_statement(&Order::default(), &mut connection).unwrap();
        assert_eq!(
            insert.statement.sql,
            "INSERT INTO \"Orders\" (\"NAME\", \"QTY\", \"AMOUNT\") VALUES (?, ?, ?)"
        );

        let mut session = Session::new(&mut connection, metadata, Coercer::default());
        let mut order = Order {
            name: "Pens".into(),
            qty: 3,
            amount: Some(Decimal::new(1250, 2)),
            ..Order::default()
        };
        assert_eq!(session.insert(&mut order).unwrap(), 1);
        assert_eq!(order.id, 1);
        assert!(order.created.is_some());

        let fetched: Order = session.fetch_by_key(&[Value::I64(order.id)]).unwrap().unwrap();
        assert_eq!(fetched.name, order.name);
        assert_eq!(fetched.qty, order.qty);
        assert_eq!(fetched.amount, order.amount);
        assert_eq!(fetched.created, order.created);

        let mut second = Order {
            name: "Ink".into(),
            ..Order::default()
        };
        session.insert(&mut second).unwrap();
        assert_eq!(second.id, 2);
    }

    #[test]
    fn test_tracked_update_and_null_reads() {
        let (mut connection, metadata) = shop("update");
        let mut session = Session::new(&mut connection, metadata, Coercer::default());

        let mut order = Order {
            name: "Pens".into(),
            qty: 3,
            ..Order::default()
        };
        session.insert(&mut order).unwrap();
        assert_eq!(order.amount, None);
        assert_eq!(session.update(&mut order).unwrap(), 0);

        order.qty = 5;
        assert_eq!(session.update(&mut order).unwrap(), 1);

        session
            .execute("UPDATE \"Orders\" SET \"QTY\" = NULL WHERE \"ID\" = ?", &[Value::I64(order.id)])
            .unwrap();
        order.amount = Some(Decimal::ONE);
        assert!(session.fetch(&mut order).unwrap());
        assert_eq!(order.amount, None);
        assert_eq!(order.qty, 5);

        let counts = session.query_scalar::<i64>("SELECT COUNT(*) FROM \"Orders\"", &[]).unwrap();
        assert_eq!(counts, vec![1]);
    }

    #[test]
    fn test_keyed_table_without_generated_values() {
        let (mut connection, metadata) = shop("items");
        let mut session = Session::new(&mut connection, metadata, Coercer::default());

        let mut item = Item {
            sku: "P-1".into(),
            label: "Fountain pen".into(),
            price: 1.5,
        };
        session.insert(&mut item).unwrap();

        let fetched: Item = session.fetch_by_key(&[Value::Text("P-1".into())]).unwrap().unwrap();
        assert_eq!(fetched.label, "Fountain p");
        assert_eq!(fetched.price, 1.5);
        assert_eq!(session.delete(&fetched).unwrap(), 1);
    }

    #[test]
    fn test_driver_failure_rolls_back_open_transaction() {
        let (mut connection, metadata) = shop("rollback");
        connection.execute_batch("BEGIN").unwrap();
        assert!(!connection.is_auto_commit());
        let mut session = Session::new(&mut connection, metadata, Coercer::default());

        let mut order = Order {
            name: "Pens".into(),
            ..Order::default()
        };
        session.insert(&mut order).unwrap();

        let err = session
            .execute("INSERT INTO \"Missing\" (\"X\") VALUES (?)", &[Value::I64(1)])
            .unwrap_err();
        assert!(err.is_driver_failure());
        drop(session);

        assert!(connection.is_auto_commit());
        let rows = connection.query("SELECT COUNT(*) FROM \"Orders\"", &[]).unwrap();
        assert_eq!(rows.rows, vec![vec![Value::I64(0)]]);
    }
}
