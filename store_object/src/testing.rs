//! In-memory database for exercising the mapper without a real driver
//!
//! [`MemoryDatabase`] understands the statement shapes the mapper generates,
//! plus simple `SELECT <columns> FROM <table> [WHERE a = ? AND ...]
//! [ORDER BY c]` queries with `AS` aliases and `COUNT(*)`. It stores values
//! the way a driver would hand them back (integers at the column's width,
//! text checked against the declared length) and counts every catalog and
//! statement call so tests can assert on caching.
//!
//! ```ignore
//! let db = MemoryDatabase::new("memory://shop").with_table(
//!     MemoryTable::new("Orders")
//!         .column(MemoryColumn::new("ID", type_codes::BIGINT, "BIGINT").auto_increment().primary_key())
//!         .column(MemoryColumn::new("NAME", type_codes::VARCHAR, "VARCHAR").length(30)),
//! );
//! let mut connection = db.connect();
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use type_mapping::{SemanticType, Value};

use crate::driver::{CatalogColumn, Connection, DriverError, ResultColumn, ResultSet};

#[derive(Debug, Clone)]
pub struct MemoryColumn {
    name: String,
    type_code: i32,
    type_name: String,
    length: Option<usize>,
    default: Option<(String, Value)>,
    auto_increment: bool,
    primary_key: bool,
}

impl MemoryColumn {
    pub fn new(name: impl Into<String>, type_code: i32, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code,
            type_name: type_name.into(),
            length: None,
            default: None,
            auto_increment: false,
            primary_key: false,
        }
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Default expression reported by the catalog and the value it produces
    pub fn default_value(mut self, expression: impl Into<String>, value: Value) -> Self {
        self.default = Some((expression.into(), value));
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    fn semantic_type(&self) -> Option<SemanticType> {
        SemanticType::resolve(Some(self.type_code), Some(&self.type_name))
    }

    fn result_column(&self, label: &str, with_types: bool) -> ResultColumn {
        ResultColumn {
            label: label.to_string(),
            type_code: with_types.then_some(self.type_code),
            type_name: with_types.then(|| self.type_name.clone()),
            display_size: self.length,
            auto_increment: self.auto_increment,
        }
    }

    /// Convert a bound parameter into the shape this column stores
    fn store(&self, value: Value) -> Result<Value, DriverError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let out_of_range = || DriverError::new(format!("numeric value out of range for column {}", self.name));
        let stored = match self.semantic_type() {
            Some(SemanticType::BigInt) => Value::I64(integral(&value).ok_or_else(|| self.mismatch(&value))?),
            Some(SemanticType::Integer) => {
                let n = integral(&value).ok_or_else(|| self.mismatch(&value))?;
                Value::I32(i32::try_from(n).map_err(|_| out_of_range())?)
            }
            Some(SemanticType::SmallInt | SemanticType::TinyInt) => {
                let n = integral(&value).ok_or_else(|| self.mismatch(&value))?;
                Value::I16(i16::try_from(n).map_err(|_| out_of_range())?)
            }
            Some(SemanticType::Char | SemanticType::VarChar | SemanticType::LongVarChar) => {
                let text = match value {
                    Value::Text(text) | Value::Clob(text) | Value::Enum(text) => text,
                    other => other.to_string(),
                };
                if let Some(length) = self.length {
                    if text.chars().count() > length {
                        return Err(DriverError::new(format!(
                            "value too long for column {} ({})",
                            self.name, length
                        )));
                    }
                }
                Value::Text(text)
            }
            _ => value,
        };
        Ok(stored)
    }

    fn mismatch(&self, value: &Value) -> DriverError {
        DriverError::new(format!(
            "cannot store {} in {} column {}",
            value.kind_name(),
            self.type_name,
            self.name
        ))
    }
}

fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::I16(n) => Some(i64::from(*n)),
        Value::I32(n) => Some(i64::from(*n)),
        Value::I64(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<MemoryColumn>,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            next_id: 1,
        }
    }

    pub fn column(mut self, column: MemoryColumn) -> Self {
        self.columns.push(column);
        self
    }

    fn column_index(&self, name: &str) -> Result<usize, DriverError> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::new(format!("column {} not found in {}", name, self.name)))
    }

    fn insert(&mut self, assigned: Vec<(usize, Value)>) -> Result<Vec<Value>, DriverError> {
        let mut row = vec![Value::Null; self.columns.len()];
        let mut supplied = vec![false; self.columns.len()];
        for (index, value) in assigned {
            if let Some(column) = self.columns.get(index) {
                row[index] = column.store(value)?;
                supplied[index] = true;
            }
        }

        for (index, column) in self.columns.iter().enumerate() {
            if supplied[index] {
                continue;
            }
            if column.auto_increment {
                row[index] = column.store(Value::I64(self.next_id))?;
                self.next_id += 1;
            } else if let Some((_, value)) = &column.default {
                row[index] = value.clone();
            }
        }

        self.rows.push(row.clone());
        Ok(row)
    }
}

/// Number of calls made through every connection of a database
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub table_names: usize,
    pub catalog_columns: usize,
    pub primary_keys: usize,
    /// `SELECT * ... WHERE 1=0` column discovery queries
    pub projections: usize,
    pub queries: usize,
    pub executes: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
struct State {
    tables: Vec<MemoryTable>,
    counts: CallCounts,
    statements: Vec<String>,
    fail_next: Option<String>,
    hide_projection_types: bool,
    extra_name_characters: String,
}

impl State {
    fn table(&self, name: &str) -> Result<&MemoryTable, DriverError> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::new(format!("table {} not found", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, DriverError> {
        self.tables
            .iter_mut()
            .find(|table| table.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::new(format!("table {} not found", name)))
    }

    fn take_failure(&mut self) -> Result<(), DriverError> {
        match self.fail_next.take() {
            Some(message) => Err(DriverError::new(message)),
            None => Ok(()),
        }
    }
}

/// Shared in-memory database; clones and connections see the same data
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    endpoint: String,
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_table(self, table: MemoryTable) -> Self {
        self.create_table(table);
        self
    }

    pub fn create_table(&self, table: MemoryTable) {
        self.lock().tables.push(table);
    }

    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            endpoint: self.endpoint.clone(),
            state: Arc::clone(&self.state),
            auto_commit: true,
        }
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }

    /// Every statement run through `query` and `execute`, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Stored rows of `table`, keyed by column name
    pub fn rows(&self, table: &str) -> Vec<IndexMap<String, Value>> {
        let state = self.lock();
        match state.table(table) {
            Ok(table) => table
                .rows
                .iter()
                .map(|row| {
                    table
                        .columns
                        .iter()
                        .map(|column| column.name.clone())
                        .zip(row.iter().cloned())
                        .collect::<IndexMap<String, Value>>()
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Store a row directly, bypassing the statement parser
    pub fn insert_row(&self, table: &str, values: &[(&str, Value)]) -> Result<(), DriverError> {
        let mut state = self.lock();
        let table = state.table_mut(table)?;
        let assigned = values
            .iter()
            .map(|(name, value)| -> Result<(usize, Value), DriverError> {
                Ok((table.column_index(name)?, value.clone()))
            })
            .collect::<Result<Vec<_>, DriverError>>()?;
        table.insert(assigned)?;
        Ok(())
    }

    /// Make the next statement fail with a driver error
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Report column discovery projections without type codes or names
    pub fn hide_projection_types(&self) {
        self.lock().hide_projection_types = true;
    }

    pub fn set_extra_name_characters(&self, characters: impl Into<String>) {
        self.lock().extra_name_characters = characters.into();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryConnection {
    endpoint: String,
    state: Arc<Mutex<State>>,
    auto_commit: bool,
}

impl MemoryConnection {
    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for MemoryConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn table_names(&mut self) -> Result<Vec<String>, DriverError> {
        let mut state = self.lock();
        state.counts.table_names += 1;
        Ok(state.tables.iter().map(|table| table.name.clone()).collect())
    }

    fn catalog_columns(&mut self, table: &str) -> Result<Vec<CatalogColumn>, DriverError> {
        let mut state = self.lock();
        state.counts.catalog_columns += 1;
        let table = state.table(table)?;
        Ok(table
            .columns
            .iter()
            .map(|column| CatalogColumn {
                name: column.name.clone(),
                data_type: Some(column.type_code),
                type_name: Some(column.type_name.clone()),
                default: column.default.as_ref().map(|(expression, _)| expression.clone()),
                is_autoincrement: Some(column.auto_increment),
            })
            .collect())
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, DriverError> {
        let mut state = self.lock();
        state.counts.primary_keys += 1;
        let table = state.table(table)?;
        Ok(table
            .columns
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| column.name.clone())
            .collect())
    }

    fn extra_name_characters(&mut self) -> Result<String, DriverError> {
        Ok(self.lock().extra_name_characters.clone())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        if sql.ends_with("WHERE 1=0") {
            state.counts.projections += 1;
        } else {
            state.counts.queries += 1;
        }
        state.take_failure()?;
        run_select(&state, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        let (count, _) = self.execute_returning_keys(sql, params, &[])?;
        Ok(count)
    }

    fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: &[Value],
        key_columns: &[&str],
    ) -> Result<(u64, ResultSet), DriverError> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.counts.executes += 1;
        state.take_failure()?;

        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            run_insert(&mut state, rest, params, key_columns)
        } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
            Ok((run_update(&mut state, rest, params)?, ResultSet::default()))
        } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            Ok((run_delete(&mut state, rest, params)?, ResultSet::default()))
        } else {
            Err(unsupported(sql))
        }
    }

    fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.lock().counts.rollbacks += 1;
        Ok(())
    }
}

fn unsupported(sql: &str) -> DriverError {
    DriverError::new(format!("unsupported statement: {}", sql))
}

fn unquote(identifier: &str) -> &str {
    identifier
        .trim()
        .trim_matches(|c| matches!(c, '"' | '[' | ']' | '`'))
}

/// `"A" = ? AND "B" = ?` as column names; `1=0` as `None`
fn parse_conditions(clause: &str) -> Result<Option<Vec<String>>, DriverError> {
    if clause.trim() == "1=0" {
        return Ok(None);
    }
    clause
        .split(" AND ")
        .map(|condition| match condition.split_once('=') {
            Some((column, placeholder)) if placeholder.trim() == "?" => Ok(unquote(column).to_string()),
            _ => Err(unsupported(clause)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Row positions of `table` whose key columns equal `params`
fn matching_rows(
    table: &MemoryTable,
    conditions: &[String],
    params: &[Value],
) -> Result<Vec<usize>, DriverError> {
    if conditions.len() != params.len() {
        return Err(DriverError::new(format!(
            "expected {} parameters, got {}",
            conditions.len(),
            params.len()
        )));
    }

    let mut keys = Vec::with_capacity(conditions.len());
    for (name, param) in conditions.iter().zip(params) {
        let index = table.column_index(name)?;
        keys.push((index, table.columns[index].store(param.clone())?));
    }

    Ok(table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| keys.iter().all(|(index, value)| row[*index] == *value))
        .map(|(position, _)| position)
        .collect())
}

fn run_select(state: &State, sql: &str, params: &[Value]) -> Result<ResultSet, DriverError> {
    let rest = sql.strip_prefix("SELECT ").ok_or_else(|| unsupported(sql))?;
    let (projection, rest) = rest.split_once(" FROM ").ok_or_else(|| unsupported(sql))?;
    let (rest, order_by) = match rest.split_once(" ORDER BY ") {
        Some((rest, column)) => (rest, Some(unquote(column))),
        None => (rest, None),
    };
    let (table_name, conditions) = match rest.split_once(" WHERE ") {
        Some((table, clause)) => (table, parse_conditions(clause)?),
        None => (rest, Some(Vec::new())),
    };
    let table = state.table(unquote(table_name))?;
    let with_types = !(conditions.is_none() && state.hide_projection_types);

    let mut positions = match &conditions {
        Some(conditions) => matching_rows(table, conditions, params)?,
        None => Vec::new(),
    };
    if let Some(column) = order_by {
        let index = table.column_index(column)?;
        positions.sort_by(|a, b| {
            table.rows[*a][index]
                .to_string()
                .cmp(&table.rows[*b][index].to_string())
        });
    }

    if projection.trim() == "COUNT(*)" {
        let column = ResultColumn {
            label: "COUNT(*)".to_string(),
            type_code: Some(type_mapping::type_codes::BIGINT),
            type_name: Some("BIGINT".to_string()),
            display_size: Some(19),
            auto_increment: false,
        };
        return Ok(ResultSet::new(vec![column], vec![vec![Value::I64(positions.len() as i64)]]));
    }

    let mut selected: Vec<(usize, ResultColumn)> = Vec::new();
    if projection.trim() == "*" {
        for (index, column) in table.columns.iter().enumerate() {
            selected.push((index, column.result_column(&column.name, with_types)));
        }
    } else {
        for item in projection.split(", ") {
            let (name, label) = match item.split_once(" AS ") {
                Some((name, alias)) => (unquote(name), unquote(alias)),
                None => (unquote(item), unquote(item)),
            };
            let index = table.column_index(name)?;
            selected.push((index, table.columns[index].result_column(label, with_types)));
        }
    }

    let rows = positions
        .iter()
        .map(|position| {
            selected
                .iter()
                .map(|(index, _)| table.rows[*position][*index].clone())
                .collect()
        })
        .collect();
    let columns = selected.into_iter().map(|(_, column)| column).collect();
    Ok(ResultSet::new(columns, rows))
}

fn run_insert(
    state: &mut State,
    rest: &str,
    params: &[Value],
    key_columns: &[&str],
) -> Result<(u64, ResultSet), DriverError> {
    let (table_name, columns) = match rest.split_once(" (") {
        Some((table, tail)) => {
            let (columns, _) = tail.split_once(") VALUES").ok_or_else(|| unsupported(rest))?;
            (table, columns.split(", ").map(unquote).collect::<Vec<_>>())
        }
        None => {
            let table = rest
                .strip_suffix(" DEFAULT VALUES")
                .ok_or_else(|| unsupported(rest))?;
            (table, Vec::new())
        }
    };
    if columns.len() != params.len() {
        return Err(DriverError::new(format!(
            "expected {} parameters, got {}",
            columns.len(),
            params.len()
        )));
    }

    let table = state.table_mut(unquote(table_name))?;
    let assigned = columns
        .iter()
        .zip(params)
        .map(|(name, value)| -> Result<(usize, Value), DriverError> {
                Ok((table.column_index(name)?, value.clone()))
            })
        .collect::<Result<Vec<_>, DriverError>>()?;
    let row = table.insert(assigned)?;

    let mut keys = Vec::with_capacity(key_columns.len());
    let mut values = Vec::with_capacity(key_columns.len());
    for key in key_columns {
        let index = table.column_index(key)?;
        keys.push(table.columns[index].result_column(&table.columns[index].name, true));
        values.push(row[index].clone());
    }
    Ok((1, ResultSet::new(keys, vec![values])))
}

fn run_update(state: &mut State, rest: &str, params: &[Value]) -> Result<u64, DriverError> {
    let (table_name, rest) = rest.split_once(" SET ").ok_or_else(|| unsupported(rest))?;
    let (assignments, clause) = rest.split_once(" WHERE ").ok_or_else(|| unsupported(rest))?;
    let conditions = parse_conditions(clause)?.ok_or_else(|| unsupported(clause))?;
    let assignments = parse_conditions(&assignments.replace(", ", " AND "))?
        .ok_or_else(|| unsupported(assignments))?;
    if assignments.len() + conditions.len() != params.len() {
        return Err(DriverError::new(format!(
            "expected {} parameters, got {}",
            assignments.len() + conditions.len(),
            params.len()
        )));
    }
    let (values, keys) = params.split_at(assignments.len());

    let table = state.table_mut(unquote(table_name))?;
    let positions = matching_rows(table, &conditions, keys)?;
    let mut updates = Vec::with_capacity(assignments.len());
    for (name, value) in assignments.iter().zip(values) {
        let index = table.column_index(name)?;
        updates.push((index, table.columns[index].store(value.clone())?));
    }
    for position in &positions {
        for (index, value) in &updates {
            table.rows[*position][*index] = value.clone();
        }
    }
    Ok(positions.len() as u64)
}

fn run_delete(state: &mut State, rest: &str, params: &[Value]) -> Result<u64, DriverError> {
    let (table_name, clause) = rest.split_once(" WHERE ").ok_or_else(|| unsupported(rest))?;
    let conditions = parse_conditions(clause)?.ok_or_else(|| unsupported(clause))?;

    let table = state.table_mut(unquote(table_name))?;
    let positions = matching_rows(table, &conditions, params)?;
    let mut position = 0;
    table.rows.retain(|_| {
        let keep = !positions.contains(&position);
        position += 1;
        keep
    });
    Ok(positions.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_mapping::type_codes;

    fn database() -> MemoryDatabase {
        MemoryDatabase::new("memory://shop").with_table(
            MemoryTable::new("Orders")
                .column(
                    MemoryColumn::new("ID", type_codes::BIGINT, "BIGINT")
                        .auto_increment()
                        .primary_key(),
                )
                .column(MemoryColumn::new("NAME", type_codes::VARCHAR, "VARCHAR").length(5))
                .column(MemoryColumn::new("QTY", type_codes::INTEGER, "INT")),
        )
    }

    #[test]
    fn test_insert_generates_keys_and_counts_calls() {
        let db = database();
        let mut connection = db.connect();
        let (count, keys) = connection
            .execute_returning_keys(
                "INSERT INTO \"Orders\" (\"NAME\", \"QTY\") VALUES (?, ?)",
                &[Value::Text("pen".into()), Value::I64(3)],
                &["ID"],
            )
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(keys.rows, vec![vec![Value::I64(1)]]);
        assert_eq!(db.rows("Orders")[0]["QTY"], Value::I32(3));
        assert_eq!(db.counts().executes, 1);
    }

    #[test]
    fn test_overlong_text_is_rejected() {
        let db = database();
        let mut connection = db.connect();
        let result = connection.execute(
            "INSERT INTO \"Orders\" (\"NAME\") VALUES (?)",
            &[Value::Text("notebook".into())],
        );
        assert!(result.is_err());
        assert!(db.rows("Orders").is_empty());
    }

    #[test]
    fn test_select_update_delete_by_key() {
        let db = database();
        db.insert_row("Orders", &[("NAME", Value::Text("pen".into()))]).unwrap();
        db.insert_row("Orders", &[("NAME", Value::Text("ink".into()))]).unwrap();
        let mut connection = db.connect();

        let updated = connection
            .execute(
                "UPDATE \"Orders\" SET \"QTY\" = ? WHERE \"ID\" = ?",
                &[Value::I32(7), Value::I64(2)],
            )
            .unwrap();
        assert_eq!(updated, 1);

        let rs = connection
            .query(
                "SELECT \"NAME\" AS \"LABEL\", \"QTY\" FROM \"Orders\" WHERE \"ID\" = ?",
                &[Value::I32(2)],
            )
            .unwrap();
        assert_eq!(rs.columns[0].label, "LABEL");
        assert_eq!(rs.rows, vec![vec![Value::Text("ink".into()), Value::I32(7)]]);

        let deleted = connection
            .execute("DELETE FROM \"Orders\" WHERE \"ID\" = ?", &[Value::I64(1)])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.rows("Orders").len(), 1);
    }

    #[test]
    fn test_projection_can_hide_types() {
        let db = database();
        db.hide_projection_types();
        let mut connection = db.connect();
        let rs = connection
            .query("SELECT * FROM \"Orders\" WHERE 1=0", &[])
            .unwrap();
        assert!(rs.is_empty());
        assert_eq!(rs.columns.len(), 3);
        assert_eq!(rs.columns[0].type_code, None);
        assert!(rs.columns[0].auto_increment);
        assert_eq!(db.counts().projections, 1);
    }

    #[test]
    fn test_fail_next_fails_once() {
        let db = database();
        db.fail_next("connection reset");
        let mut connection = db.connect();
        let err = connection
            .query("SELECT COUNT(*) FROM \"Orders\"", &[])
            .unwrap_err();
        assert_eq!(err.message(), "connection reset");
        let rs = connection.query("SELECT COUNT(*) FROM \"Orders\"", &[]).unwrap();
        assert_eq!(rs.rows, vec![vec![Value::I64(0)]]);
    }
}
