//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use rowbind::prelude::*;
use rowbind::type_mapping::type_codes;
use store_object::testing::{MemoryColumn, MemoryDatabase, MemoryTable};

#[model]
pub struct Order {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    pub qty: i32,
    pub amount: Option<Decimal>,
    #[has_default]
    pub created: Option<NaiveDateTime>,
    pub snapshot: Snapshot,
}

#[model]
#[query_result]
pub struct OrderSummary {
    pub customer_name: String,
    pub order_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, SqlEnum)]
pub enum Status {
    #[default]
    Open,
    Closed,
}

#[model]
pub struct Ticket {
    #[primary_key]
    pub id: i32,
    #[column(name = "TITLE")]
    pub heading: String,
    pub status: Status,
    #[not_column]
    pub notes: Vec<String>,
}

/// No table of the shop resembles this name
#[model]
pub struct Invoice {
    pub id: i64,
}

#[model]
#[table(name = "AuditLog")]
pub struct AuditEntry {
    pub message: String,
}

pub fn default_created() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

pub fn shop() -> MemoryDatabase {
    MemoryDatabase::new("jdbc:h2:mem:shop")
        .with_table(
            MemoryTable::new("Orders")
                .column(
                    MemoryColumn::new("ID", type_codes::BIGINT, "BIGINT")
                        .auto_increment()
                        .primary_key(),
                )
                .column(MemoryColumn::new("NAME", type_codes::VARCHAR, "VARCHAR").length(10))
                .column(MemoryColumn::new("QTY", type_codes::INTEGER, "INTEGER"))
                .column(MemoryColumn::new("AMOUNT", type_codes::DECIMAL, "DECIMAL"))
                .column(
                    MemoryColumn::new("CREATED", type_codes::TIMESTAMP, "TIMESTAMP")
                        .default_value("CURRENT_TIMESTAMP", Value::Timestamp(default_created())),
                ),
        )
        .with_table(
            MemoryTable::new("Tickets")
                .column(MemoryColumn::new("ID", type_codes::INTEGER, "INTEGER").primary_key())
                .column(MemoryColumn::new("TITLE", type_codes::VARCHAR, "VARCHAR").length(40))
                .column(MemoryColumn::new("STATUS", type_codes::VARCHAR, "VARCHAR").length(10)),
        )
        .with_table(
            MemoryTable::new("AuditLog")
                .column(MemoryColumn::new("MESSAGE", type_codes::VARCHAR, "VARCHAR").length(100)),
        )
}

#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber capturing formatted log output
pub fn with_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
    (result, output)
}
