//! Hand-written entities and a small shop database shared by unit tests

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use type_mapping::{type_codes, FieldType, PropertyType, Value};

use crate::change_tracker::Snapshot;
use crate::testing::{MemoryColumn, MemoryDatabase, MemoryTable};
use crate::traits::{ColumnHints, Entity, EntityDescriptor, PropertyDescriptor, Reader, Writer};

pub fn default_created() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn shop() -> MemoryDatabase {
    MemoryDatabase::new("memory://shop")
        .with_table(
            MemoryTable::new("Orders")
                .column(
                    MemoryColumn::new("ID", type_codes::BIGINT, "BIGINT")
                        .auto_increment()
                        .primary_key(),
                )
                .column(MemoryColumn::new("NAME", type_codes::VARCHAR, "VARCHAR").length(30))
                .column(MemoryColumn::new("QTY", type_codes::INTEGER, "INTEGER"))
                .column(MemoryColumn::new("AMOUNT", type_codes::DECIMAL, "DECIMAL"))
                .column(
                    MemoryColumn::new("CREATED", type_codes::TIMESTAMP, "TIMESTAMP")
                        .default_value("CURRENT_TIMESTAMP", Value::Timestamp(default_created())),
                ),
        )
        .with_table(
            MemoryTable::new("Items")
                .column(
                    MemoryColumn::new("SKU", type_codes::VARCHAR, "VARCHAR")
                        .length(12)
                        .primary_key(),
                )
                .column(MemoryColumn::new("LABEL", type_codes::VARCHAR, "VARCHAR").length(10))
                .column(MemoryColumn::new("PRICE", type_codes::DOUBLE, "DOUBLE")),
        )
        .with_table(
            MemoryTable::new("AuditLog")
                .column(MemoryColumn::new("MESSAGE", type_codes::VARCHAR, "VARCHAR").length(100)),
        )
}

fn property<T>(
    name: &'static str,
    property_type: PropertyType,
    nullable: bool,
    reader: Reader<T>,
    writer: Writer<T>,
) -> PropertyDescriptor<T> {
    PropertyDescriptor {
        name,
        property_type,
        nullable,
        reader: Some(reader),
        writer: Some(writer),
        hints: ColumnHints::default(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: i64,
    pub name: String,
    pub qty: i32,
    pub amount: Option<Decimal>,
    pub created: Option<NaiveDateTime>,
    pub snapshot: Snapshot,
}

impl Entity for Order {
    fn type_name() -> &'static str {
        "Order"
    }

    fn is_change_tracked() -> bool {
        true
    }

    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new(
            "Order",
            vec![
                PropertyDescriptor {
                    hints: ColumnHints {
                        primary: Some(true),
                        auto_increment: Some(true),
                        ..ColumnHints::default()
                    },
                    ..property(
                        "id",
                        PropertyType::I64,
                        false,
                        |o: &Order| o.id.to_value(),
                        |o: &mut Order, v| i64::assign(&mut o.id, v),
                    )
                },
                property(
                    "name",
                    PropertyType::String,
                    false,
                    |o: &Order| o.name.to_value(),
                    |o: &mut Order, v| String::assign(&mut o.name, v),
                ),
                property(
                    "qty",
                    PropertyType::I32,
                    false,
                    |o: &Order| o.qty.to_value(),
                    |o: &mut Order, v| i32::assign(&mut o.qty, v),
                ),
                property(
                    "amount",
                    PropertyType::Decimal,
                    true,
                    |o: &Order| o.amount.to_value(),
                    |o: &mut Order, v| Option::<Decimal>::assign(&mut o.amount, v),
                ),
                property(
                    "created",
                    PropertyType::DateTime,
                    true,
                    |o: &Order| o.created.to_value(),
                    |o: &mut Order, v| Option::<NaiveDateTime>::assign(&mut o.created, v),
                ),
            ],
        )
    }

    fn snapshot(&self) -> Option<&Snapshot> {
        Some(&self.snapshot)
    }

    fn snapshot_mut(&mut self) -> Option<&mut Snapshot> {
        Some(&mut self.snapshot)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub sku: String,
    pub label: String,
    pub price: f64,
}

impl Entity for Item {
    fn type_name() -> &'static str {
        "Item"
    }

    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new(
            "Item",
            vec![
                property(
                    "sku",
                    PropertyType::String,
                    false,
                    |o: &Item| o.sku.to_value(),
                    |o: &mut Item, v| String::assign(&mut o.sku, v),
                ),
                property(
                    "label",
                    PropertyType::String,
                    false,
                    |o: &Item| o.label.to_value(),
                    |o: &mut Item, v| String::assign(&mut o.label, v),
                ),
                property(
                    "price",
                    PropertyType::F64,
                    false,
                    |o: &Item| o.price.to_value(),
                    |o: &mut Item, v| f64::assign(&mut o.price, v),
                ),
            ],
        )
    }
}

/// Table without a primary key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLog {
    pub message: String,
}

impl Entity for AuditLog {
    fn type_name() -> &'static str {
        "AuditLog"
    }

    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new(
            "AuditLog",
            vec![property(
                "message",
                PropertyType::String,
                false,
                |o: &AuditLog| o.message.to_value(),
                |o: &mut AuditLog, v| String::assign(&mut o.message, v),
            )],
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSummary {
    pub customer_name: String,
    pub order_count: i64,
}

impl Entity for OrderSummary {
    fn type_name() -> &'static str {
        "OrderSummary"
    }

    fn is_query_result() -> bool {
        true
    }

    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new(
            "OrderSummary",
            vec![
                property(
                    "customer_name",
                    PropertyType::String,
                    false,
                    |o: &OrderSummary| o.customer_name.to_value(),
                    |o: &mut OrderSummary, v| String::assign(&mut o.customer_name, v),
                ),
                property(
                    "order_count",
                    PropertyType::I64,
                    false,
                    |o: &OrderSummary| o.order_count.to_value(),
                    |o: &mut OrderSummary, v| i64::assign(&mut o.order_count, v),
                ),
            ],
        )
    }
}

/// Type with no matching table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget {
    pub id: i32,
}

impl Entity for Widget {
    fn type_name() -> &'static str {
        "Widget"
    }

    fn describe() -> EntityDescriptor<Self> {
        EntityDescriptor::new(
            "Widget",
            vec![property(
                "id",
                PropertyType::I32,
                false,
                |o: &Widget| o.id.to_value(),
                |o: &mut Widget, v| i32::assign(&mut o.id, v),
            )],
        )
    }
}

#[derive(Clone, Default)]
pub struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
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
    (result, logs.contents())
}
