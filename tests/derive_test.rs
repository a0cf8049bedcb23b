//! Integration tests for the derive macros and facade configuration

mod common;

use common::{shop, Order, Status, Ticket};
use rowbind::prelude::*;

#[test]
fn test_derived_descriptor() {
    let descriptor = Order::describe();
    let names: Vec<&str> = descriptor.properties().iter().map(|p| p.name).collect();
    assert_eq!(names, ["id", "name", "qty", "amount", "created"]);

    let id = &descriptor.properties()[0];
    assert_eq!(id.hints.primary, Some(true));
    assert_eq!(id.hints.auto_increment, Some(true));
    assert_eq!(id.hints.has_default, None);
    assert!(descriptor.properties()[3].nullable);

    assert!(Order::is_change_tracked());
    assert!(!Ticket::is_change_tracked());
    assert_eq!(Order::table_hint(), None);

    let tickets = Ticket::describe();
    assert_eq!(tickets.properties().len(), 3);
    assert_eq!(tickets.properties()[1].hints.column, Some("TITLE"));
}

#[test]
fn test_sql_enum_field_type() {
    assert_eq!(Status::Closed.to_value(), Value::Enum("Closed".into()));
    assert_eq!(Status::from_value(Value::Text("Open".into())), Ok(Status::Open));
    assert!(Status::from_value(Value::Text("Pending".into())).is_err());
    assert_eq!(
        <Status as FieldType>::PROPERTY_TYPE,
        PropertyType::Enum(&["Open", "Closed"])
    );
}

#[test]
fn test_hinted_column_and_enum_round_trip_the_table() -> anyhow::Result<()> {
    let rowbind = Rowbind::default();
    let db = shop();
    let mut connection = db.connect();
    let mut session = rowbind.session(&mut connection)?;

    let mut ticket = Ticket {
        id: 7,
        heading: "Printer jammed".into(),
        status: Status::Closed,
        notes: vec!["kept in memory".into()],
    };
    session.insert(&mut ticket)?;

    assert!(db.statements().contains(
        &"INSERT INTO \"Tickets\" (\"ID\", \"TITLE\", \"STATUS\") VALUES (?, ?, ?)".to_string()
    ));
    assert_eq!(db.rows("Tickets")[0]["STATUS"], Value::Text("Closed".into()));

    let stored: Ticket = session
        .fetch_by_key(&[Value::I32(7)])?
        .expect("ticket 7 exists");
    assert_eq!(stored.heading, "Printer jammed");
    assert_eq!(stored.status, Status::Closed);
    assert!(stored.notes.is_empty());

    // Untracked types set every non-key column
    ticket.status = Status::Open;
    assert_eq!(session.update(&mut ticket)?, 1);
    assert_eq!(
        db.statements().last().map(String::as_str),
        Some("UPDATE \"Tickets\" SET \"TITLE\" = ?, \"STATUS\" = ? WHERE \"ID\" = ?")
    );
    assert_eq!(db.rows("Tickets")[0]["STATUS"], Value::Text("Open".into()));
    Ok(())
}

#[test]
fn test_configured_delimiters() -> anyhow::Result<()> {
    let config = AppConfig {
        metadata: MetadataConfig::new(16).with_delimiters("[", "]"),
        ..AppConfig::default()
    };
    let rowbind = Rowbind::new(config)?;
    let db = shop();
    let mut connection = db.connect();

    let metadata = rowbind.metadata(&mut connection)?;
    assert_eq!(metadata.delimiters(), ("[", "]"));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = AppConfig {
        metadata: MetadataConfig::new(0),
        ..AppConfig::default()
    };
    assert!(matches!(Rowbind::new(config), Err(RowbindError::Config(_))));
}

#[test]
fn test_config_from_toml() -> anyhow::Result<()> {
    let config = AppConfig::from_toml_str(
        r#"
        [coercion]
        strict = true
        "#,
    )?;
    let rowbind = Rowbind::new(config)?;
    assert!(rowbind.config().coercion.strict);
    assert_eq!(rowbind.config().metadata.initial_capacity, 32);
    Ok(())
}
