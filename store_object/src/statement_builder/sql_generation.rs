//! SQL text generation
//!
//! Every identifier is wrapped in the connection's delimiters; parameters
//! use `?` placeholders bound in column order.

pub struct SqlGenerator;

/// Wrap an identifier in start and end delimiters
pub fn quote(identifier: &str, delimiters: (&str, &str)) -> String {
    let (start, end) = delimiters;
    format!("{}{}{}", start, identifier, end)
}

impl SqlGenerator {
    fn column_list(columns: &[&str], delimiters: (&str, &str)) -> String {
        columns
            .iter()
            .map(|column| quote(column, delimiters))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build `"A" = ? AND "B" = ?` over the key columns
    fn key_predicate(keys: &[&str], delimiters: (&str, &str)) -> String {
        keys.iter()
            .map(|key| format!("{} = ?", quote(key, delimiters)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn select_sql(
        table: &str,
        columns: &[&str],
        keys: &[&str],
        delimiters: (&str, &str),
    ) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            Self::column_list(columns, delimiters),
            quote(table, delimiters),
            Self::key_predicate(keys, delimiters)
        )
    }

    pub fn delete_sql(table: &str, keys: &[&str], delimiters: (&str, &str)) -> String {
        format!(
            "DELETE FROM {} WHERE {}",
            quote(table, delimiters),
            Self::key_predicate(keys, delimiters)
        )
    }

    pub fn insert_sql(table: &str, columns: &[&str], delimiters: (&str, &str)) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", quote(table, delimiters));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table, delimiters),
            Self::column_list(columns, delimiters),
            placeholders
        )
    }

    pub fn update_sql(
        table: &str,
        columns: &[&str],
        keys: &[&str],
        delimiters: (&str, &str),
    ) -> String {
        let assignments = columns
            .iter()
            .map(|column| format!("{} = ?", quote(column, delimiters)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE {} SET {} WHERE {}",
            quote(table, delimiters),
            assignments,
            Self::key_predicate(keys, delimiters)
        )
    }
}
