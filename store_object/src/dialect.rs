//! Connection type detection and identifier quoting

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionType {
    Oracle,
    SqlServer,
    MySql,
    PostgreSql,
    Sqlite,
    H2,
    Derby,
    Firebird,
    HsqlDb,
    UCanAccess,
    Other,
}

impl ConnectionType {
    /// Detect the database product from an endpoint such as
    /// `jdbc:postgresql://host/db` or `mysql://host/db`
    pub fn from_endpoint(endpoint: &str) -> Self {
        let lower = endpoint.to_ascii_lowercase();
        for token in lower.split([':', '/', ';']) {
            let detected = match token {
                "oracle" => ConnectionType::Oracle,
                "sqlserver" | "jtds" | "mssql" => ConnectionType::SqlServer,
                "mysql" | "mariadb" => ConnectionType::MySql,
                "postgresql" | "postgres" => ConnectionType::PostgreSql,
                "sqlite" => ConnectionType::Sqlite,
                "h2" => ConnectionType::H2,
                "derby" => ConnectionType::Derby,
                "firebirdsql" | "firebird" => ConnectionType::Firebird,
                "hsqldb" => ConnectionType::HsqlDb,
                "ucanaccess" => ConnectionType::UCanAccess,
                _ => continue,
            };
            return detected;
        }
        ConnectionType::Other
    }

    /// Start and end delimiters wrapped around every identifier
    pub fn delimiters(&self) -> (&'static str, &'static str) {
        match self {
            ConnectionType::SqlServer | ConnectionType::UCanAccess => ("[", "]"),
            ConnectionType::MySql => ("`", "`"),
            _ => ("\"", "\""),
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
