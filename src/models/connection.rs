//! Backend-related data models.

use serde::{Deserialize, Serialize};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    #[default]
    MySQL,
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    /// Parse a backend from a URL scheme or a configuration value.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySQL),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Get the default port for this backend.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::PostgreSQL => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }

    /// Whether connecting requires a user, password and database name.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, Self::SQLite)
    }

    /// Quote an identifier (table or column name) for this backend.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", ident.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_scheme(s).ok_or_else(|| {
            format!(
                "Unknown database backend '{}'. Expected mysql, postgres or sqlite",
                s
            )
        })
    }
}
