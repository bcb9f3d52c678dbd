//! SQL dialects supported by the server
//!
//! Each dialect carries a small capability table: how it is named in prompts
//! and resource URIs, its default port, whether it stores table/column
//! comments, and how identifiers are quoted.

use std::fmt;
use std::str::FromStr;

use crate::config::DbConfig;
use crate::error::ConfigError;

/// Database engine family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    MySql,
    Postgres,
}

impl Dialect {
    /// Name used in prompts, logs and resource URI schemes
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgresql",
        }
    }

    /// Default TCP port, `None` for file-backed engines
    pub fn default_port(self) -> Option<u16> {
        match self {
            Dialect::Sqlite => None,
            Dialect::MySql => Some(3306),
            Dialect::Postgres => Some(5432),
        }
    }

    /// Whether the engine stores table and column comments
    pub fn supports_comments(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Quote an identifier, doubling any embedded quote characters
    pub fn quote_identifier(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote a table name, qualifying it with the schema when one is given
    pub fn qualified_table(self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Build the driver connection URL for this dialect
    pub fn connection_url(self, config: &DbConfig) -> Result<String, ConfigError> {
        match self {
            Dialect::Sqlite => {
                let path = config
                    .path
                    .as_ref()
                    .ok_or(ConfigError::Missing("DB_PATH"))?;
                Ok(format!("sqlite://{}", path.display()))
            }
            Dialect::MySql | Dialect::Postgres => {
                let scheme = match self {
                    Dialect::MySql => "mysql",
                    _ => "postgres",
                };
                let port = config.port.or(self.default_port()).unwrap_or_default();
                let mut url = url::Url::parse(&format!("{}://{}:{}", scheme, config.host, port))
                    .map_err(|e| ConfigError::Invalid {
                        key: "DB_HOST",
                        reason: e.to_string(),
                    })?;

                // Url percent-encodes user and password for us
                let invalid = |key: &'static str| ConfigError::Invalid {
                    key,
                    reason: "cannot be embedded in a connection URL".to_string(),
                };
                url.set_username(config.user.as_deref().unwrap_or_default())
                    .map_err(|_| invalid("DB_USER"))?;
                url.set_password(config.password.as_deref())
                    .map_err(|_| invalid("DB_PASSWORD"))?;
                url.set_path(config.database.as_deref().unwrap_or_default());

                Ok(url.to_string())
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            "postgresql" | "postgres" => Ok(Dialect::Postgres),
            other => Err(ConfigError::Invalid {
                key: "DB_DIALECT",
                reason: format!("unsupported database dialect '{}'", other),
            }),
        }
    }
}
