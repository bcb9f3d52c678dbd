//! Configuration for the NL2SQL MCP server
//!
//! All settings come from environment variables (or the equivalent command
//! line flags) and are validated once at startup:
//!
//! - Database: `DB_DIALECT`, `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
//!   `DB_NAME`, `DB_PATH` (SQLite), `DB_SCHEMA`, `DB_TIMEOUT_SECS`
//! - Model: `MODEL_NAME`, `MODEL_KEY`, `MODEL_URL`, `MODEL_TIMEOUT_SECS`

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::db::Dialect;
use crate::error::ConfigError;

const DEFAULT_MODEL_NAME: &str = "qwen-max-0125";
const DEFAULT_MODEL_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Command line / environment arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "nl2sql-mcp")]
#[command(about = "MCP server answering natural-language questions with SQL")]
pub struct Cli {
    /// Database dialect: sqlite, mysql or postgresql
    #[arg(long, env = "DB_DIALECT", default_value = "mysql")]
    pub db_dialect: String,

    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port (defaults to the dialect's standard port)
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// SQLite database file
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Schema to introspect (defaults to the connection's default schema)
    #[arg(long, env = "DB_SCHEMA")]
    pub db_schema: Option<String>,

    /// Timeout for connecting and for each statement, in seconds
    #[arg(long, env = "DB_TIMEOUT_SECS", default_value_t = 30)]
    pub db_timeout_secs: u64,

    /// Chat model name
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// API key for the chat-completions endpoint
    #[arg(long, env = "MODEL_KEY", hide_env_values = true)]
    pub model_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    pub model_url: String,

    /// Timeout for each LLM request, in seconds
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 60)]
    pub model_timeout_secs: u64,
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DbConfig,
    pub model: ModelConfig,
}

/// Database connection settings
#[derive(Clone)]
pub struct DbConfig {
    pub dialect: Dialect,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// SQLite file path
    pub path: Option<PathBuf>,
    pub schema: Option<String>,
    pub timeout_secs: u64,
}

/// Chat model settings
#[derive(Clone)]
pub struct ModelConfig {
    pub name: String,
    pub key: String,
    pub url: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Validate parsed arguments into a configuration
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let database = DbConfig {
            dialect: cli.db_dialect.parse()?,
            host: cli.db_host,
            port: cli.db_port,
            user: non_empty(cli.db_user),
            password: non_empty(cli.db_password),
            database: non_empty(cli.db_name),
            path: cli.db_path,
            schema: non_empty(cli.db_schema),
            timeout_secs: cli.db_timeout_secs,
        };
        database.validate()?;

        let model = ModelConfig {
            name: cli.model_name,
            key: non_empty(cli.model_key).ok_or(ConfigError::Missing("MODEL_KEY"))?,
            url: cli.model_url,
            timeout_secs: cli.model_timeout_secs,
        };
        model.validate()?;

        Ok(Self { database, model })
    }
}

impl DbConfig {
    /// Check that the values required by the dialect are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.dialect {
            Dialect::Sqlite => {
                if self.path.is_none() {
                    return Err(ConfigError::Missing("DB_PATH"));
                }
            }
            Dialect::MySql | Dialect::Postgres => {
                if self.user.is_none() {
                    return Err(ConfigError::Missing("DB_USER"));
                }
                if self.password.is_none() {
                    return Err(ConfigError::Missing("DB_PASSWORD"));
                }
                if self.database.is_none() {
                    return Err(ConfigError::Missing("DB_NAME"));
                }
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Identifier shown as the database id in the M-Schema text
    pub fn db_id(&self) -> String {
        match self.dialect {
            Dialect::Sqlite => self
                .path
                .as_ref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            _ => self.database.clone().unwrap_or_default(),
        }
    }

    /// URI of the "describe schema" resource, e.g. `mysql://sales`
    pub fn schema_resource_uri(&self) -> String {
        format!("{}://{}", self.dialect.name(), self.db_id())
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        let mut redacted = self.clone();
        if redacted.password.is_some() {
            redacted.password = Some("***".to_string());
        }
        self.dialect
            .connection_url(&redacted)
            .unwrap_or_else(|e| format!("<{}>", e))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("MODEL_NAME"));
        }
        url::Url::parse(&self.url).map_err(|e| ConfigError::Invalid {
            key: "MODEL_URL",
            reason: e.to_string(),
        })?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MODEL_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Secrets stay out of Debug output

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("dialect", &self.dialect)
            .field("url", &self.redacted_url())
            .field("schema", &self.schema)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["nl2sql-mcp"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_mysql_config() {
        let cli = parse(&[
            "--db-user", "root",
            "--db-password", "secret",
            "--db-name", "shop",
            "--model-key", "sk-test",
        ]);
        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.database.dialect, Dialect::MySql);
        assert_eq!(config.database.db_id(), "shop");
        assert_eq!(config.database.schema_resource_uri(), "mysql://shop");
        assert_eq!(config.model.name, DEFAULT_MODEL_NAME);
        assert!(!config.database.redacted_url().contains("secret"));
        assert!(!format!("{:?}", config).contains("sk-test"));
    }

    #[test]
    fn test_missing_model_key_rejected() {
        let cli = parse(&[
            "--db-user", "root",
            "--db-password", "secret",
            "--db-name", "shop",
            "--model-key", "",
        ]);
        assert!(matches!(
            AppConfig::from_cli(cli),
            Err(ConfigError::Missing("MODEL_KEY"))
        ));
    }

    #[test]
    fn test_mysql_requires_credentials() {
        let cli = parse(&["--db-user", "root", "--db-name", "shop", "--model-key", "k"]);
        assert!(matches!(
            AppConfig::from_cli(cli),
            Err(ConfigError::Missing("DB_PASSWORD"))
        ));
    }

    #[test]
    fn test_sqlite_requires_path() {
        let cli = parse(&["--db-dialect", "sqlite", "--model-key", "k"]);
        assert!(matches!(
            AppConfig::from_cli(cli),
            Err(ConfigError::Missing("DB_PATH"))
        ));

        let cli = parse(&[
            "--db-dialect", "sqlite",
            "--db-path", "/tmp/book_1.sqlite",
            "--model-key", "k",
        ]);
        let config = AppConfig::from_cli(cli).unwrap();
        assert_eq!(config.database.db_id(), "book_1");
        assert_eq!(config.database.schema_resource_uri(), "sqlite://book_1");
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        let cli = parse(&["--db-dialect", "oracle", "--model-key", "k"]);
        assert!(matches!(
            AppConfig::from_cli(cli),
            Err(ConfigError::Invalid { key: "DB_DIALECT", .. })
        ));
    }
}
