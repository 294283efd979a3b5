//! SeaORM-based ledger database
//!
//! Connection handling for the upload ledger with support for:
//! - SQLite (default, file auto-created)
//! - PostgreSQL
//! - MySQL

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseBackend, DatabaseConnection};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

pub mod migrations;
pub mod repositories;

/// Database connection manager with multi-database support
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
    pub backend: DatabaseBackend,
    pub database_type: DatabaseType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl Database {
    /// Connect using the configured URL
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_type = Self::detect_database_type(&config.url)?;

        info!("Connecting to {} database", database_type.as_str());

        let connection_url = match database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&config.url)?,
            _ => config.url.clone(),
        };

        let mut connect_options = ConnectOptions::new(&connection_url);
        connect_options
            .max_connections(config.max_connections.unwrap_or(5))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        Self::connect(connect_options, database_type, &config.url).await
    }

    /// Private SQLite in-memory database, used by tests and one-shot commands
    pub async fn new_in_memory() -> Result<Self> {
        let mut connect_options = ConnectOptions::new("sqlite::memory:");
        // Every pooled connection would otherwise see its own empty database
        connect_options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        Self::connect(connect_options, DatabaseType::SQLite, "sqlite::memory:").await
    }

    async fn connect(
        options: ConnectOptions,
        database_type: DatabaseType,
        display_url: &str,
    ) -> Result<Self> {
        let connection = match SeaOrmDatabase::connect(options).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Database connection failed: {:?}", e);
                let mut source = e.source();
                let mut level = 0;
                while let Some(err) = source {
                    tracing::error!("  Level {}: {}", level, err);
                    source = err.source();
                    level += 1;
                }
                return Err(anyhow::anyhow!(
                    "Failed to connect to database at '{}': {}",
                    display_url,
                    e
                ));
            }
        };

        debug!("Database connection established successfully");

        Ok(Self {
            connection: Arc::new(connection),
            backend: database_type.backend(),
            database_type,
        })
    }

    /// Detect the database type from the URL
    fn detect_database_type(url: &str) -> Result<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            anyhow::bail!("Unsupported database URL format: {}", url);
        }
    }

    /// Ensure SQLite URL includes auto-creation mode if needed
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        if url.contains("mode=") || url.contains(":memory:") {
            return Ok(url.to_string());
        }

        let file_path = if let Some(path) = url.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = url.strip_prefix("sqlite:") {
            path
        } else {
            anyhow::bail!("Invalid SQLite URL format: {}", url);
        };
        // Drop any query string before touching the filesystem
        let file_path = file_path.split('?').next().unwrap_or(file_path);

        let path = std::path::Path::new(file_path);
        if path.exists() {
            debug!("SQLite database file already exists: {}", file_path);
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create directory for SQLite database: {}",
                    parent.display()
                )
            })?;
            info!("Created directory for SQLite database: {}", parent.display());
        }

        let auto_create_url = if url.contains('?') {
            format!("{}&mode=rwc", url)
        } else {
            format!("{}?mode=rwc", url)
        };

        debug!("SQLite URL with auto-creation: {}", auto_create_url);
        Ok(auto_create_url)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!(
            "Running database migrations for {}",
            self.database_type.as_str()
        );

        Migrator::up(&*self.connection, None)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the database connection
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
        }
    }

    fn backend(&self) -> DatabaseBackend {
        match self {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_database_type() {
        assert_eq!(
            Database::detect_database_type("sqlite://./data/x.db").unwrap(),
            DatabaseType::SQLite
        );
        assert_eq!(
            Database::detect_database_type("postgres://u@h/db").unwrap(),
            DatabaseType::PostgreSQL
        );
        assert!(Database::detect_database_type("memory:").is_err());
    }

    #[test]
    fn test_sqlite_url_gains_create_mode_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/ledger.db", dir.path().display());
        let rewritten = Database::ensure_sqlite_auto_creation(&url).unwrap();
        assert!(rewritten.ends_with("?mode=rwc"));
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn test_in_memory_database_migrates() {
        let db = Database::new_in_memory().await.unwrap();
        db.migrate().await.unwrap();
    }
}
