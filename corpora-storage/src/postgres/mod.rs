//! PostgreSQL backend: pooling, migrations, error translation.

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use tracing::{info, warn};

use corpora_config::DatabaseConfig;
use corpora_core::{CorporaError, Result};

mod embedded {
    refinery::embed_migrations!("src/postgres/migrations");
}

/// Pooled connection source shared by every repository.
pub struct PostgresBackend {
    pool: Pool,
    config: DatabaseConfig,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool_max", &self.config.pool_max)
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Build a pool from config. Connections are created lazily.
    ///
    /// # Errors
    ///
    /// `Database` when the connection string is unparseable or the pool
    /// cannot be constructed.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config =
            config.url.parse().map_err(|e: tokio_postgres::Error| {
                CorporaError::Database {
                    message: format!("invalid database url: {e}"),
                }
            })?;
        pg_config.options(&format!(
            "-c statement_timeout={}",
            config.statement_timeout_ms
        ));

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_max)
            .build()
            .map_err(|e| CorporaError::Database {
                message: format!("pool construction failed: {e}"),
            })?;

        Ok(Self { pool, config })
    }

    /// Check out a pooled connection.
    ///
    /// # Errors
    ///
    /// `Database` when the pool is exhausted or the server unreachable.
    pub async fn client(&self) -> Result<Object> {
        self.pool.get().await.map_err(|e| CorporaError::Database {
            message: format!("failed to get connection: {e}"),
        })
    }

    /// Regconfig used for full-text queries; must match the generated
    /// `tsv` column's configuration to hit the GIN index.
    #[must_use]
    pub fn text_search_config(&self) -> &str {
        &self.config.text_search_config
    }

    /// Run embedded migrations over a dedicated connection.
    ///
    /// # Errors
    ///
    /// `Database` when connecting or any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        let (mut client, connection) = tokio_postgres::connect(&self.config.url, NoTls)
            .await
            .map_err(|e| CorporaError::Database {
                message: format!("migration connection failed: {e}"),
            })?;
        let handle = tokio::spawn(async move {
            if let Err(error) = connection.await {
                warn!(%error, "migration connection task ended with error");
            }
        });

        let report = embedded::migrations::runner()
            .run_async(&mut client)
            .await
            .map_err(|e| CorporaError::Database {
                message: format!("migration failed: {e}"),
            })?;

        info!(
            applied = report.applied_migrations().len(),
            "database migrations up to date"
        );
        drop(client);
        handle.abort();
        Ok(())
    }
}

/// Translate a driver error into the taxonomy, mapping unique violations
/// to `Conflict`.
pub(crate) fn translate(error: &tokio_postgres::Error) -> CorporaError {
    if let Some(db_error) = error.as_db_error() {
        if db_error.code() == &SqlState::UNIQUE_VIOLATION {
            return CorporaError::Conflict {
                message: db_error.message().to_string(),
                resource: None,
            };
        }
    }
    CorporaError::Database {
        message: error.to_string(),
    }
}
