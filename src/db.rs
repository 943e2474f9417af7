use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement, TransactionTrait,
};
use tokio::fs;

pub type OrmConn = DatabaseConnection;

/// Arbitrary key shared by every process running migrations against the same database.
const MIGRATION_LOCK_KEY: i64 = 0x7061_796d_656e_7473;

/// Create a SeaORM connection pool.
pub async fn create_orm_conn(database_url: &str) -> Result<OrmConn> {
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5));
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// Execute the SQL files in `migrations/` in filename order.
///
/// Statements are re-runnable (`IF NOT EXISTS`). The whole run happens in one
/// transaction behind an advisory lock, so concurrent callers apply it once.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let mut entries = fs::read_dir("migrations").await?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let backend = conn.get_database_backend();
    let txn = conn.begin().await?;
    txn.execute(Statement::from_sql_and_values(
        backend,
        "SELECT pg_advisory_xact_lock($1)",
        [MIGRATION_LOCK_KEY.into()],
    ))
    .await?;

    for file in files {
        let sql = fs::read_to_string(&file).await?;
        // Prepared statements cannot hold several commands.
        for stmt in sql.split(';').map(str::trim).filter(|stmt| !stmt.is_empty()) {
            txn.execute(Statement::from_string(backend, format!("{stmt};")))
                .await?;
        }
        tracing::debug!(file = %file.display(), "migration applied");
    }

    txn.commit().await?;
    Ok(())
}
