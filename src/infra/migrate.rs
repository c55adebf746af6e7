//! 参与者表结构迁移
//!
//! 迁移文件在编译期嵌入，已执行的迁移记录在 `participant_engine_migrations` 表中。

use tracing::info;

use super::Database;
use crate::error::{EngineError, Result};

include!(concat!(env!("OUT_DIR"), "/migrations.rs"));

const MIGRATION_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS participant_engine_migrations (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

/// 单个迁移的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Applied(&'static str),
    Skipped(&'static str),
}

/// 按顺序执行尚未执行的迁移，每个迁移与其记录在同一事务中提交
pub async fn run_migrations(database: &Database) -> Result<Vec<MigrationStatus>> {
    let pool = database.pool();
    sqlx::raw_sql(MIGRATION_TABLE_DDL).execute(pool).await?;

    let applied: Vec<String> =
        sqlx::query_scalar("SELECT name FROM participant_engine_migrations ORDER BY id")
            .fetch_all(pool)
            .await?;

    let mut statuses = Vec::with_capacity(MIGRATIONS.len());
    for &(name, sql) in MIGRATIONS {
        if applied.iter().any(|a| a == name) {
            statuses.push(MigrationStatus::Skipped(name));
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            EngineError::StorageUnavailable(format!("migration {} failed: {}", name, e))
        })?;
        sqlx::query("INSERT INTO participant_engine_migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("✅ 迁移完成: {}", name);
        statuses.push(MigrationStatus::Applied(name));
    }
    Ok(statuses)
}
