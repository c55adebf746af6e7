//! 参与者仓库 - PostgreSQL 实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ParticipantRepository;
use crate::error::{EngineError, Result};
use crate::model::{ParticipantKey, ParticipantRecord};

/// 参与者仓库 (PostgreSQL 实现)
///
/// 时间字段存储为 BIGINT 毫秒时间戳。upsert 对单调字段使用 GREATEST，
/// 多个引擎实例并发写同一行时已读序号和发言数也不会回退。
#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: Arc<PgPool>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    conversation_id: i64,
    user_id: i64,
    username: String,
    profile_photo_url: Option<String>,
    nickname: Option<String>,
    role_id: i64,
    role_name: String,
    joined_at: i64,
    last_active_at: i64,
    message_count: i64,
    is_active: bool,
    notifications_enabled: bool,
    is_muted: bool,
    muted_until: Option<i64>,
    last_read_message_seq: i64,
    last_read_timestamp: Option<i64>,
}

impl TryFrom<ParticipantRow> for ParticipantRecord {
    type Error = EngineError;

    fn try_from(r: ParticipantRow) -> Result<Self> {
        Ok(Self {
            conversation_id: from_db(r.conversation_id, "conversation_id")?,
            user_id: from_db(r.user_id, "user_id")?,
            username: r.username,
            profile_photo_url: r.profile_photo_url,
            nickname: r.nickname,
            role_id: from_db(r.role_id, "role_id")?,
            role_name: r.role_name,
            joined_at: from_millis(r.joined_at),
            last_active_at: from_millis(r.last_active_at),
            message_count: from_db(r.message_count, "message_count")?,
            is_active: r.is_active,
            notifications_enabled: r.notifications_enabled,
            is_muted: r.is_muted,
            muted_until: r.muted_until.and_then(DateTime::from_timestamp_millis),
            last_read_message_seq: from_db(r.last_read_message_seq, "last_read_message_seq")?,
            last_read_timestamp: r.last_read_timestamp.and_then(DateTime::from_timestamp_millis),
        })
    }
}

fn from_millis(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_default()
}

/// BIGINT 只能容纳 i64::MAX 以内的 u64，超出范围直接拒绝，不截断
fn to_db(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| EngineError::Validation(format!("{} out of BIGINT range: {}", field, value)))
}

/// 负值说明行已损坏，不能当作 0 读出（否则已读序号会回退）
fn from_db(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| EngineError::Validation(format!("{} is negative in storage: {}", field, value)))
}

const SELECT_COLUMNS: &str = r#"
    conversation_id, user_id, username, profile_photo_url, nickname,
    role_id, role_name, joined_at, last_active_at, message_count,
    is_active, notifications_enabled, is_muted, muted_until,
    last_read_message_seq, last_read_timestamp
"#;

impl PgParticipantRepository {
    /// 创建新的参与者仓库
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    async fn get(&self, key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
        let sql = format!(
            "SELECT {} FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ParticipantRow>(&sql)
            .bind(to_db(key.conversation_id, "conversation_id")?)
            .bind(to_db(key.user_id, "user_id")?)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| {
                EngineError::StorageUnavailable(format!("Failed to query participant: {}", e))
            })?;

        row.map(ParticipantRecord::try_from).transpose()
    }

    async fn put(&self, record: &ParticipantRecord) -> Result<()> {
        let conversation_id = to_db(record.conversation_id, "conversation_id")?;
        let user_id = to_db(record.user_id, "user_id")?;
        let role_id = to_db(record.role_id, "role_id")?;
        let message_count = to_db(record.message_count, "message_count")?;
        let last_read_seq = to_db(record.last_read_message_seq, "last_read_message_seq")?;

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (
                conversation_id, user_id, username, profile_photo_url, nickname,
                role_id, role_name, joined_at, last_active_at, message_count,
                is_active, notifications_enabled, is_muted, muted_until,
                last_read_message_seq, last_read_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                username = EXCLUDED.username,
                profile_photo_url = EXCLUDED.profile_photo_url,
                nickname = EXCLUDED.nickname,
                role_id = EXCLUDED.role_id,
                role_name = EXCLUDED.role_name,
                last_active_at = GREATEST(conversation_participants.last_active_at, EXCLUDED.last_active_at),
                message_count = GREATEST(conversation_participants.message_count, EXCLUDED.message_count),
                is_active = EXCLUDED.is_active,
                notifications_enabled = EXCLUDED.notifications_enabled,
                is_muted = EXCLUDED.is_muted,
                muted_until = EXCLUDED.muted_until,
                last_read_timestamp = CASE
                    WHEN EXCLUDED.last_read_message_seq > conversation_participants.last_read_message_seq
                        THEN EXCLUDED.last_read_timestamp
                    ELSE conversation_participants.last_read_timestamp
                END,
                last_read_message_seq = GREATEST(conversation_participants.last_read_message_seq, EXCLUDED.last_read_message_seq)
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(&record.username)
        .bind(&record.profile_photo_url)
        .bind(&record.nickname)
        .bind(role_id)
        .bind(&record.role_name)
        .bind(record.joined_at.timestamp_millis())
        .bind(record.last_active_at.timestamp_millis())
        .bind(message_count)
        .bind(record.is_active)
        .bind(record.notifications_enabled)
        .bind(record.is_muted)
        .bind(record.muted_until.map(|dt| dt.timestamp_millis()))
        .bind(last_read_seq)
        .bind(record.last_read_timestamp.map(|dt| dt.timestamp_millis()))
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| {
            tracing::error!(
                "❌ [ParticipantRepo] 写入失败: conversation={}, user={}, error={}",
                record.conversation_id,
                record.user_id,
                e
            );
            EngineError::StorageUnavailable(format!("Failed to upsert participant: {}", e))
        })?;

        Ok(())
    }

    async fn list_by_conversation(&self, conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
        let sql = format!(
            "SELECT {} FROM conversation_participants WHERE conversation_id = $1 ORDER BY joined_at ASC, user_id ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ParticipantRow>(&sql)
            .bind(to_db(conversation_id, "conversation_id")?)
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| {
                EngineError::StorageUnavailable(format!("Failed to list participants: {}", e))
            })?;

        rows.into_iter().map(ParticipantRecord::try_from).collect()
    }
}
