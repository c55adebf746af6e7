use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ParticipantKey, ParticipantRecord};

/// 参与者仓库 trait
///
/// 只暴露引擎需要的三个操作，实现（PostgreSQL / 内存）可替换。
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// 根据 (会话, 用户) 查找参与者
    async fn get(&self, key: ParticipantKey) -> Result<Option<ParticipantRecord>>;

    /// 写入参与者（不存在则插入）
    async fn put(&self, record: &ParticipantRecord) -> Result<()>;

    /// 列出会话的所有参与者（含已失效），按 joined_at、user_id 升序
    async fn list_by_conversation(&self, conversation_id: u64) -> Result<Vec<ParticipantRecord>>;
}

pub mod memory_repo;
pub mod participant_repo;

pub use memory_repo::InMemoryParticipantRepository;
pub use participant_repo::PgParticipantRepository;
