//! 会话消息序号来源

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// 提供会话当前最大消息序号（外部消息存储实现）
#[async_trait]
pub trait ConversationSequenceSource: Send + Sync {
    async fn max_sequence(&self, conversation_id: u64) -> Result<u64>;

    /// 上报新消息序号；序号由外部消息存储分配时无需实现
    async fn advance(&self, _conversation_id: u64, _sequence: u64) -> Result<()> {
        Ok(())
    }
}

/// 内存序号表：随 MessageSent 事件推进，只增不减
#[derive(Default)]
pub struct InMemorySequenceSource {
    max_seq: DashMap<u64, u64>,
}

impl InMemorySequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察到新消息序号
    pub fn observe(&self, conversation_id: u64, sequence: u64) {
        let mut entry = self.max_seq.entry(conversation_id).or_insert(0);
        if sequence > *entry {
            *entry = sequence;
        }
    }

    pub fn current(&self, conversation_id: u64) -> u64 {
        self.max_seq.get(&conversation_id).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl ConversationSequenceSource for InMemorySequenceSource {
    async fn max_sequence(&self, conversation_id: u64) -> Result<u64> {
        Ok(self.current(conversation_id))
    }

    async fn advance(&self, conversation_id: u64, sequence: u64) -> Result<()> {
        self.observe(conversation_id, sequence);
        Ok(())
    }
}
