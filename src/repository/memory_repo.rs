//! 参与者仓库 - 内存实现

use async_trait::async_trait;
use dashmap::DashMap;

use super::ParticipantRepository;
use crate::error::Result;
use crate::model::{ParticipantKey, ParticipantRecord};

/// 内存参与者仓库（测试与回放使用）
#[derive(Default)]
pub struct InMemoryParticipantRepository {
    records: DashMap<ParticipantKey, ParticipantRecord>,
}

impl InMemoryParticipantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryParticipantRepository {
    async fn get(&self, key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
        Ok(self.records.get(&key).map(|r| r.value().clone()))
    }

    async fn put(&self, record: &ParticipantRecord) -> Result<()> {
        self.records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn list_by_conversation(&self, conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
        let mut list: Vec<ParticipantRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().conversation_id == conversation_id)
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(list)
    }
}
