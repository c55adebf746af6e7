//! 用户资料查询

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::model::DisplayProfile;

/// 加入会话时提供用户名/头像（外部用户服务实现）
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, user_id: u64) -> Result<DisplayProfile>;
}

/// 内存资料目录；未登记的用户以 "user-{id}" 作为用户名
#[derive(Default)]
pub struct InMemoryProfileDirectory {
    profiles: DashMap<u64, DisplayProfile>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: u64, profile: DisplayProfile) {
        self.profiles.insert(user_id, profile);
    }
}

#[async_trait]
impl ProfileLookup for InMemoryProfileDirectory {
    async fn lookup(&self, user_id: u64) -> Result<DisplayProfile> {
        Ok(self
            .profiles
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| DisplayProfile::new(format!("user-{}", user_id))))
    }
}
