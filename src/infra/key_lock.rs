//! 按参与者主键加锁
//!
//! 同一 (会话, 用户) 的修改串行执行，不同参与者之间互不竞争。
//! 锁表只保存正在使用的键：最后一个持有者释放后条目即被移除。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::ParticipantKey;

#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<ParticipantKey, Arc<Mutex<()>>>,
}

/// 持有期间独占某个参与者；释放时清理不再被引用的锁条目
pub struct KeyGuard<'a> {
    locks: &'a DashMap<ParticipantKey, Arc<Mutex<()>>>,
    key: ParticipantKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // 先释放互斥锁，归还其持有的 Arc
        self.guard.take();
        // 分片锁下判断：等待者已克隆过 Arc，引用数 > 1 时保留
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某个参与者的锁，持有期间覆盖 get → 修改 → put
    pub async fn lock(&self, key: ParticipantKey) -> KeyGuard<'_> {
        // 先克隆出 Arc 再 await，避免持有 DashMap 分片锁跨越 await
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            locks: &self.locks,
            key,
            guard: Some(guard),
        }
    }

    /// 当前被持有或等待中的键数量
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
