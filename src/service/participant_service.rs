//! 会话参与者服务
//!
//! 维护每个 (会话, 用户) 的成员状态与已读状态：
//! - 加入 / 离开 / 重新加入（软生命周期，记录从不物理删除）
//! - 发言计数、最后活跃时间、已读序号（全部单调不减，max 合并，乱序与重放安全）
//! - 静音窗口、通知开关、会话内昵称、角色
//! - 展示视图：未读数、有效静音状态、显示名在查询时计算，不存储
//!
//! 同一参与者的修改通过 [`KeyLocks`] 串行化，不同参与者互不竞争。
//! 所有存储调用都带超时，超时或存储错误以 `StorageUnavailable` 原样返回，不重试。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, JoinBacklogPolicy};
use crate::domain::events::ParticipantEvent;
use crate::error::{EngineError, Result};
use crate::infra::{metrics, ConversationSequenceSource, EventBus, KeyLocks, ProfileLookup};
use crate::model::{
    DisplayProfile, MuteDuration, ParticipantKey, ParticipantRecord, ParticipantView,
    RoleAssignment,
};
use crate::repository::ParticipantRepository;

/// 参与者服务配置
#[derive(Debug, Clone)]
pub struct ParticipantServiceConfig {
    /// 单次存储调用超时
    pub storage_timeout: Duration,
    /// 新成员未读策略
    pub join_backlog: JoinBacklogPolicy,
    /// 自助静音默认时长
    pub default_mute: chrono::Duration,
}

impl Default for ParticipantServiceConfig {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(3),
            join_backlog: JoinBacklogPolicy::None,
            default_mute: chrono::Duration::hours(24),
        }
    }
}

impl From<&EngineConfig> for ParticipantServiceConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            storage_timeout: config.storage.timeout(),
            join_backlog: config.policy.join_backlog,
            default_mute: config.policy.default_mute(),
        }
    }
}

/// 加入会话请求
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub conversation_id: u64,
    pub user_id: u64,
    pub role: RoleAssignment,
    /// 为空时通过 ProfileLookup 查询
    pub profile: Option<DisplayProfile>,
    pub joined_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn new(conversation_id: u64, user_id: u64, role: RoleAssignment) -> Self {
        Self {
            conversation_id,
            user_id,
            role,
            profile: None,
            joined_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, profile: DisplayProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = joined_at;
        self
    }
}

/// 会话参与者服务
pub struct ParticipantService {
    repo: Arc<dyn ParticipantRepository>,
    sequences: Arc<dyn ConversationSequenceSource>,
    profiles: Arc<dyn ProfileLookup>,
    event_bus: Arc<EventBus>,
    locks: KeyLocks,
    config: ParticipantServiceConfig,
}

impl ParticipantService {
    /// 创建新的参与者服务
    pub fn new(
        repo: Arc<dyn ParticipantRepository>,
        sequences: Arc<dyn ConversationSequenceSource>,
        profiles: Arc<dyn ProfileLookup>,
        event_bus: Arc<EventBus>,
        config: ParticipantServiceConfig,
    ) -> Self {
        Self {
            repo,
            sequences,
            profiles,
            event_bus,
            locks: KeyLocks::new(),
            config,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ========== 命令 ==========

    /// 加入会话
    ///
    /// 已存在有效记录返回 `AlreadyParticipant`；已失效记录会被重新激活，
    /// 保留历史发言数和首次加入时间，已读推进到当前最大序号。
    pub async fn join(&self, request: JoinRequest) -> Result<ParticipantRecord> {
        let result = async move {
            let key = ParticipantKey::new(request.conversation_id, request.user_id);
            let _guard = self.locks.lock(key).await;

            let existing = self.load(key).await?;
            if let Some(record) = &existing {
                if record.is_active {
                    return Err(EngineError::already_participant(key.conversation_id, key.user_id));
                }
            }

            let profile = match request.profile {
                Some(profile) => profile,
                None => {
                    self.with_timeout("profile_lookup", self.profiles.lookup(key.user_id))
                        .await?
                }
            };
            let max_seq = self.max_sequence(key.conversation_id).await?;

            match existing {
                Some(mut record) => {
                    record.reactivate(request.role, profile, max_seq, request.joined_at);
                    self.save(&record).await?;
                    info!(
                        "🔁 重新加入会话: conversation={}, user={}, message_count={}",
                        key.conversation_id, key.user_id, record.message_count
                    );
                    self.event_bus.publish(ParticipantEvent::Rejoined {
                        conversation_id: key.conversation_id,
                        user_id: key.user_id,
                        username: record.username.clone(),
                    });
                    Ok(record)
                }
                None => {
                    let initial_read = match self.config.join_backlog {
                        JoinBacklogPolicy::None => max_seq,
                        JoinBacklogPolicy::Full => 0,
                    };
                    let role = request.role.clone();
                    let record = ParticipantRecord::new(
                        key.conversation_id,
                        key.user_id,
                        request.role,
                        profile,
                        request.joined_at,
                        initial_read,
                    );
                    self.save(&record).await?;
                    info!(
                        "✅ 加入会话: conversation={}, user={}, role={}, last_read_seq={}",
                        key.conversation_id, key.user_id, record.role_name, initial_read
                    );
                    self.event_bus.publish(ParticipantEvent::Joined {
                        conversation_id: key.conversation_id,
                        user_id: key.user_id,
                        username: record.username.clone(),
                        role,
                    });
                    Ok(record)
                }
            }
        }
        .await;
        self.observe("join", result)
    }

    /// 记录发送消息：发言数 +1，推进最后活跃时间，作者视为已读到该序号
    pub async fn record_message_sent(
        &self,
        conversation_id: u64,
        user_id: u64,
        message_seq: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let result = self
            .update_active(key, |record| {
                record.record_sent(message_seq, timestamp);
                true
            })
            .await
            .map(|record| {
                debug!(
                    "✉️ 记录发言: conversation={}, user={}, seq={}, count={}",
                    conversation_id, user_id, message_seq, record.message_count
                );
            });
        self.observe("record_message_sent", result)
    }

    /// 记录已读：只前进不后退，低于当前已读序号的回执是空操作
    pub async fn record_read(
        &self,
        conversation_id: u64,
        user_id: u64,
        up_to_seq: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let result = self
            .update_active(key, |record| record.mark_read(up_to_seq, timestamp))
            .await
            .map(|record| {
                debug!(
                    "👁 已读推进: conversation={}, user={}, requested={}, last_read_seq={}",
                    conversation_id, user_id, up_to_seq, record.last_read_message_seq
                );
            });
        self.observe("record_read", result)
    }

    /// 全部标记已读（推进到会话当前最大序号）
    pub async fn mark_all_read(
        &self,
        conversation_id: u64,
        user_id: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<u64> {
        let result = async move {
            let max_seq = self.max_sequence(conversation_id).await?;
            let key = ParticipantKey::new(conversation_id, user_id);
            let record = self
                .update_active(key, |record| record.mark_read(max_seq, timestamp))
                .await?;
            Ok(record.last_read_message_seq)
        }
        .await;
        self.observe("mark_all_read", result)
    }

    /// 设置静音到期时间，None 表示取消静音
    pub async fn set_mute(
        &self,
        conversation_id: u64,
        user_id: u64,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let now = Utc::now();
        let result = self
            .update_active(key, |record| {
                record.set_mute(until, now);
                true
            })
            .await
            .map(|_| {
                let event = match until {
                    Some(until) => {
                        info!(
                            "🔇 静音: conversation={}, user={}, until={}",
                            conversation_id, user_id, until
                        );
                        ParticipantEvent::Muted {
                            conversation_id,
                            user_id,
                            until,
                        }
                    }
                    None => {
                        info!("🔊 取消静音: conversation={}, user={}", conversation_id, user_id);
                        ParticipantEvent::Unmuted {
                            conversation_id,
                            user_id,
                        }
                    }
                };
                self.event_bus.publish(event);
            });
        self.observe("set_mute", result)
    }

    /// 按预设时长静音，返回到期时间
    pub async fn mute_for(
        &self,
        conversation_id: u64,
        user_id: u64,
        duration: MuteDuration,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let until = duration.until(now);
        self.set_mute(conversation_id, user_id, Some(until)).await?;
        Ok(until)
    }

    /// 自助静音（使用配置的默认时长）
    pub async fn mute_with_default(
        &self,
        conversation_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let until = now + self.config.default_mute;
        self.set_mute(conversation_id, user_id, Some(until)).await?;
        Ok(until)
    }

    /// 通知开关
    pub async fn set_notification_preference(
        &self,
        conversation_id: u64,
        user_id: u64,
        enabled: bool,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let result = self
            .update_active(key, |record| {
                let changed = record.notifications_enabled != enabled;
                record.notifications_enabled = enabled;
                changed
            })
            .await
            .map(|_| ());
        self.observe("set_notification_preference", result)
    }

    /// 设置会话内昵称，空值恢复为用户名
    pub async fn set_nickname(
        &self,
        conversation_id: u64,
        user_id: u64,
        nickname: Option<String>,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let result = self
            .update_active(key, |record| {
                record.set_nickname(nickname);
                true
            })
            .await
            .map(|record| {
                debug!(
                    "🏷 昵称更新: conversation={}, user={}, display_name={}",
                    conversation_id,
                    user_id,
                    record.display_name()
                );
            });
        self.observe("set_nickname", result)
    }

    /// 变更角色
    pub async fn set_role(
        &self,
        conversation_id: u64,
        user_id: u64,
        role: RoleAssignment,
    ) -> Result<()> {
        let key = ParticipantKey::new(conversation_id, user_id);
        let new_role = role.clone();
        let result = self
            .update_active(key, move |record| {
                let changed = record.role_id != role.role_id || record.role_name != role.role_name;
                record.role_id = role.role_id;
                record.role_name = role.role_name;
                changed
            })
            .await
            .map(|_| {
                info!(
                    "👤 角色变更: conversation={}, user={}, role={}",
                    conversation_id, user_id, new_role.role_name
                );
                self.event_bus.publish(ParticipantEvent::RoleChanged {
                    conversation_id,
                    user_id,
                    role: new_role,
                });
            });
        self.observe("set_role", result)
    }

    /// 离开会话（重复离开不是错误）
    pub async fn leave(&self, conversation_id: u64, user_id: u64) -> Result<()> {
        let result = async move {
            let key = ParticipantKey::new(conversation_id, user_id);
            let _guard = self.locks.lock(key).await;

            let mut record = self
                .load(key)
                .await?
                .ok_or_else(|| EngineError::not_participant(conversation_id, user_id))?;
            if !record.is_active {
                debug!(
                    "离开会话（已离开，忽略）: conversation={}, user={}",
                    conversation_id, user_id
                );
                return Ok(());
            }

            record.is_active = false;
            self.save(&record).await?;
            info!("👋 离开会话: conversation={}, user={}", conversation_id, user_id);
            self.event_bus.publish(ParticipantEvent::Left {
                conversation_id,
                user_id,
                username: record.username,
            });
            Ok(())
        }
        .await;
        self.observe("leave", result)
    }

    /// 刷新用户资料缓存（外部资料变更事件）
    ///
    /// 只刷新有效记录；已失效的记录保持离开时的资料，重新加入时再刷新。返回更新条数。
    pub async fn refresh_profile(
        &self,
        user_id: u64,
        conversation_ids: &[u64],
        profile: DisplayProfile,
    ) -> Result<usize> {
        let result = async move {
            let mut updated = 0;
            for &conversation_id in conversation_ids {
                let key = ParticipantKey::new(conversation_id, user_id);
                let _guard = self.locks.lock(key).await;
                match self.load(key).await? {
                    Some(mut record) if record.is_active => {
                        record.apply_profile(profile.clone());
                        self.save(&record).await?;
                        updated += 1;
                    }
                    _ => continue,
                }
            }
            debug!("资料刷新: user={}, updated={}", user_id, updated);
            Ok(updated)
        }
        .await;
        self.observe("refresh_profile", result)
    }

    /// 批量更新最后活跃时间，跳过不存在或已失效的用户，返回更新条数
    pub async fn touch_last_active(
        &self,
        conversation_id: u64,
        user_ids: &[u64],
        timestamp: DateTime<Utc>,
    ) -> Result<usize> {
        let result = async move {
            if user_ids.is_empty() {
                return Ok(0);
            }
            let mut updated = 0;
            for &user_id in user_ids {
                let key = ParticipantKey::new(conversation_id, user_id);
                let _guard = self.locks.lock(key).await;
                match self.load(key).await? {
                    Some(mut record) if record.is_active => {
                        if timestamp > record.last_active_at {
                            record.touch(timestamp);
                            self.save(&record).await?;
                        }
                        updated += 1;
                    }
                    _ => continue,
                }
            }
            debug!(
                "批量更新活跃时间: conversation={}, requested={}, updated={}",
                conversation_id,
                user_ids.len(),
                updated
            );
            Ok(updated)
        }
        .await;
        self.observe("touch_last_active", result)
    }

    /// 会话归档/删除时使所有成员失效，返回失效条数
    pub async fn deactivate_conversation(&self, conversation_id: u64) -> Result<usize> {
        let result = async move {
            let records = self.list_records(conversation_id).await?;
            let mut deactivated = 0;
            for candidate in records.into_iter().filter(|r| r.is_active) {
                let key = candidate.key();
                let _guard = self.locks.lock(key).await;
                // 加锁后重新读取，避免覆盖并发写入
                if let Some(mut record) = self.load(key).await? {
                    if record.is_active {
                        record.is_active = false;
                        self.save(&record).await?;
                        deactivated += 1;
                    }
                }
            }
            info!(
                "📦 会话成员全部失效: conversation={}, count={}",
                conversation_id, deactivated
            );
            Ok(deactivated)
        }
        .await;
        self.observe("deactivate_conversation", result)
    }

    // ========== 查询 ==========

    /// 获取参与者展示视图（有效或已失效的记录都可查询）
    pub async fn get_display_record(
        &self,
        conversation_id: u64,
        user_id: u64,
        max_sequence_in_conversation: u64,
        now: DateTime<Utc>,
    ) -> Result<ParticipantView> {
        let result = async move {
            let key = ParticipantKey::new(conversation_id, user_id);
            let record = self
                .load(key)
                .await?
                .ok_or_else(|| EngineError::not_participant(conversation_id, user_id))?;
            Ok(record.to_view(max_sequence_in_conversation, now))
        }
        .await;
        self.observe("get_display_record", result)
    }

    /// 列出参与者（按加入时间升序，相同时间按用户ID升序）
    pub async fn list_participants(
        &self,
        conversation_id: u64,
        include_inactive: bool,
    ) -> Result<Vec<ParticipantView>> {
        let max_seq = self.max_sequence(conversation_id).await;
        match max_seq {
            Ok(max_seq) => {
                self.list_participants_at(conversation_id, include_inactive, max_seq, Utc::now())
                    .await
            }
            Err(e) => self.observe("list_participants", Err(e)),
        }
    }

    /// 按给定序号和时刻列出参与者
    pub async fn list_participants_at(
        &self,
        conversation_id: u64,
        include_inactive: bool,
        max_sequence: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ParticipantView>> {
        let result = async move {
            let mut records: Vec<ParticipantRecord> = self
                .list_records(conversation_id)
                .await?
                .into_iter()
                .filter(|r| include_inactive || r.is_active)
                .collect();
            sort_by_join_order(&mut records);
            Ok(records
                .iter()
                .map(|r| r.to_view(max_sequence, now))
                .collect())
        }
        .await;
        self.observe("list_participants", result)
    }

    /// 有效成员数
    pub async fn count_active(&self, conversation_id: u64) -> Result<usize> {
        let result = async move {
            let records = self.list_records(conversation_id).await?;
            Ok(records.iter().filter(|r| r.is_active).count())
        }
        .await;
        self.observe("count_active", result)
    }

    /// 最近活跃的成员（按最后活跃时间倒序）
    pub async fn list_recently_active(
        &self,
        conversation_id: u64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ParticipantView>> {
        let result = async move {
            let max_seq = self.max_sequence(conversation_id).await?;
            let mut records: Vec<ParticipantRecord> = self
                .list_records(conversation_id)
                .await?
                .into_iter()
                .filter(|r| r.is_active)
                .collect();
            records.sort_by(|a, b| {
                b.last_active_at
                    .cmp(&a.last_active_at)
                    .then(a.user_id.cmp(&b.user_id))
            });
            Ok(records
                .iter()
                .take(limit)
                .map(|r| r.to_view(max_seq, now))
                .collect())
        }
        .await;
        self.observe("list_recently_active", result)
    }

    /// 会话管理员和版主（按加入顺序）
    pub async fn list_admins(
        &self,
        conversation_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ParticipantView>> {
        let result = async move {
            let max_seq = self.max_sequence(conversation_id).await?;
            let mut admins: Vec<ParticipantRecord> = self
                .list_records(conversation_id)
                .await?
                .into_iter()
                .filter(|r| r.is_active && r.role().is_admin())
                .collect();
            sort_by_join_order(&mut admins);
            Ok(admins.iter().map(|r| r.to_view(max_seq, now)).collect())
        }
        .await;
        self.observe("list_admins", result)
    }

    /// 需要收到新消息通知的用户：有效成员、开启通知、未静音，排除作者
    pub async fn notification_recipients(
        &self,
        conversation_id: u64,
        exclude_user: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<u64>> {
        let result = async move {
            let mut recipients: Vec<u64> = self
                .list_records(conversation_id)
                .await?
                .iter()
                .filter(|r| r.is_active && r.notifications_enabled && !r.is_muted_at(now))
                .filter(|r| Some(r.user_id) != exclude_user)
                .map(|r| r.user_id)
                .collect();
            recipients.sort_unstable();
            Ok(recipients)
        }
        .await;
        self.observe("notification_recipients", result)
    }

    // ========== 内部方法 ==========

    /// 加锁读取有效记录，修改后写回（`apply` 返回 false 时不写）
    async fn update_active<F>(&self, key: ParticipantKey, apply: F) -> Result<ParticipantRecord>
    where
        F: FnOnce(&mut ParticipantRecord) -> bool,
    {
        let _guard = self.locks.lock(key).await;
        let mut record = self.load_active(key).await?;
        if apply(&mut record) {
            self.save(&record).await?;
        }
        Ok(record)
    }

    async fn load(&self, key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
        self.with_timeout("get", self.repo.get(key)).await
    }

    async fn load_active(&self, key: ParticipantKey) -> Result<ParticipantRecord> {
        match self.load(key).await? {
            Some(record) if record.is_active => Ok(record),
            _ => Err(EngineError::not_participant(key.conversation_id, key.user_id)),
        }
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<()> {
        self.with_timeout("put", self.repo.put(record)).await
    }

    async fn list_records(&self, conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
        self.with_timeout(
            "list_by_conversation",
            self.repo.list_by_conversation(conversation_id),
        )
        .await
    }

    async fn max_sequence(&self, conversation_id: u64) -> Result<u64> {
        self.with_timeout("max_sequence", self.sequences.max_sequence(conversation_id))
            .await
    }

    /// 外部调用统一超时，超时映射为 StorageUnavailable
    async fn with_timeout<T, F>(&self, call: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = tokio::time::timeout(self.config.storage_timeout, fut).await;
        metrics::record_storage(call, start.elapsed().as_secs_f64());
        result?
    }

    fn observe<T>(&self, op: &'static str, result: Result<T>) -> Result<T> {
        metrics::record_op(op);
        if let Err(e) = &result {
            metrics::record_error(op, e.kind());
            warn!("⚠️ {} 失败: {}", op, e);
        }
        result
    }
}

/// 加入时间升序，相同时间按用户ID升序；不依赖仓库返回顺序
fn sort_by_join_order(records: &mut [ParticipantRecord]) {
    records.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then(a.user_id.cmp(&b.user_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryProfileDirectory, InMemorySequenceSource};
    use crate::model::DefaultRole;
    use crate::repository::InMemoryParticipantRepository;
    use async_trait::async_trait;

    /// 永不返回的仓库，用于验证超时
    struct StalledRepository;

    #[async_trait]
    impl ParticipantRepository for StalledRepository {
        async fn get(&self, _key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
            std::future::pending().await
        }

        async fn put(&self, _record: &ParticipantRecord) -> Result<()> {
            std::future::pending().await
        }

        async fn list_by_conversation(&self, _conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
            std::future::pending().await
        }
    }

    /// 总是失败的仓库
    struct BrokenRepository;

    #[async_trait]
    impl ParticipantRepository for BrokenRepository {
        async fn get(&self, _key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
            Err(EngineError::StorageUnavailable("connection refused".into()))
        }

        async fn put(&self, _record: &ParticipantRecord) -> Result<()> {
            Err(EngineError::StorageUnavailable("connection refused".into()))
        }

        async fn list_by_conversation(&self, _conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
            Err(EngineError::StorageUnavailable("connection refused".into()))
        }
    }

    fn service_with(repo: Arc<dyn ParticipantRepository>) -> ParticipantService {
        ParticipantService::new(
            repo,
            Arc::new(InMemorySequenceSource::new()),
            Arc::new(InMemoryProfileDirectory::new()),
            Arc::new(EventBus::new(16)),
            ParticipantServiceConfig {
                storage_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_storage_timeout_surfaces_as_unavailable() {
        let service = service_with(Arc::new(StalledRepository));
        let err = service
            .record_read(1, 1, 5, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_storage_error_is_propagated() {
        let service = service_with(Arc::new(BrokenRepository));
        let err = service
            .join(JoinRequest::new(1, 1, DefaultRole::ConversationMember.into()))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::StorageUnavailable("connection refused".into()));
    }

    #[tokio::test]
    async fn test_join_uses_profile_lookup() {
        let profiles = Arc::new(InMemoryProfileDirectory::new());
        profiles.insert(9, DisplayProfile::new("carol").with_photo("https://cdn/carol.png"));
        let service = ParticipantService::new(
            Arc::new(InMemoryParticipantRepository::new()),
            Arc::new(InMemorySequenceSource::new()),
            profiles,
            Arc::new(EventBus::new(16)),
            ParticipantServiceConfig::default(),
        );

        let record = service
            .join(JoinRequest::new(1, 9, DefaultRole::ConversationMember.into()))
            .await
            .unwrap();
        assert_eq!(record.username, "carol");
        assert_eq!(record.profile_photo_url.as_deref(), Some("https://cdn/carol.png"));
        assert!(record.notifications_enabled);
    }

    #[tokio::test]
    async fn test_full_backlog_policy() {
        let sequences = Arc::new(InMemorySequenceSource::new());
        sequences.observe(1, 40);
        let service = ParticipantService::new(
            Arc::new(InMemoryParticipantRepository::new()),
            sequences,
            Arc::new(InMemoryProfileDirectory::new()),
            Arc::new(EventBus::new(16)),
            ParticipantServiceConfig {
                join_backlog: JoinBacklogPolicy::Full,
                ..Default::default()
            },
        );

        service
            .join(JoinRequest::new(1, 2, DefaultRole::ConversationMember.into()))
            .await
            .unwrap();
        let view = service.get_display_record(1, 2, 40, Utc::now()).await.unwrap();
        assert_eq!(view.unread_count, 40);
    }

    #[tokio::test]
    async fn test_default_mute_duration() {
        let service = service_with(Arc::new(InMemoryParticipantRepository::new()));
        service
            .join(JoinRequest::new(1, 2, DefaultRole::ConversationMember.into()))
            .await
            .unwrap();

        let now = Utc::now();
        let until = service.mute_with_default(1, 2, now).await.unwrap();
        assert_eq!(until - now, chrono::Duration::hours(24));

        let view = service
            .get_display_record(1, 2, 0, now + chrono::Duration::hours(23))
            .await
            .unwrap();
        assert!(view.is_muted);
    }

    /// 按用户ID倒序返回的仓库
    struct ReverseOrderRepository(InMemoryParticipantRepository);

    #[async_trait]
    impl ParticipantRepository for ReverseOrderRepository {
        async fn get(&self, key: ParticipantKey) -> Result<Option<ParticipantRecord>> {
            self.0.get(key).await
        }

        async fn put(&self, record: &ParticipantRecord) -> Result<()> {
            self.0.put(record).await
        }

        async fn list_by_conversation(&self, conversation_id: u64) -> Result<Vec<ParticipantRecord>> {
            let mut records = self.0.list_by_conversation(conversation_id).await?;
            records.sort_by(|a, b| b.user_id.cmp(&a.user_id));
            Ok(records)
        }
    }

    #[tokio::test]
    async fn test_listing_order_does_not_depend_on_repository() {
        let service = service_with(Arc::new(ReverseOrderRepository(
            InMemoryParticipantRepository::new(),
        )));
        let t = Utc::now();
        for (user_id, offset) in [(1, 0), (2, 10), (3, 20), (4, 10)] {
            let role = if user_id % 2 == 0 {
                DefaultRole::ConversationAdmin
            } else {
                DefaultRole::ConversationModerator
            };
            service
                .join(JoinRequest::new(1, user_id, role.into()).at(t + chrono::Duration::seconds(offset)))
                .await
                .unwrap();
        }

        let users: Vec<u64> = service
            .list_participants(1, true)
            .await
            .unwrap()
            .iter()
            .map(|v| v.user_id)
            .collect();
        assert_eq!(users, vec![1, 2, 4, 3]);

        let admins: Vec<u64> = service
            .list_admins(1, t)
            .await
            .unwrap()
            .iter()
            .map(|v| v.user_id)
            .collect();
        assert_eq!(admins, vec![1, 2, 4, 3]);
    }

    #[tokio::test]
    async fn test_lock_table_does_not_grow_for_unknown_participants() {
        let service = service_with(Arc::new(InMemoryParticipantRepository::new()));
        for user_id in 0..10_000 {
            let err = service
                .record_read(1, user_id, 5, Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::NotParticipant { .. }));
        }
        assert_eq!(service.locks.len(), 0);

        service
            .join(JoinRequest::new(1, 7, DefaultRole::ConversationMember.into()))
            .await
            .unwrap();
        service.record_read(1, 7, 3, Utc::now()).await.unwrap();
        service.leave(1, 7).await.unwrap();
        assert!(service.locks.is_empty());
    }

    #[test]
    fn test_config_with_huge_default_mute_does_not_panic() {
        let mut config = EngineConfig::default();
        config.policy.default_mute_hours = i64::MAX;
        let service_config = ParticipantServiceConfig::from(&config);
        assert_eq!(
            service_config.default_mute,
            chrono::Duration::hours(crate::config::MAX_MUTE_HOURS)
        );
    }
}
