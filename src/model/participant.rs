//! 会话参与者模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mute::effective_mute;
use super::role::RoleAssignment;

/// 参与者主键 (conversation_id, user_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantKey {
    pub conversation_id: u64,
    pub user_id: u64,
}

impl ParticipantKey {
    pub fn new(conversation_id: u64, user_id: u64) -> Self {
        Self {
            conversation_id,
            user_id,
        }
    }
}

/// 用户资料快照（由外部资料服务提供）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisplayProfile {
    pub username: String,
    pub profile_photo_url: Option<String>,
}

impl DisplayProfile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            profile_photo_url: None,
        }
    }

    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.profile_photo_url = Some(url.into());
        self
    }
}

/// 会话参与者记录（对应 conversation_participants 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// 会话ID
    pub conversation_id: u64,
    /// 用户ID
    pub user_id: u64,
    /// 用户名（资料缓存）
    pub username: String,
    /// 头像（资料缓存）
    pub profile_photo_url: Option<String>,
    /// 会话内昵称
    pub nickname: Option<String>,
    pub role_id: u64,
    pub role_name: String,
    /// 首次加入时间，重新加入时保持不变
    pub joined_at: DateTime<Utc>,
    /// 最后活跃时间（单调不减）
    pub last_active_at: DateTime<Utc>,
    /// 本会话内发送消息数（单调不减，失效后冻结）
    pub message_count: u64,
    pub is_active: bool,
    pub notifications_enabled: bool,
    /// 静音缓存，仅供存储层查询，读取时以 muted_until 为准
    pub is_muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
    /// 已读序号（单调不减）
    pub last_read_message_seq: u64,
    pub last_read_timestamp: Option<DateTime<Utc>>,
}

impl ParticipantRecord {
    /// 创建新的参与者
    pub fn new(
        conversation_id: u64,
        user_id: u64,
        role: RoleAssignment,
        profile: DisplayProfile,
        joined_at: DateTime<Utc>,
        initial_read_seq: u64,
    ) -> Self {
        Self {
            conversation_id,
            user_id,
            username: profile.username,
            profile_photo_url: profile.profile_photo_url,
            nickname: None,
            role_id: role.role_id,
            role_name: role.role_name,
            joined_at,
            last_active_at: joined_at,
            message_count: 0,
            is_active: true,
            notifications_enabled: true,
            is_muted: false,
            muted_until: None,
            last_read_message_seq: initial_read_seq,
            last_read_timestamp: Some(joined_at),
        }
    }

    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(self.conversation_id, self.user_id)
    }

    pub fn role(&self) -> RoleAssignment {
        RoleAssignment::new(self.role_id, self.role_name.clone())
    }

    /// 重新加入：保留历史发言数和加入时间，已读推进到当前最大序号
    pub fn reactivate(
        &mut self,
        role: RoleAssignment,
        profile: DisplayProfile,
        read_seq: u64,
        at: DateTime<Utc>,
    ) {
        self.is_active = true;
        self.role_id = role.role_id;
        self.role_name = role.role_name;
        self.apply_profile(profile);
        self.mark_read(read_seq, at);
        self.touch(at);
    }

    pub fn apply_profile(&mut self, profile: DisplayProfile) {
        self.username = profile.username;
        self.profile_photo_url = profile.profile_photo_url;
    }

    /// 推进已读：last_read = max(last_read, seq)，幂等且可交换。返回是否推进
    pub fn mark_read(&mut self, seq: u64, at: DateTime<Utc>) -> bool {
        if seq <= self.last_read_message_seq {
            return false;
        }
        self.last_read_message_seq = seq;
        self.last_read_timestamp = Some(at);
        true
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }

    /// 自己发的消息视为已读到该序号
    pub fn record_sent(&mut self, seq: u64, at: DateTime<Utc>) {
        self.message_count += 1;
        self.touch(at);
        self.mark_read(seq, at);
    }

    pub fn set_mute(&mut self, until: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.muted_until = until;
        self.is_muted = effective_mute(until, now);
    }

    /// 设置昵称：去除首尾空白，空串视为清除
    pub fn set_nickname(&mut self, nickname: Option<String>) {
        self.nickname = nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(nickname) if !nickname.is_empty() => nickname,
            _ => &self.username,
        }
    }

    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        effective_mute(self.muted_until, now)
    }

    /// 未读数：失效成员恒为 0，不会为负
    pub fn unread_count(&self, max_sequence: u64) -> u64 {
        if !self.is_active {
            return 0;
        }
        max_sequence.saturating_sub(self.last_read_message_seq)
    }

    /// 生成展示视图
    pub fn to_view(&self, max_sequence: u64, now: DateTime<Utc>) -> ParticipantView {
        ParticipantView {
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            username: self.username.clone(),
            profile_photo_url: self.profile_photo_url.clone(),
            nickname: self.nickname.clone(),
            role_id: self.role_id,
            role_name: self.role_name.clone(),
            display_name: self.display_name().to_string(),
            joined_at: self.joined_at,
            last_active_at: self.last_active_at,
            message_count: self.message_count,
            is_active: self.is_active,
            notifications_enabled: self.notifications_enabled,
            is_muted: self.is_muted_at(now),
            muted_until: self.muted_until,
            unread_count: self.unread_count(max_sequence),
            last_read_message_seq: self.last_read_message_seq,
            last_read_timestamp: self.last_read_timestamp,
        }
    }
}

/// 参与者展示视图（只读查询结果）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub conversation_id: u64,
    pub user_id: u64,
    pub username: String,
    pub profile_photo_url: Option<String>,
    pub nickname: Option<String>,
    pub role_id: u64,
    pub role_name: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: u64,
    pub is_active: bool,
    pub notifications_enabled: bool,
    /// 查询时刻的有效静音状态
    pub is_muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
    pub unread_count: u64,
    pub last_read_message_seq: u64,
    pub last_read_timestamp: Option<DateTime<Utc>>,
}
