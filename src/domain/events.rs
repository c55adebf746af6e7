use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MuteDuration, RoleAssignment};

/// 入站命令/事件（由分发器路由到参与者服务）
///
/// JSON 形如 `{"type": "read_receipt", "conversation_id": 1, ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantCommand {
    /// 消息已发送（消息入库组件上报）
    MessageSent {
        conversation_id: u64,
        author_id: u64,
        sequence: u64,
        timestamp: DateTime<Utc>,
    },

    /// 已读回执
    ReadReceipt {
        conversation_id: u64,
        user_id: u64,
        up_to_sequence: u64,
        timestamp: DateTime<Utc>,
    },

    /// 加入会话，资料由 ProfileLookup 提供
    Join {
        conversation_id: u64,
        user_id: u64,
        role_id: u64,
        role_name: String,
        timestamp: DateTime<Utc>,
    },

    Leave {
        conversation_id: u64,
        user_id: u64,
    },

    /// 静音：until 与 duration 都为空表示取消静音
    SetMute {
        conversation_id: u64,
        user_id: u64,
        #[serde(default)]
        until: Option<DateTime<Utc>>,
        #[serde(default)]
        duration: Option<MuteDuration>,
        timestamp: DateTime<Utc>,
    },

    SetNotificationPref {
        conversation_id: u64,
        user_id: u64,
        enabled: bool,
    },

    SetNickname {
        conversation_id: u64,
        user_id: u64,
        #[serde(default)]
        nickname: Option<String>,
    },

    SetRole {
        conversation_id: u64,
        user_id: u64,
        role_id: u64,
        role_name: String,
    },

    /// 用户资料变更，刷新其所在会话的资料缓存
    ProfileUpdated {
        user_id: u64,
        conversation_ids: Vec<u64>,
        username: String,
        #[serde(default)]
        profile_photo_url: Option<String>,
    },
}

impl ParticipantCommand {
    /// 路由名（日志/指标标签）
    pub fn route(&self) -> &'static str {
        match self {
            ParticipantCommand::MessageSent { .. } => "message_sent",
            ParticipantCommand::ReadReceipt { .. } => "read_receipt",
            ParticipantCommand::Join { .. } => "join",
            ParticipantCommand::Leave { .. } => "leave",
            ParticipantCommand::SetMute { .. } => "set_mute",
            ParticipantCommand::SetNotificationPref { .. } => "set_notification_pref",
            ParticipantCommand::SetNickname { .. } => "set_nickname",
            ParticipantCommand::SetRole { .. } => "set_role",
            ParticipantCommand::ProfileUpdated { .. } => "profile_updated",
        }
    }

    /// 受影响的会话（ProfileUpdated 可能涉及多个）
    pub fn conversation_ids(&self) -> Vec<u64> {
        match self {
            ParticipantCommand::MessageSent { conversation_id, .. }
            | ParticipantCommand::ReadReceipt { conversation_id, .. }
            | ParticipantCommand::Join { conversation_id, .. }
            | ParticipantCommand::Leave { conversation_id, .. }
            | ParticipantCommand::SetMute { conversation_id, .. }
            | ParticipantCommand::SetNotificationPref { conversation_id, .. }
            | ParticipantCommand::SetNickname { conversation_id, .. }
            | ParticipantCommand::SetRole { conversation_id, .. } => vec![*conversation_id],
            ParticipantCommand::ProfileUpdated { conversation_ids, .. } => conversation_ids.clone(),
        }
    }
}

/// 出站领域事件（成员变化通知，供系统消息组件使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantEvent {
    Joined {
        conversation_id: u64,
        user_id: u64,
        username: String,
        role: RoleAssignment,
    },
    Rejoined {
        conversation_id: u64,
        user_id: u64,
        username: String,
    },
    Left {
        conversation_id: u64,
        user_id: u64,
        username: String,
    },
    RoleChanged {
        conversation_id: u64,
        user_id: u64,
        role: RoleAssignment,
    },
    Muted {
        conversation_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
    },
    Unmuted {
        conversation_id: u64,
        user_id: u64,
    },
}

impl ParticipantEvent {
    /// 系统消息文本（如 "alice was added to the conversation"）
    pub fn system_message(&self) -> Option<String> {
        match self {
            ParticipantEvent::Joined { username, .. } | ParticipantEvent::Rejoined { username, .. } => {
                Some(format!("{} was added to the conversation", username))
            }
            ParticipantEvent::Left { username, .. } => {
                Some(format!("{} was removed from the conversation", username))
            }
            _ => None,
        }
    }
}
