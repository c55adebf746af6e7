//! 会话角色模型

use serde::{Deserialize, Serialize};

/// 参与者在会话内的角色分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// 角色ID
    pub role_id: u64,
    /// 角色名称（如 conversation_admin）
    pub role_name: String,
}

impl RoleAssignment {
    pub fn new(role_id: u64, role_name: impl Into<String>) -> Self {
        Self {
            role_id,
            role_name: role_name.into(),
        }
    }

    /// 是否为管理类角色（管理员或版主）
    pub fn is_admin(&self) -> bool {
        DefaultRole::from_name(&self.role_name)
            .map(|role| role.is_admin())
            .unwrap_or(false)
    }
}

impl Default for RoleAssignment {
    fn default() -> Self {
        DefaultRole::ConversationMember.assignment()
    }
}

impl From<DefaultRole> for RoleAssignment {
    fn from(role: DefaultRole) -> Self {
        role.assignment()
    }
}

/// 系统内置会话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRole {
    /// 会话管理员
    ConversationAdmin,
    /// 会话版主
    ConversationModerator,
    /// 普通成员
    #[default]
    ConversationMember,
}

impl DefaultRole {
    pub fn role_id(self) -> u64 {
        match self {
            DefaultRole::ConversationAdmin => 1,
            DefaultRole::ConversationModerator => 2,
            DefaultRole::ConversationMember => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DefaultRole::ConversationAdmin => "conversation_admin",
            DefaultRole::ConversationModerator => "conversation_moderator",
            DefaultRole::ConversationMember => "conversation_member",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            DefaultRole::ConversationAdmin => "Conversation Admin",
            DefaultRole::ConversationModerator => "Conversation Moderator",
            DefaultRole::ConversationMember => "Conversation Member",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(
            self,
            DefaultRole::ConversationAdmin | DefaultRole::ConversationModerator
        )
    }

    /// 按名称解析（大小写不敏感）
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "conversation_admin" => Some(DefaultRole::ConversationAdmin),
            "conversation_moderator" => Some(DefaultRole::ConversationModerator),
            "conversation_member" => Some(DefaultRole::ConversationMember),
            _ => None,
        }
    }

    pub fn assignment(self) -> RoleAssignment {
        RoleAssignment::new(self.role_id(), self.name())
    }
}
