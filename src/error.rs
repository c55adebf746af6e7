use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 参与者引擎错误类型
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineError {
    /// 目标 (会话, 用户) 没有参与者记录，或记录已失效而操作要求有效成员
    #[error("Not a participant: conversation={conversation_id}, user={user_id}")]
    NotParticipant { conversation_id: u64, user_id: u64 },
    /// 加入时已存在有效成员记录
    #[error("Already a participant: conversation={conversation_id}, user={user_id}")]
    AlreadyParticipant { conversation_id: u64, user_id: u64 },
    /// 外部存储不可用（超时或驱动错误），原样向上传递，不重试
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(String),
    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub fn not_participant(conversation_id: u64, user_id: u64) -> Self {
        EngineError::NotParticipant { conversation_id, user_id }
    }

    pub fn already_participant(conversation_id: u64, user_id: u64) -> Self {
        EngineError::AlreadyParticipant { conversation_id, user_id }
    }

    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotParticipant { .. } => "not_participant",
            EngineError::AlreadyParticipant { .. } => "already_participant",
            EngineError::StorageUnavailable(_) => "storage_unavailable",
            EngineError::Validation(_) => "validation",
            EngineError::Configuration(_) => "configuration",
            EngineError::Serialization(_) => "serialization",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::StorageUnavailable(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for EngineError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        EngineError::StorageUnavailable(format!("storage call timed out: {}", err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, EngineError>;

/// 错误代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 成功
    Success = 0,
    /// 不在会话中
    NotParticipant = 1007,
    /// 重复加入
    AlreadyParticipant = 4002,
    /// 验证错误
    Validation = 1003,
    /// 序列化错误
    Serialization = 2002,
    /// 配置错误
    Configuration = 2003,
    /// 存储不可用
    StorageUnavailable = 5000,
}

impl From<&EngineError> for ErrorCode {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::NotParticipant { .. } => ErrorCode::NotParticipant,
            EngineError::AlreadyParticipant { .. } => ErrorCode::AlreadyParticipant,
            EngineError::StorageUnavailable(_) => ErrorCode::StorageUnavailable,
            EngineError::Validation(_) => ErrorCode::Validation,
            EngineError::Configuration(_) => ErrorCode::Configuration,
            EngineError::Serialization(_) => ErrorCode::Serialization,
        }
    }
}
