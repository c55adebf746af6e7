//! 数据模型模块

pub mod mute;
pub mod participant;
pub mod posting_policy;
pub mod role;

pub use mute::{effective_mute, MuteDuration};
pub use participant::{DisplayProfile, ParticipantKey, ParticipantRecord, ParticipantView};
pub use posting_policy::ModulePostingPolicy;
pub use role::{DefaultRole, RoleAssignment};
