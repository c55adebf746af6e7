//! 模块发帖策略
//!
//! 由外部的发帖权限组件消费，参与者引擎本身不使用。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePostingPolicy {
    /// 仅本校成员
    UniversityMembers,
    /// 仅已选课的模块成员
    ModuleMembers,
    /// 任意已认证学生
    AnyVerified,
    /// 仅指定用户
    Restricted,
}
