//! 静音时长预设

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 静音时长
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuteDuration {
    OneHour,
    EightHours,
    OneDay,
    OneWeek,
    /// 永久（按 100 年计算）
    Permanent,
}

impl MuteDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            MuteDuration::OneHour => Duration::hours(1),
            MuteDuration::EightHours => Duration::hours(8),
            MuteDuration::OneDay => Duration::days(1),
            MuteDuration::OneWeek => Duration::days(7),
            MuteDuration::Permanent => Duration::days(365 * 100),
        }
    }

    /// 以 now 为起点计算到期时间
    pub fn until(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.as_duration()
    }
}

/// 有效静音状态：只看到期时间，不信任缓存的 is_muted
pub fn effective_mute(muted_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    muted_until.map_or(false, |until| until > now)
}
