// Infrastructure layer - 基础设施层
// 负责存储连接、事件总线、按键加锁、指标以及外部协作方接口

pub mod database;
pub mod event_bus;
pub mod key_lock;
pub mod metrics;
pub mod migrate;
pub mod profile;
pub mod sequence;

pub use database::Database;
pub use event_bus::EventBus;
pub use key_lock::{KeyGuard, KeyLocks};
pub use profile::{InMemoryProfileDirectory, ProfileLookup};
pub use sequence::{ConversationSequenceSource, InMemorySequenceSource};
