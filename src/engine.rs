//! 按配置组装引擎：仓库、协作方、事件总线、服务与分发器

use std::sync::Arc;

use tracing::info;

use crate::config::{EngineConfig, StorageBackend};
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::infra::{Database, EventBus, InMemoryProfileDirectory, InMemorySequenceSource, ProfileLookup};
use crate::repository::{InMemoryParticipantRepository, ParticipantRepository, PgParticipantRepository};
use crate::service::{ParticipantService, ParticipantServiceConfig};

/// 组装完成的参与者引擎
pub struct ParticipantEngine {
    pub service: Arc<ParticipantService>,
    pub dispatcher: EventDispatcher,
    pub sequences: Arc<InMemorySequenceSource>,
    pub event_bus: Arc<EventBus>,
}

impl ParticipantEngine {
    /// 按配置创建引擎
    ///
    /// 序号来源使用进程内序号表，由分发的 `message_sent` 命令推进。
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let repo: Arc<dyn ParticipantRepository> = match config.storage.backend {
            StorageBackend::Memory => {
                info!("💾 存储后端: memory");
                Arc::new(InMemoryParticipantRepository::new())
            }
            StorageBackend::Postgres => {
                info!("💾 存储后端: postgres");
                let database = Database::new(&config.storage).await?;
                Arc::new(PgParticipantRepository::new(Arc::new(database.into_pool())))
            }
        };
        Ok(Self::with_parts(
            config,
            repo,
            Arc::new(InMemoryProfileDirectory::new()),
        ))
    }

    /// 使用给定仓库和资料服务创建引擎
    pub fn with_parts(
        config: &EngineConfig,
        repo: Arc<dyn ParticipantRepository>,
        profiles: Arc<dyn ProfileLookup>,
    ) -> Self {
        let sequences = Arc::new(InMemorySequenceSource::new());
        let event_bus = Arc::new(EventBus::new(config.event_bus.capacity));
        let service = Arc::new(ParticipantService::new(
            repo,
            sequences.clone(),
            profiles,
            event_bus.clone(),
            ParticipantServiceConfig::from(config),
        ));
        let dispatcher = EventDispatcher::new(service.clone(), sequences.clone());
        Self {
            service,
            dispatcher,
            sequences,
            event_bus,
        }
    }
}
