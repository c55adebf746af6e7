// 业务服务层模块
pub mod participant_service;

pub use participant_service::{JoinRequest, ParticipantService, ParticipantServiceConfig};
