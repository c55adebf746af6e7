pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infra;
pub mod logging;
pub mod model;
pub mod repository;
pub mod service;

pub use config::EngineConfig;
pub use dispatcher::{DispatchReport, EventDispatcher};
pub use domain::{ParticipantCommand, ParticipantEvent};
pub use engine::ParticipantEngine;
pub use error::{EngineError, Result};
pub use model::*;
pub use service::{JoinRequest, ParticipantService, ParticipantServiceConfig};
