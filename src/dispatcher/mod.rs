//! 入站命令分发器
//!
//! 把消息入库、已读回执、成员管理等入站命令路由到 [`ParticipantService`]。
//! 投递语义按至少一次处理：除 `message_sent` 的发言计数外，所有处理都是幂等的。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::events::ParticipantCommand;
use crate::error::{EngineError, Result};
use crate::infra::{metrics, ConversationSequenceSource};
use crate::model::{DisplayProfile, RoleAssignment};
use crate::service::{JoinRequest, ParticipantService};

/// 批量分发结果
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// 成功处理的命令数
    pub applied: usize,
    /// 失败的命令（序号, 错误）
    pub failed: Vec<(usize, EngineError)>,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.applied + self.failed.len()
    }
}

/// 命令分发器
pub struct EventDispatcher {
    service: Arc<ParticipantService>,
    sequences: Arc<dyn ConversationSequenceSource>,
}

impl EventDispatcher {
    pub fn new(
        service: Arc<ParticipantService>,
        sequences: Arc<dyn ConversationSequenceSource>,
    ) -> Self {
        Self { service, sequences }
    }

    pub fn service(&self) -> &Arc<ParticipantService> {
        &self.service
    }

    /// 分发单条命令
    pub async fn dispatch(&self, command: ParticipantCommand) -> Result<()> {
        let route = command.route();
        metrics::record_dispatch(route);
        debug!("分发命令: {}", route);

        match command {
            ParticipantCommand::MessageSent {
                conversation_id,
                author_id,
                sequence,
                timestamp,
            } => {
                self.sequences.advance(conversation_id, sequence).await?;
                self.service
                    .record_message_sent(conversation_id, author_id, sequence, timestamp)
                    .await
            }
            ParticipantCommand::ReadReceipt {
                conversation_id,
                user_id,
                up_to_sequence,
                timestamp,
            } => {
                self.service
                    .record_read(conversation_id, user_id, up_to_sequence, timestamp)
                    .await
            }
            ParticipantCommand::Join {
                conversation_id,
                user_id,
                role_id,
                role_name,
                timestamp,
            } => {
                let request = JoinRequest::new(
                    conversation_id,
                    user_id,
                    RoleAssignment::new(role_id, role_name),
                )
                .at(timestamp);
                self.service.join(request).await.map(|_| ())
            }
            ParticipantCommand::Leave {
                conversation_id,
                user_id,
            } => self.service.leave(conversation_id, user_id).await,
            ParticipantCommand::SetMute {
                conversation_id,
                user_id,
                until,
                duration,
                timestamp,
            } => match (until, duration) {
                (Some(until), _) => {
                    self.service
                        .set_mute(conversation_id, user_id, Some(until))
                        .await
                }
                (None, Some(duration)) => self
                    .service
                    .mute_for(conversation_id, user_id, duration, timestamp)
                    .await
                    .map(|_| ()),
                (None, None) => self.service.set_mute(conversation_id, user_id, None).await,
            },
            ParticipantCommand::SetNotificationPref {
                conversation_id,
                user_id,
                enabled,
            } => {
                self.service
                    .set_notification_preference(conversation_id, user_id, enabled)
                    .await
            }
            ParticipantCommand::SetNickname {
                conversation_id,
                user_id,
                nickname,
            } => {
                self.service
                    .set_nickname(conversation_id, user_id, nickname)
                    .await
            }
            ParticipantCommand::SetRole {
                conversation_id,
                user_id,
                role_id,
                role_name,
            } => {
                self.service
                    .set_role(conversation_id, user_id, RoleAssignment::new(role_id, role_name))
                    .await
            }
            ParticipantCommand::ProfileUpdated {
                user_id,
                conversation_ids,
                username,
                profile_photo_url,
            } => {
                let profile = DisplayProfile {
                    username,
                    profile_photo_url,
                };
                self.service
                    .refresh_profile(user_id, &conversation_ids, profile)
                    .await
                    .map(|_| ())
            }
        }
    }

    /// 顺序分发一批命令；单条失败不会中断后续命令
    pub async fn dispatch_all<I>(&self, commands: I) -> DispatchReport
    where
        I: IntoIterator<Item = ParticipantCommand>,
    {
        let mut report = DispatchReport::default();
        for (index, command) in commands.into_iter().enumerate() {
            match self.dispatch(command).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("命令 #{} 处理失败: {}", index, e);
                    report.failed.push((index, e));
                }
            }
        }
        report
    }
}
