use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::events::ParticipantEvent;

/// In-process Event Bus（进程内事件总线）
///
/// 发布成员变化事件；没有订阅者时事件直接丢弃，不影响引擎操作。
pub struct EventBus {
    sender: broadcast::Sender<ParticipantEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: ParticipantEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("事件总线无订阅者，丢弃事件: {:?}", event);
                0
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<ParticipantEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        let n = bus.publish(ParticipantEvent::Unmuted {
            conversation_id: 1,
            user_id: 2,
        });
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(ParticipantEvent::Unmuted {
            conversation_id: 1,
            user_id: 2,
        });
        let ev = rx.recv().await.unwrap();
        assert_eq!(
            ev,
            ParticipantEvent::Unmuted {
                conversation_id: 1,
                user_id: 2
            }
        );
    }
}
