//! 参与者引擎集成测试
//!
//! 全部基于内存仓库和内存序号表，覆盖：
//! 1. 已读游标单调性（乱序、并发）
//! 2. 加入 / 离开 / 重新加入的未读与计数
//! 3. 静音、昵称、通知、角色
//! 4. 端到端未读场景

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use participant_engine::infra::{InMemoryProfileDirectory, ProfileLookup};
use participant_engine::repository::InMemoryParticipantRepository;
use participant_engine::{
    DefaultRole, DisplayProfile, EngineConfig, EngineError, JoinRequest, MuteDuration,
    ParticipantEngine, ParticipantEvent, RoleAssignment,
};

const CONV: u64 = 1001;
const ALICE: u64 = 1;
const BOB: u64 = 2;
const CAROL: u64 = 3;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

fn setup() -> ParticipantEngine {
    setup_with(EngineConfig::default())
}

fn setup_with(config: EngineConfig) -> ParticipantEngine {
    let profiles = InMemoryProfileDirectory::new();
    profiles.insert(ALICE, DisplayProfile::new("alice"));
    profiles.insert(BOB, DisplayProfile::new("bob").with_photo("https://cdn/bob.png"));
    profiles.insert(CAROL, DisplayProfile::new("carol"));
    let profiles: Arc<dyn ProfileLookup> = Arc::new(profiles);
    ParticipantEngine::with_parts(
        &config,
        Arc::new(InMemoryParticipantRepository::new()),
        profiles,
    )
}

async fn join(engine: &ParticipantEngine, user_id: u64, at: DateTime<Utc>) {
    engine
        .service
        .join(JoinRequest::new(CONV, user_id, RoleAssignment::default()).at(at))
        .await
        .unwrap();
}

/// B 发送一条消息：序号表推进 + 作者记录更新
async fn send(engine: &ParticipantEngine, author: u64, seq: u64, at: DateTime<Utc>) {
    engine.sequences.observe(CONV, seq);
    engine
        .service
        .record_message_sent(CONV, author, seq, at)
        .await
        .unwrap();
}

// ============================================================
// 已读游标
// ============================================================

#[tokio::test]
async fn test_read_cursor_is_max_under_reordering() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    let receipts = [7, 3, 12, 1, 12, 9, 4];
    for (i, seq) in receipts.iter().enumerate() {
        engine
            .service
            .record_read(CONV, ALICE, *seq, t0() + Duration::seconds(i as i64))
            .await
            .unwrap();
    }

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 20, t0())
        .await
        .unwrap();
    assert_eq!(view.last_read_message_seq, 12);
    assert_eq!(view.unread_count, 8);
    // 时间戳停在首次推进到 12 的回执
    assert_eq!(view.last_read_timestamp, Some(t0() + Duration::seconds(2)));
}

#[tokio::test]
async fn test_concurrent_reads_end_at_maximum() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    let mut handles = Vec::new();
    for seq in (1..=50u64).rev() {
        let service = engine.service.clone();
        handles.push(tokio::spawn(async move {
            service.record_read(CONV, ALICE, seq, Utc::now()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 50, Utc::now())
        .await
        .unwrap();
    assert_eq!(view.last_read_message_seq, 50);
    assert_eq!(view.unread_count, 0);
}

#[tokio::test]
async fn test_mark_all_read_uses_sequence_source() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    for seq in 1..=4 {
        send(&engine, BOB, seq, t0() + Duration::seconds(seq as i64)).await;
    }

    let cursor = engine
        .service
        .mark_all_read(CONV, ALICE, t0() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(cursor, 4);
}

// ============================================================
// 生命周期
// ============================================================

#[tokio::test]
async fn test_join_has_no_backlog() {
    let engine = setup();
    engine.sequences.observe(CONV, 42);

    let record = engine
        .service
        .join(JoinRequest::new(CONV, ALICE, RoleAssignment::default()).at(t0()))
        .await
        .unwrap();
    assert_eq!(record.last_read_message_seq, 42);
    assert_eq!(record.username, "alice");
    assert!(record.notifications_enabled);

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 42, t0())
        .await
        .unwrap();
    assert_eq!(view.unread_count, 0);
    assert!(view.is_active);
}

#[tokio::test]
async fn test_join_twice_is_rejected() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    let err = engine
        .service
        .join(JoinRequest::new(CONV, ALICE, RoleAssignment::default()))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::already_participant(CONV, ALICE));
}

#[tokio::test]
async fn test_join_with_explicit_profile_skips_lookup() {
    let engine = setup();
    let record = engine
        .service
        .join(
            JoinRequest::new(CONV, 99, DefaultRole::ConversationAdmin.into())
                .with_profile(DisplayProfile::new("zed").with_photo("https://cdn/zed.png")),
        )
        .await
        .unwrap();
    assert_eq!(record.username, "zed");
    assert_eq!(record.profile_photo_url.as_deref(), Some("https://cdn/zed.png"));
    assert_eq!(record.role_name, "conversation_admin");
}

#[tokio::test]
async fn test_leave_zeroes_unread_and_deactivates() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    for seq in 1..=3 {
        send(&engine, BOB, seq, t0()).await;
    }

    engine.service.leave(CONV, ALICE).await.unwrap();
    // 重复离开不是错误
    engine.service.leave(CONV, ALICE).await.unwrap();

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 3, t0())
        .await
        .unwrap();
    assert!(!view.is_active);
    assert_eq!(view.unread_count, 0);
}

#[tokio::test]
async fn test_operations_on_missing_or_inactive_participant() {
    let engine = setup();

    let err = engine.service.leave(CONV, ALICE).await.unwrap_err();
    assert_eq!(err, EngineError::not_participant(CONV, ALICE));

    let err = engine
        .service
        .get_display_record(CONV, ALICE, 0, t0())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotParticipant { .. }));

    join(&engine, ALICE, t0()).await;
    engine.service.leave(CONV, ALICE).await.unwrap();

    let err = engine
        .service
        .record_read(CONV, ALICE, 5, t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::not_participant(CONV, ALICE));

    let err = engine
        .service
        .record_message_sent(CONV, ALICE, 1, t0())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::not_participant(CONV, ALICE));
}

#[tokio::test]
async fn test_rejoin_preserves_history_without_backlog() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    send(&engine, ALICE, 1, t0() + Duration::seconds(1)).await;
    send(&engine, ALICE, 2, t0() + Duration::seconds(2)).await;

    engine.service.leave(CONV, ALICE).await.unwrap();
    for seq in 3..=10 {
        send(&engine, BOB, seq, t0() + Duration::seconds(seq as i64)).await;
    }

    let rejoin_at = t0() + Duration::hours(1);
    let record = engine
        .service
        .join(JoinRequest::new(CONV, ALICE, DefaultRole::ConversationModerator.into()).at(rejoin_at))
        .await
        .unwrap();
    assert!(record.is_active);
    assert_eq!(record.message_count, 2);
    assert_eq!(record.joined_at, t0());
    assert_eq!(record.last_read_message_seq, 10);
    assert_eq!(record.role_name, "conversation_moderator");

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 10, rejoin_at)
        .await
        .unwrap();
    assert_eq!(view.unread_count, 0);
}

#[tokio::test]
async fn test_full_backlog_policy_counts_history() {
    let mut config = EngineConfig::default();
    config.policy.join_backlog = participant_engine::config::JoinBacklogPolicy::Full;
    let engine = setup_with(config);
    engine.sequences.observe(CONV, 6);

    join(&engine, ALICE, t0()).await;
    let view = engine
        .service
        .get_display_record(CONV, ALICE, 6, t0())
        .await
        .unwrap();
    assert_eq!(view.unread_count, 6);
}

// ============================================================
// 静音 / 昵称 / 通知 / 角色
// ============================================================

#[tokio::test]
async fn test_effective_mute_depends_on_query_time() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    let t = Utc::now();
    engine
        .service
        .set_mute(CONV, ALICE, Some(t + Duration::seconds(10)))
        .await
        .unwrap();

    let at_5 = engine
        .service
        .get_display_record(CONV, ALICE, 0, t + Duration::seconds(5))
        .await
        .unwrap();
    assert!(at_5.is_muted);

    let at_20 = engine
        .service
        .get_display_record(CONV, ALICE, 0, t + Duration::seconds(20))
        .await
        .unwrap();
    assert!(!at_20.is_muted);
    assert_eq!(at_20.muted_until, Some(t + Duration::seconds(10)));
}

#[tokio::test]
async fn test_mute_presets_and_default() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    let now = Utc::now();
    let until = engine
        .service
        .mute_for(CONV, ALICE, MuteDuration::OneHour, now)
        .await
        .unwrap();
    assert_eq!(until, now + Duration::hours(1));

    let until = engine
        .service
        .mute_with_default(CONV, ALICE, now)
        .await
        .unwrap();
    assert_eq!(until, now + Duration::hours(24));

    engine.service.set_mute(CONV, ALICE, None).await.unwrap();
    let view = engine
        .service
        .get_display_record(CONV, ALICE, 0, now)
        .await
        .unwrap();
    assert!(!view.is_muted);
    assert_eq!(view.muted_until, None);
}

#[tokio::test]
async fn test_nickname_overrides_display_name() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;

    engine
        .service
        .set_nickname(CONV, ALICE, Some("Bob".to_string()))
        .await
        .unwrap();
    let view = engine
        .service
        .get_display_record(CONV, ALICE, 0, t0())
        .await
        .unwrap();
    assert_eq!(view.display_name, "Bob");

    engine
        .service
        .set_nickname(CONV, ALICE, Some(String::new()))
        .await
        .unwrap();
    let view = engine
        .service
        .get_display_record(CONV, ALICE, 0, t0())
        .await
        .unwrap();
    assert_eq!(view.display_name, "alice");
    assert_eq!(view.nickname, None);
}

#[tokio::test]
async fn test_notification_recipients() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    join(&engine, CAROL, t0()).await;
    join(&engine, 4, t0()).await;
    join(&engine, 5, t0()).await;

    let now = Utc::now();
    engine
        .service
        .set_notification_preference(CONV, BOB, false)
        .await
        .unwrap();
    engine
        .service
        .mute_for(CONV, CAROL, MuteDuration::OneDay, now)
        .await
        .unwrap();
    engine.service.leave(CONV, 4).await.unwrap();

    let recipients = engine
        .service
        .notification_recipients(CONV, Some(5), now)
        .await
        .unwrap();
    assert_eq!(recipients, vec![ALICE]);

    // 静音到期后恢复通知
    let recipients = engine
        .service
        .notification_recipients(CONV, None, now + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(recipients, vec![ALICE, CAROL, 5]);
}

#[tokio::test]
async fn test_set_role_and_list_admins() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0() + Duration::seconds(1)).await;
    join(&engine, CAROL, t0() + Duration::seconds(2)).await;

    engine
        .service
        .set_role(CONV, CAROL, DefaultRole::ConversationAdmin.into())
        .await
        .unwrap();
    engine
        .service
        .set_role(CONV, ALICE, DefaultRole::ConversationModerator.into())
        .await
        .unwrap();

    let admins: Vec<u64> = engine
        .service
        .list_admins(CONV, t0())
        .await
        .unwrap()
        .iter()
        .map(|v| v.user_id)
        .collect();
    assert_eq!(admins, vec![ALICE, CAROL]);
}

#[tokio::test]
async fn test_refresh_profile_freezes_inactive_records() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    engine.service.leave(CONV, ALICE).await.unwrap();

    let updated = engine
        .service
        .refresh_profile(ALICE, &[CONV, 9999], DisplayProfile::new("alice2"))
        .await
        .unwrap();
    assert_eq!(updated, 0);

    let view = engine
        .service
        .get_display_record(CONV, ALICE, 0, t0())
        .await
        .unwrap();
    assert_eq!(view.username, "alice");
    assert_eq!(view.display_name, "alice");

    let updated = engine
        .service
        .refresh_profile(BOB, &[CONV], DisplayProfile::new("bob2"))
        .await
        .unwrap();
    assert_eq!(updated, 1);
    let view = engine
        .service
        .get_display_record(CONV, BOB, 0, t0())
        .await
        .unwrap();
    assert_eq!(view.username, "bob2");
    assert_eq!(view.profile_photo_url, None);

    // 重新加入时通过资料服务刷新
    join(&engine, ALICE, t0() + Duration::minutes(1)).await;
    let view = engine
        .service
        .get_display_record(CONV, ALICE, 0, t0())
        .await
        .unwrap();
    assert_eq!(view.username, "alice");
}

// ============================================================
// 查询
// ============================================================

#[tokio::test]
async fn test_list_participants_order_and_filter() {
    let engine = setup();
    join(&engine, CAROL, t0()).await;
    join(&engine, ALICE, t0() + Duration::seconds(5)).await;
    join(&engine, BOB, t0()).await;
    engine.service.leave(CONV, BOB).await.unwrap();

    let active: Vec<u64> = engine
        .service
        .list_participants(CONV, false)
        .await
        .unwrap()
        .iter()
        .map(|v| v.user_id)
        .collect();
    assert_eq!(active, vec![CAROL, ALICE]);

    let all: Vec<u64> = engine
        .service
        .list_participants(CONV, true)
        .await
        .unwrap()
        .iter()
        .map(|v| v.user_id)
        .collect();
    assert_eq!(all, vec![BOB, CAROL, ALICE]);

    assert_eq!(engine.service.count_active(CONV).await.unwrap(), 2);
}

#[tokio::test]
async fn test_recently_active_and_touch() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    join(&engine, CAROL, t0()).await;
    engine.service.leave(CONV, CAROL).await.unwrap();

    let touched = engine
        .service
        .touch_last_active(CONV, &[BOB, CAROL, 77], t0() + Duration::minutes(3))
        .await
        .unwrap();
    assert_eq!(touched, 1);
    send(&engine, ALICE, 1, t0() + Duration::minutes(1)).await;

    let recent = engine
        .service
        .list_recently_active(CONV, 10, t0())
        .await
        .unwrap();
    let order: Vec<u64> = recent.iter().map(|v| v.user_id).collect();
    assert_eq!(order, vec![BOB, ALICE]);
    assert_eq!(recent[0].last_active_at, t0() + Duration::minutes(3));

    // 更早的时间不会让活跃时间回退
    engine
        .service
        .touch_last_active(CONV, &[BOB], t0())
        .await
        .unwrap();
    let limited = engine
        .service
        .list_recently_active(CONV, 1, t0())
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].last_active_at, t0() + Duration::minutes(3));
}

#[tokio::test]
async fn test_deactivate_conversation() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;
    engine.service.leave(CONV, BOB).await.unwrap();

    let count = engine.service.deactivate_conversation(CONV).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(engine.service.count_active(CONV).await.unwrap(), 0);
    assert!(engine
        .service
        .list_participants(CONV, false)
        .await
        .unwrap()
        .is_empty());
}

// ============================================================
// 事件
// ============================================================

#[tokio::test]
async fn test_membership_events_are_published() {
    let engine = setup();
    let mut rx = engine.event_bus.subscribe();

    join(&engine, ALICE, t0()).await;
    engine.service.leave(CONV, ALICE).await.unwrap();
    join(&engine, ALICE, t0() + Duration::minutes(1)).await;

    match rx.recv().await.unwrap() {
        ParticipantEvent::Joined {
            conversation_id,
            user_id,
            ref username,
            ..
        } => {
            assert_eq!((conversation_id, user_id), (CONV, ALICE));
            assert_eq!(username, "alice");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let left = rx.recv().await.unwrap();
    assert_eq!(
        left.system_message().as_deref(),
        Some("alice was removed from the conversation")
    );

    let rejoined = rx.recv().await.unwrap();
    assert!(matches!(rejoined, ParticipantEvent::Rejoined { .. }));
    assert_eq!(
        rejoined.system_message().as_deref(),
        Some("alice was added to the conversation")
    );
}

// ============================================================
// 端到端
// ============================================================

#[tokio::test]
async fn test_end_to_end_unread_flow() {
    let engine = setup();
    join(&engine, ALICE, t0()).await;
    join(&engine, BOB, t0()).await;

    for seq in 1..=5 {
        send(&engine, BOB, seq, t0() + Duration::seconds(seq as i64)).await;
    }
    let max = engine.sequences.current(CONV);
    assert_eq!(max, 5);

    let unread = |engine: &ParticipantEngine| {
        let service = engine.service.clone();
        async move {
            service
                .get_display_record(CONV, ALICE, max, t0())
                .await
                .unwrap()
                .unread_count
        }
    };

    assert_eq!(unread(&engine).await, 5);

    engine
        .service
        .record_read(CONV, ALICE, 3, t0() + Duration::seconds(10))
        .await
        .unwrap();
    assert_eq!(unread(&engine).await, 2);

    engine
        .service
        .record_read(CONV, ALICE, 1, t0() + Duration::seconds(11))
        .await
        .unwrap();
    assert_eq!(unread(&engine).await, 2);

    let bob = engine
        .service
        .get_display_record(CONV, BOB, max, t0())
        .await
        .unwrap();
    assert_eq!(bob.message_count, 5);
    assert_eq!(bob.unread_count, 0);
    assert_eq!(bob.profile_photo_url.as_deref(), Some("https://cdn/bob.png"));
}
