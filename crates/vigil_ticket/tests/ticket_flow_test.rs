//! End-to-end ticket flows against the mock platform.

use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use vigil_core::{Clock, Closer, ManualClock, MemberInfo};
use vigil_error::TicketErrorKind;
use vigil_interface::{
    ChannelPermissions, ChatPlatform, ComponentInteraction, HistoryMessage, IncomingMessage,
    InteractionResponse, MockChatPlatform, ModalSubmission, OverwriteTarget,
};
use vigil_storage::ConfigStore;
use vigil_ticket::{
    ANONYMOUS_CHANNEL_LABEL, CloseActor, CreateTicketRequest, INACTIVITY_REASON, Reaper,
    TicketCore, TicketInteractions,
};

const GUILD: u64 = 1;
const BOT: u64 = 9;
const SUPPORT_ROLE: u64 = 700;
const TRANSCRIPTS: u64 = 800;

struct Harness {
    _dir: TempDir,
    platform: Arc<MockChatPlatform>,
    clock: Arc<ManualClock>,
    core: Arc<TicketCore>,
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let platform = Arc::new(MockChatPlatform::new(BOT));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let store = Arc::new(ConfigStore::new(dir.path()));
    let core = Arc::new(TicketCore::new(
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        store,
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));
    core.update_settings(GUILD, |config| {
        config.support_role_ids.insert(SUPPORT_ROLE);
        config.transcript_channel_id = Some(TRANSCRIPTS);
        config.close_confirmation = false;
        Ok(())
    })
    .await
    .expect("settings");
    Harness {
        _dir: dir,
        platform,
        clock,
        core,
    }
}

fn alice() -> MemberInfo {
    MemberInfo::new(42, "Alice")
}

fn staff() -> MemberInfo {
    MemberInfo::new(77, "Sam").with_role_ids([SUPPORT_ROLE].into_iter().collect())
}

fn request(member: MemberInfo) -> CreateTicketRequest {
    CreateTicketRequest::new(GUILD, member, "General Support", "Cannot log in", "Reset loops")
}

fn said(id: u64, author: &MemberInfo, content: &str, minute: u32) -> HistoryMessage {
    HistoryMessage {
        id,
        author_id: *author.user_id(),
        author_name: author.display_name().clone(),
        author_avatar: None,
        is_bot: false,
        content: content.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap(),
        attachments: Vec::new(),
        embeds: Vec::new(),
    }
}

fn click(member: &MemberInfo, custom_id: &str, values: Vec<String>) -> ComponentInteraction {
    ComponentInteraction {
        guild_id: Some(GUILD),
        channel_id: 5,
        message_id: 6,
        member: member.clone(),
        custom_id: custom_id.to_string(),
        values,
    }
}

#[tokio::test]
async fn test_anonymous_ticket_hides_creator() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.allow_anonymous = true;
            Ok(())
        })
        .await
        .expect("settings");

    let mut req = request(alice());
    req.anonymous = true;
    let ticket = h.core.create_ticket(req).await.expect("create");

    assert_eq!(ticket.number, 1);
    assert_eq!(ticket.channel_name, "ticket-1");
    assert!(ticket.is_anonymous);

    let created = h.platform.created_channels();
    assert_eq!(created.len(), 1);
    let request = &created[0].request;
    assert!(request.overwrites.iter().any(|o| {
        o.target == OverwriteTarget::Everyone && o.deny.read
    }));
    assert!(request.overwrites.iter().any(|o| {
        o.target == OverwriteTarget::Role(SUPPORT_ROLE) && o.allow == ChannelPermissions::READ_WRITE
    }));
    assert!(!request.grants_read_to_member(42));

    let welcome = &h.platform.messages_in(ticket.channel_id)[0].message;
    assert_eq!(welcome.content.as_deref(), Some("Support Team"));
    assert!(h.platform.pinned().contains(&(ticket.channel_id, h.platform.messages_in(ticket.channel_id)[0].message_id)));

    let config = h.core.config(GUILD).await.expect("config");
    assert_eq!(config.ticket_counter, 1);
    assert_eq!(config.stats.total_created, 1);
    assert_eq!(config.active_tickets[&ticket.id].creator_id, 42);
}

#[tokio::test]
async fn test_anonymous_channel_name_omits_creator() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.allow_anonymous = true;
            config.naming_format = "{user}-{number}".to_string();
            config.ticket_cooldown_secs = 0;
            Ok(())
        })
        .await
        .expect("settings");

    let mut req = request(alice());
    req.anonymous = true;
    let hidden = h.core.create_ticket(req).await.expect("anonymous");
    assert_eq!(hidden.channel_name, format!("{}-1", ANONYMOUS_CHANNEL_LABEL));
    assert!(!hidden.channel_name.contains("alice"));
    assert_eq!(h.platform.created_channels()[0].request.name, hidden.channel_name);

    let named = h.core.create_ticket(request(alice())).await.expect("named");
    assert_eq!(named.channel_name, "alice-2");
}

#[tokio::test]
async fn test_open_ticket_limit_is_enforced() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.ticket_cooldown_secs = 0;
            config.max_open_tickets_per_user = 2;
            Ok(())
        })
        .await
        .expect("settings");

    h.core.create_ticket(request(alice())).await.expect("first");
    h.core.create_ticket(request(alice())).await.expect("second");
    let err = h.core.create_ticket(request(alice())).await.expect_err("third");
    assert_eq!(err.kind, TicketErrorKind::MaxOpenReached { limit: 2 });
    assert_eq!(h.platform.created_channels().len(), 2);

    // Someone else is not affected by Alice's tickets.
    let carol = h
        .core
        .create_ticket(request(MemberInfo::new(50, "Carol")))
        .await
        .expect("carol");
    assert_eq!(carol.number, 3);
}

#[tokio::test]
async fn test_category_role_requirement() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.ticket_cooldown_secs = 0;
            for category in &mut config.categories {
                category.required_roles.insert(555);
            }
            Ok(())
        })
        .await
        .expect("settings");

    let err = h.core.create_ticket(request(alice())).await.expect_err("no role");
    assert_eq!(
        err.kind,
        TicketErrorKind::MissingRole {
            category: "General Support".to_string()
        }
    );
    assert!(h.platform.created_channels().is_empty());
    assert_eq!(h.core.config(GUILD).await.expect("config").ticket_counter, 0);

    let member = alice().with_role_ids([555].into_iter().collect());
    let ticket = h.core.create_ticket(request(member)).await.expect("with role");
    assert_eq!(ticket.number, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_get_distinct_numbers() {
    let h = harness().await;
    let tasks: Vec<_> = (0..8u64)
        .map(|i| {
            let core = Arc::clone(&h.core);
            tokio::spawn(async move {
                core.create_ticket(request(MemberInfo::new(100 + i, format!("user{}", i))))
                    .await
            })
        })
        .collect();

    let mut numbers = Vec::new();
    for task in tasks {
        numbers.push(task.await.expect("join").expect("create").number);
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());

    let config = h.core.config(GUILD).await.expect("config");
    assert_eq!(config.ticket_counter, 8);
    assert_eq!(config.active_tickets.len(), 8);
    assert_eq!(config.stats.total_created, 8);
}

#[tokio::test]
async fn test_activity_after_close_does_not_revive_ticket() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    h.core
        .close_ticket(
            GUILD,
            &ticket.id,
            CloseActor::Member(staff()),
            Some("Solved".to_string()),
        )
        .await
        .expect("close");

    h.clock.advance(Duration::minutes(5));
    let late = IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: ticket.channel_id,
        message_id: 901,
        author: alice(),
        content: "one more thing".to_string(),
        attachments: Vec::new(),
    };
    let recorded = h.core.record_activity(&late).await.expect("activity");
    assert!(!recorded);

    let config = h.core.config(GUILD).await.expect("config");
    assert!(config.active_tickets.is_empty());
    assert!(config.closed_tickets.contains_key(&ticket.id));

    let again = h
        .core
        .close_ticket(GUILD, &ticket.id, CloseActor::Member(staff()), None)
        .await
        .expect_err("already closed");
    assert!(matches!(again.kind, TicketErrorKind::NoSuchTicket(_)));
}

#[tokio::test]
async fn test_cooldown_refuses_second_ticket() {
    let h = harness().await;
    h.core.create_ticket(request(alice())).await.expect("first");

    h.clock.advance(Duration::seconds(60));
    let err = h
        .core
        .create_ticket(request(alice()))
        .await
        .expect_err("cooldown");
    assert_eq!(
        err.kind,
        TicketErrorKind::RateLimited {
            retry_after_secs: 240
        }
    );
    assert_eq!(h.platform.created_channels().len(), 1);
    assert_eq!(h.core.config(GUILD).await.expect("config").ticket_counter, 1);

    h.clock.advance(Duration::seconds(240));
    let second = h.core.create_ticket(request(alice())).await.expect("second");
    assert_eq!(second.number, 2);
}

#[tokio::test]
async fn test_blacklisted_member_is_refused_before_anything_else() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.blacklisted_user_ids.insert(42);
            Ok(())
        })
        .await
        .expect("settings");

    let err = h.core.create_ticket(request(alice())).await.expect_err("blacklisted");
    assert_eq!(err.kind, TicketErrorKind::Blacklisted);
    assert!(h.platform.created_channels().is_empty());
}

#[tokio::test]
async fn test_failed_channel_creation_leaves_counter_alone() {
    let h = harness().await;
    h.platform.fail_channel_create(true);
    let err = h.core.create_ticket(request(alice())).await.expect_err("refused");
    assert!(matches!(err.kind, TicketErrorKind::CreationFailed(_)));

    let config = h.core.config(GUILD).await.expect("config");
    assert_eq!(config.ticket_counter, 0);
    assert!(config.active_tickets.is_empty());
}

#[tokio::test]
async fn test_close_posts_transcript_and_asks_for_rating() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    h.platform
        .push_history(ticket.channel_id, said(2, &alice(), "second", 5));
    h.platform
        .push_history(ticket.channel_id, said(1, &alice(), "first", 1));

    h.clock.advance(Duration::hours(2));
    let closed = h
        .core
        .close_ticket(
            GUILD,
            &ticket.id,
            CloseActor::Member(staff()),
            Some("fixed".to_string()),
        )
        .await
        .expect("close");

    assert_eq!(closed.close_reason.as_deref(), Some("fixed"));
    assert_eq!(closed.closed_by, Closer::Member(77));
    assert!((closed.resolution_time_hours - 2.0).abs() < 1e-9);
    assert!(closed.transcript_message_id.is_some());
    assert!(h.platform.deleted_channels().contains(&ticket.channel_id));

    let posted = h.platform.messages_in(TRANSCRIPTS);
    assert_eq!(posted.len(), 1);
    let file = &posted[0].message.files[0];
    assert_eq!(file.filename, "transcript-ticket-1.txt");
    let text = String::from_utf8(file.bytes.clone()).expect("utf8");
    let first = text.find("Alice (42): first").expect("first line");
    let second = text.find("Alice (42): second").expect("second line");
    assert!(first < second);

    let dms = h.platform.direct_messages_to(42);
    let rating = dms
        .iter()
        .find(|m| m.custom_ids().iter().any(|id| id.starts_with("ticket:rate:")))
        .expect("rating request");
    assert_eq!(rating.custom_ids().len(), 5);

    let config = h.core.config(GUILD).await.expect("config");
    assert!(config.active_tickets.is_empty());
    assert_eq!(config.stats.total_closed, 1);

    let again = h
        .core
        .close_ticket(GUILD, &ticket.id, CloseActor::Member(staff()), None)
        .await
        .expect_err("already closed");
    assert!(matches!(again.kind, TicketErrorKind::NoSuchTicket(_)));
}

#[tokio::test]
async fn test_member_cannot_close_someone_elses_ticket() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    let bob = MemberInfo::new(43, "Bob");
    let err = h
        .core
        .close_ticket(GUILD, &ticket.id, CloseActor::Member(bob), None)
        .await
        .expect_err("not allowed");
    assert!(matches!(err.kind, TicketErrorKind::PermissionDenied(_)));
    assert!(h.platform.deleted_channels().is_empty());
}

#[tokio::test]
async fn test_reaper_closes_idle_tickets() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.auto_close_hours = 24;
            Ok(())
        })
        .await
        .expect("settings");
    let idle = h.core.create_ticket(request(alice())).await.expect("idle");

    h.clock.advance(Duration::hours(20));
    let busy = h
        .core
        .create_ticket(request(MemberInfo::new(50, "Carol")))
        .await
        .expect("busy");

    h.clock.advance(Duration::hours(5));
    let reaper = Reaper::new(Arc::clone(&h.core));
    let report = reaper.sweep().await;
    assert_eq!(*report.examined(), 2);
    assert_eq!(*report.closed(), 1);
    assert_eq!(*report.failed(), 0);

    let config = h.core.config(GUILD).await.expect("config");
    let closed = &config.closed_tickets[&idle.id];
    assert_eq!(closed.closed_by, Closer::Auto);
    assert_eq!(closed.close_reason.as_deref(), Some(INACTIVITY_REASON));
    assert!(config.active_tickets.contains_key(&busy.id));
}

#[tokio::test]
async fn test_auto_close_refuses_recently_active_ticket() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.auto_close_hours = 24;
            Ok(())
        })
        .await
        .expect("settings");
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");

    h.clock.advance(Duration::hours(2));
    let err = h
        .core
        .close_ticket(GUILD, &ticket.id, CloseActor::Auto, Some(INACTIVITY_REASON.to_string()))
        .await
        .expect_err("not idle");
    assert_eq!(err.kind, TicketErrorKind::NotIdle { hours: 24 });
    assert!(h.platform.messages_in(TRANSCRIPTS).is_empty());
    assert!(h.platform.deleted_channels().is_empty());
    assert!(h.core.config(GUILD).await.expect("config").active_tickets.contains_key(&ticket.id));
}

#[tokio::test]
async fn test_reaper_skips_ticket_that_wakes_up_mid_sweep() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.auto_close_hours = 24;
            Ok(())
        })
        .await
        .expect("settings");
    let first = h.core.create_ticket(request(alice())).await.expect("first");
    let second = h
        .core
        .create_ticket(request(MemberInfo::new(50, "Carol")))
        .await
        .expect("second");
    h.clock.advance(Duration::hours(25));

    // Park the transcript of whichever ticket the sweep closes first.
    let held = h.platform.hold_next_history();
    let reaper = Reaper::new(Arc::clone(&h.core));
    let sweep = tokio::spawn(async move { reaper.sweep().await });
    let closing_channel = held.requested.await.expect("history requested");
    let (closing, woken) = if closing_channel == first.channel_id {
        (&first, &second)
    } else {
        (&second, &first)
    };

    let reply = IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: woken.channel_id,
        message_id: 902,
        author: MemberInfo::new(woken.creator_id, "Creator"),
        content: "still need help".to_string(),
        attachments: Vec::new(),
    };
    assert!(h.core.record_activity(&reply).await.expect("activity"));
    held.release.send(()).expect("release");

    let report = sweep.await.expect("sweep");
    assert_eq!(*report.examined(), 2);
    assert_eq!(*report.closed(), 1);
    assert_eq!(*report.skipped(), 1);
    assert_eq!(*report.failed(), 0);

    let config = h.core.config(GUILD).await.expect("config");
    assert!(config.closed_tickets.contains_key(&closing.id));
    let kept = &config.active_tickets[&woken.id];
    assert_eq!(kept.last_activity, h.clock.now());
    assert!(!h.platform.deleted_channels().contains(&woken.channel_id));
}

#[tokio::test]
async fn test_claims_are_exclusive() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");

    let err = h
        .core
        .claim_ticket(GUILD, &ticket.id, &alice())
        .await
        .expect_err("creator is not staff");
    assert!(matches!(err.kind, TicketErrorKind::PermissionDenied(_)));

    let claimed = h
        .core
        .claim_ticket(GUILD, &ticket.id, &staff())
        .await
        .expect("claim");
    assert_eq!(claimed.claimed_by, Some(77));

    let other = MemberInfo::new(78, "Tess").with_role_ids([SUPPORT_ROLE].into_iter().collect());
    let err = h
        .core
        .claim_ticket(GUILD, &ticket.id, &other)
        .await
        .expect_err("taken");
    assert_eq!(err.kind, TicketErrorKind::AlreadyClaimed { claimed_by: 77 });
}

#[tokio::test]
async fn test_tags_update_topic_and_search() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");

    h.core
        .add_tag(GUILD, &ticket.id, &staff(), "Bug")
        .await
        .expect("tag");
    let topic = h.platform.topic(ticket.channel_id).expect("topic");
    assert!(topic.ends_with("Tags: bug"));

    let err = h
        .core
        .add_tag(GUILD, &ticket.id, &staff(), "nonsense")
        .await
        .expect_err("unknown tag");
    assert_eq!(
        err.kind,
        TicketErrorKind::TagUnavailable("nonsense".to_string())
    );

    let found = h.core.search_by_tag(GUILD, "BUG").await.expect("search");
    assert_eq!(found.active.len(), 1);

    h.core
        .remove_tag(GUILD, &ticket.id, &staff(), "bug")
        .await
        .expect("untag");
    assert!(h.core.search_by_tag(GUILD, "bug").await.expect("search").is_empty());
}

#[tokio::test]
async fn test_rating_is_accepted_once() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    h.core
        .close_ticket(GUILD, &ticket.id, CloseActor::Member(alice()), None)
        .await
        .expect("close");

    let err = h
        .core
        .submit_rating(GUILD, &ticket.id, 42, 6)
        .await
        .expect_err("six stars");
    assert_eq!(err.kind, TicketErrorKind::InvalidRating(6));

    let err = h
        .core
        .submit_rating(GUILD, &ticket.id, 43, 5)
        .await
        .expect_err("not the creator");
    assert!(matches!(err.kind, TicketErrorKind::PermissionDenied(_)));

    let rated = h
        .core
        .submit_rating(GUILD, &ticket.id, 42, 4)
        .await
        .expect("rate");
    assert_eq!(rated.rating, Some(4));

    let err = h
        .core
        .submit_rating(GUILD, &ticket.id, 42, 5)
        .await
        .expect_err("twice");
    assert_eq!(err.kind, TicketErrorKind::AlreadyRated);
    assert_eq!(h.core.stats(GUILD).await.expect("stats").rating_count, 1);
}

#[tokio::test]
async fn test_staff_reply_records_first_response() {
    let h = harness().await;
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    h.clock.advance(Duration::minutes(30));

    let reply = IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: ticket.channel_id,
        message_id: 99,
        author: staff(),
        content: "On it".to_string(),
        attachments: Vec::new(),
    };
    assert!(h.core.record_activity(&reply).await.expect("activity"));

    let config = h.core.config(GUILD).await.expect("config");
    let active = &config.active_tickets[&ticket.id];
    assert_eq!(active.response_time_hours, Some(0.5));
    assert_eq!(active.last_activity, h.clock.now());
    assert_eq!(config.stats.responded_tickets, 1);
}

#[tokio::test]
async fn test_panel_click_through_creates_ticket() {
    let h = harness().await;
    let router = TicketInteractions::new(Arc::clone(&h.core));

    let response = router
        .handle_component(&click(&alice(), "ticket:panel", Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Message { message, ephemeral } = response else {
        panic!("expected picker, got {:?}", response);
    };
    assert!(ephemeral);
    let select_id = message.custom_ids()[0].to_string();
    assert!(select_id.starts_with("ticket:category:"));

    let response = router
        .handle_component(&click(
            &alice(),
            &select_id,
            vec!["General Support".to_string()],
        ))
        .await
        .expect("ours");
    let InteractionResponse::Modal(modal) = response else {
        panic!("expected form, got {:?}", response);
    };

    let mut values = BTreeMap::new();
    values.insert("title".to_string(), "Printer on fire".to_string());
    values.insert("description".to_string(), "Smoke everywhere".to_string());
    let submission = ModalSubmission {
        guild_id: Some(GUILD),
        channel_id: 5,
        member: alice(),
        custom_id: modal.custom_id.clone(),
        values,
    };
    let response = router.handle_modal(&submission).await.expect("ours");
    assert!(matches!(response, InteractionResponse::Message { ephemeral: true, .. }));

    let config = h.core.config(GUILD).await.expect("config");
    let ticket = config.active_tickets.values().next().expect("ticket");
    assert_eq!(ticket.title, "Printer on fire");
    assert_eq!(router.session_count(), 0);
}

#[tokio::test]
async fn test_expired_form_session_is_refused() {
    let h = harness().await;
    let router = TicketInteractions::new(Arc::clone(&h.core));

    let response = router
        .handle_component(&click(&alice(), "ticket:panel", Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Message { message, .. } = response else {
        panic!("expected picker");
    };
    let select_id = message.custom_ids()[0].to_string();

    h.clock.advance(Duration::minutes(6));
    let response = router
        .handle_component(&click(
            &alice(),
            &select_id,
            vec!["General Support".to_string()],
        ))
        .await
        .expect("ours");
    assert!(matches!(response, InteractionResponse::Update(_)));
    assert!(h.platform.created_channels().is_empty());
}

#[tokio::test]
async fn test_unanswered_close_confirmation_expires() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.close_confirmation = true;
            Ok(())
        })
        .await
        .expect("settings");
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    let router = TicketInteractions::new(Arc::clone(&h.core))
        .with_confirm_timeout(std::time::Duration::from_millis(50));

    let response = router
        .handle_component(&click(&alice(), &format!("ticket:close:{}", ticket.id), Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Message { message, .. } = response else {
        panic!("expected confirmation");
    };
    let confirm = message
        .custom_ids()
        .into_iter()
        .find(|id| id.starts_with("ticket:close-confirm:"))
        .expect("confirm button")
        .to_string();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let response = router
        .handle_component(&click(&alice(), &confirm, Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Update(update) = response else {
        panic!("expected expiry notice");
    };
    assert_eq!(
        update.embeds[0].description.as_deref(),
        Some("This interaction has expired")
    );
    let config = h.core.config(GUILD).await.expect("config");
    assert!(config.active_tickets.contains_key(&ticket.id));
}

#[tokio::test]
async fn test_reason_modal_stands_in_for_confirmation() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.close_confirmation = true;
            config.require_reason_to_close = true;
            Ok(())
        })
        .await
        .expect("settings");
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    let router = TicketInteractions::new(Arc::clone(&h.core));

    let response = router
        .handle_component(&click(&staff(), &format!("ticket:close:{}", ticket.id), Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Modal(modal) = response else {
        panic!("expected reason modal, got {:?}", response);
    };
    assert!(h.core.config(GUILD).await.expect("config").active_tickets.contains_key(&ticket.id));

    let mut values = BTreeMap::new();
    values.insert("reason".to_string(), "Duplicate".to_string());
    let submission = ModalSubmission {
        guild_id: Some(GUILD),
        channel_id: ticket.channel_id,
        member: staff(),
        custom_id: modal.custom_id.clone(),
        values,
    };
    let response = router.handle_modal(&submission).await.expect("ours");
    assert!(matches!(response, InteractionResponse::Message { ephemeral: true, .. }));

    let config = h.core.config(GUILD).await.expect("config");
    assert_eq!(
        config.closed_tickets[&ticket.id].close_reason.as_deref(),
        Some("Duplicate")
    );
}

#[tokio::test]
async fn test_confirmed_close_runs_in_background() {
    let h = harness().await;
    h.core
        .update_settings(GUILD, |config| {
            config.close_confirmation = true;
            Ok(())
        })
        .await
        .expect("settings");
    let ticket = h.core.create_ticket(request(alice())).await.expect("create");
    let router = TicketInteractions::new(Arc::clone(&h.core));

    let response = router
        .handle_component(&click(&alice(), &format!("ticket:close:{}", ticket.id), Vec::new()))
        .await
        .expect("ours");
    let InteractionResponse::Message { message, .. } = response else {
        panic!("expected confirmation");
    };
    let confirm = message.custom_ids()[0].to_string();
    router
        .handle_component(&click(&alice(), &confirm, Vec::new()))
        .await
        .expect("ours");

    for _ in 0..100 {
        if h.platform.deleted_channels().contains(&ticket.channel_id) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let config = h.core.config(GUILD).await.expect("config");
    assert!(config.closed_tickets.contains_key(&ticket.id));
}

#[tokio::test]
async fn test_foreign_widgets_are_ignored() {
    let h = harness().await;
    let router = TicketInteractions::new(Arc::clone(&h.core));
    assert!(
        router
            .handle_component(&click(&alice(), "scan:upload", Vec::new()))
            .await
            .is_none()
    );
}
