//! Scan flows against the mock platform and a scripted verdict service.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vigil_core::{BYTES_PER_MB, Clock, ManualClock, MemberInfo, VerdictStats};
use vigil_error::ScanErrorKind;
use vigil_interface::{
    AttachmentRef, ChatPlatform, ComponentInteraction, IncomingMessage, InteractionResponse,
    MockChatPlatform, ScriptedVerdictService, VerdictService,
};
use vigil_scan::{MAX_POLL_ATTEMPTS, ScanCore, ScanInteractions, ScanRequest, sha256_hex};
use vigil_storage::{HistoryLog, ScanConfigStore};

const GUILD: u64 = 1;
const CHANNEL: u64 = 20;
const ALERTS: u64 = 30;
const API_KEY: &str = "test-api-key-0123";

struct Harness {
    _dir: TempDir,
    platform: Arc<MockChatPlatform>,
    service: Arc<ScriptedVerdictService>,
    history: Arc<HistoryLog>,
    core: Arc<ScanCore>,
}

async fn harness(service: ScriptedVerdictService) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let platform = Arc::new(MockChatPlatform::new(9));
    let service = Arc::new(service);
    let config = Arc::new(ScanConfigStore::open(dir.path()).await.expect("config"));
    config
        .update(|c| {
            c.api_key = Some(API_KEY.to_string());
            let guild = c.guild_mut(GUILD);
            guild.alert_channel_id = Some(ALERTS);
        })
        .await
        .expect("key");
    let history = Arc::new(HistoryLog::open(dir.path()).await.expect("history"));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let core = Arc::new(ScanCore::new(
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        Arc::clone(&service) as Arc<dyn VerdictService>,
        config,
        Arc::clone(&history),
        clock as Arc<dyn Clock>,
    ));
    Harness {
        _dir: dir,
        platform,
        service,
        history,
        core,
    }
}

fn alice() -> MemberInfo {
    MemberInfo::new(42, "Alice")
}

fn malicious() -> VerdictStats {
    VerdictStats {
        malicious: 3,
        suspicious: 1,
        harmless: 40,
        undetected: 20,
    }
}

fn request(bytes: Vec<u8>) -> ScanRequest {
    ScanRequest::new(GUILD, CHANNEL, alice(), "invoice.pdf.exe", bytes)
}

#[tokio::test(start_paused = true)]
async fn test_malicious_file_is_recorded_and_alerted() {
    let h = harness(ScriptedVerdictService::completing_with(malicious())).await;
    let bytes = b"MZ not really a binary".to_vec();

    let record = h.core.scan(request(bytes.clone())).await.expect("scan");

    assert_eq!(record.sha256, sha256_hex(&bytes));
    assert_eq!(record.verdict_snapshot.stats, malicious());
    assert_eq!(h.history.len().await, 1);
    assert_eq!(h.service.poll_calls(), 2);

    let cards = h.platform.messages_in(CHANNEL);
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].message.embeds[0].color, Some(0xE74C3C));

    let alerts = h.platform.messages_in(ALERTS);
    assert_eq!(alerts.len(), 1);
    let text = alerts[0].message.embeds[0]
        .description
        .clone()
        .unwrap_or_default();
    assert!(text.contains("<@42>"));
    assert!(text.contains("invoice.pdf.exe"));
}

#[tokio::test(start_paused = true)]
async fn test_clean_file_raises_no_alert() {
    let clean = VerdictStats {
        harmless: 50,
        undetected: 10,
        ..VerdictStats::default()
    };
    let h = harness(ScriptedVerdictService::completing_with(clean)).await;
    h.core.scan(request(b"hello".to_vec())).await.expect("scan");
    assert!(h.platform.messages_in(ALERTS).is_empty());
    assert_eq!(
        h.platform.messages_in(CHANNEL)[0].message.embeds[0].color,
        Some(0x2ECC71)
    );
}

#[tokio::test]
async fn test_oversized_file_never_reaches_the_service() {
    let h = harness(ScriptedVerdictService::completing_with(malicious())).await;
    let bytes = vec![0u8; (33 * BYTES_PER_MB) as usize];

    let err = h.core.scan(request(bytes)).await.expect_err("too large");
    assert_eq!(
        err.kind,
        ScanErrorKind::TooLarge {
            size_bytes: 33 * BYTES_PER_MB,
            limit_bytes: 32 * BYTES_PER_MB,
        }
    );
    assert_eq!(h.service.submit_calls(), 0);
    assert!(h.history.is_empty().await);
}

#[tokio::test]
async fn test_gates_fail_in_order() {
    let h = harness(ScriptedVerdictService::new()).await;

    h.core
        .update_guild(GUILD, |g| {
            g.blacklisted_user_ids.insert(42);
            g.require_role = true;
        })
        .await
        .expect("settings");
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("blacklisted");
    assert_eq!(err.kind, ScanErrorKind::Blacklisted);

    h.core
        .update_guild(GUILD, |g| {
            g.blacklisted_user_ids.clear();
        })
        .await
        .expect("settings");
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("no role");
    assert_eq!(err.kind, ScanErrorKind::NoRole);

    h.core
        .update_guild(GUILD, |g| {
            g.require_role = false;
            g.allowed_channels.insert(CHANNEL + 1);
        })
        .await
        .expect("settings");
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("channel");
    assert_eq!(err.kind, ScanErrorKind::ChannelNotAllowed);

    h.core
        .update_guild(GUILD, |g| {
            g.allowed_channels.clear();
            g.enabled = false;
        })
        .await
        .expect("settings");
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("disabled");
    assert_eq!(err.kind, ScanErrorKind::Disabled);
    assert_eq!(h.service.submit_calls(), 0);
}

#[tokio::test]
async fn test_missing_key_is_reported_as_not_configured() {
    let h = harness(ScriptedVerdictService::new()).await;
    h.core.set_api_key(None).await.expect("clear key");
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("no key");
    assert_eq!(err.kind, ScanErrorKind::NotConfigured);
}

#[tokio::test]
async fn test_window_limits_scans_per_user() {
    let h = harness(ScriptedVerdictService::new()).await;
    h.core
        .update_guild(GUILD, |g| {
            g.rate_limit.per_user = 1;
        })
        .await
        .expect("settings");
    h.service.fail_submit(ScanErrorKind::UploadFailed("refused".to_string()));

    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("upload");
    assert!(matches!(err.kind, ScanErrorKind::UploadFailed(_)));
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("limited");
    assert_eq!(
        err.kind,
        ScanErrorKind::RateLimited {
            retry_after_secs: 3600
        }
    );
    assert!(h.history.is_empty().await);
}

#[tokio::test]
async fn test_rejected_key_ends_scan_without_leaking_it() {
    let service = ScriptedVerdictService::new();
    service.fail_submit(ScanErrorKind::InvalidApiKey);
    let h = harness(service).await;

    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("bad key");
    assert_eq!(err.kind, ScanErrorKind::InvalidApiKey);
    assert!(!err.user_message().contains(API_KEY));
    assert_eq!(h.service.keys_seen(), vec![API_KEY.to_string()]);
    for sent in h.platform.all_messages() {
        assert!(!format!("{:?}", sent.message).contains(API_KEY));
    }
}

#[tokio::test(start_paused = true)]
async fn test_analysis_that_never_finishes_times_out() {
    let h = harness(ScriptedVerdictService::new()).await;
    let err = h.core.scan(request(b"x".to_vec())).await.expect_err("timeout");
    assert_eq!(
        err.kind,
        ScanErrorKind::AnalysisTimeout {
            attempts: MAX_POLL_ATTEMPTS
        }
    );
    assert_eq!(h.service.poll_calls(), MAX_POLL_ATTEMPTS as usize);
    assert!(h.history.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_auto_scan_takes_first_attachment_only() {
    let h = harness(ScriptedVerdictService::completing_with(malicious())).await;
    h.core
        .update_guild(GUILD, |g| {
            g.auto_scan_channels.insert(CHANNEL);
        })
        .await
        .expect("settings");
    h.platform.add_download("https://cdn/one", b"one".to_vec());
    h.platform.add_download("https://cdn/two", b"two".to_vec());

    let message = IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id: 5,
        author: alice(),
        content: String::new(),
        attachments: vec![
            AttachmentRef::new("one.zip", "https://cdn/one", 3),
            AttachmentRef::new("two.zip", "https://cdn/two", 3),
        ],
    };
    let record = h
        .core
        .auto_scan(&message)
        .await
        .expect("eligible")
        .expect("scan");
    assert_eq!(record.filename, "one.zip");
    assert_eq!(h.service.submit_calls(), 1);

    let mut elsewhere = message.clone();
    elsewhere.channel_id = CHANNEL + 1;
    assert!(h.core.auto_scan(&elsewhere).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_upload_button_scans_next_upload() {
    let h = harness(ScriptedVerdictService::completing_with(malicious())).await;
    let router = ScanInteractions::new(Arc::clone(&h.core));
    h.platform.add_download("https://cdn/file", b"payload".to_vec());

    let click = ComponentInteraction {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id: 3,
        member: alice(),
        custom_id: "scan:upload".to_string(),
        values: Vec::new(),
    };
    let response = router.handle_component(&click).await.expect("ours");
    assert!(matches!(response, InteractionResponse::Message { ephemeral: true, .. }));

    let upload = IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id: 4,
        author: alice(),
        content: String::new(),
        attachments: vec![AttachmentRef::new("file.bin", "https://cdn/file", 7)],
    };
    assert!(router.handle_message(&upload).await);

    for _ in 0..120 {
        if !h.history.is_empty().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
    let records = h.history.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, "file.bin");
}

#[tokio::test]
async fn test_history_page_is_private_to_the_member() {
    let h = harness(ScriptedVerdictService::new()).await;
    let router = ScanInteractions::new(Arc::clone(&h.core));
    let click = ComponentInteraction {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id: 3,
        member: alice(),
        custom_id: "scan:adminhistory".to_string(),
        values: Vec::new(),
    };
    let response = router.handle_component(&click).await.expect("ours");
    let InteractionResponse::Message { message, ephemeral } = response else {
        panic!("expected refusal");
    };
    assert!(ephemeral);
    assert_eq!(message.embeds[0].title, "❌ Error");
}
