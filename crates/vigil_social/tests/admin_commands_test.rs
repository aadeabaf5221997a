//! Administrator commands against real cores over the mock platform.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vigil_core::{Clock, ManualClock, MemberInfo};
use vigil_interface::{
    ChatPlatform, ERROR_COLOR, IncomingMessage, MockChatPlatform, OutgoingMessage, SUCCESS_COLOR,
    ScriptedVerdictService, VerdictService,
};
use vigil_scan::ScanCore;
use vigil_social::{AdminCommands, CommandReply, DEFAULT_PREFIX};
use vigil_storage::{ConfigStore, HistoryLog, ScanConfigStore};
use vigil_ticket::TicketCore;

const GUILD: u64 = 1;
const CHANNEL: u64 = 20;
const ADMIN_ROLE: u64 = 600;

struct Harness {
    dir: TempDir,
    platform: Arc<MockChatPlatform>,
    tickets: Arc<TicketCore>,
    scans: Arc<ScanCore>,
    commands: AdminCommands,
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

async fn ticket_core(dir: &TempDir, platform: &Arc<MockChatPlatform>) -> Arc<TicketCore> {
    Arc::new(TicketCore::new(
        Arc::clone(platform) as Arc<dyn ChatPlatform>,
        Arc::new(ConfigStore::new(dir.path())),
        clock(),
    ))
}

async fn harness() -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let platform = Arc::new(MockChatPlatform::new(9));
    let tickets = ticket_core(&dir, &platform).await;
    let scans = Arc::new(ScanCore::new(
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        Arc::new(ScriptedVerdictService::new()) as Arc<dyn VerdictService>,
        Arc::new(ScanConfigStore::open(dir.path()).await.expect("scan config")),
        Arc::new(HistoryLog::open(dir.path()).await.expect("history")),
        clock(),
    ));
    let commands = AdminCommands::new(DEFAULT_PREFIX)
        .with_tickets(Arc::clone(&tickets))
        .with_scans(Arc::clone(&scans));
    Harness {
        dir,
        platform,
        tickets,
        scans,
        commands,
    }
}

fn admin() -> MemberInfo {
    MemberInfo::new(1000, "Owner").with_is_administrator(true)
}

fn role_admin() -> MemberInfo {
    MemberInfo::new(1001, "Mod").with_role_ids([ADMIN_ROLE].into_iter().collect())
}

fn member() -> MemberInfo {
    MemberInfo::new(42, "Alice")
}

fn said(author: MemberInfo, content: &str) -> IncomingMessage {
    IncomingMessage {
        guild_id: Some(GUILD),
        channel_id: CHANNEL,
        message_id: 555,
        author,
        content: content.to_string(),
        attachments: Vec::new(),
    }
}

async fn run(h: &Harness, author: MemberInfo, content: &str) -> CommandReply {
    h.commands
        .handle_message(&said(author, content))
        .await
        .expect("recognised as a command")
}

fn color(message: &OutgoingMessage) -> Option<u32> {
    message.embeds.first().and_then(|e| e.color)
}

fn text(message: &OutgoingMessage) -> String {
    message
        .embeds
        .iter()
        .map(|e| {
            let fields: Vec<String> = e.fields.iter().map(|f| format!("{} {}", f.name, f.value)).collect();
            format!(
                "{} {} {}",
                e.title,
                e.description.clone().unwrap_or_default(),
                fields.join(" ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_plain_chat_is_not_a_command() {
    let h = harness().await;
    assert!(h.commands.handle_message(&said(member(), "hello there")).await.is_none());
    assert!(h.commands.handle_message(&said(member(), "!unknown thing")).await.is_none());
    let mut bot = said(admin(), "!ticket stats");
    bot.author = bot.author.with_is_bot(true);
    assert!(h.commands.handle_message(&bot).await.is_none());
}

#[tokio::test]
async fn test_members_without_admin_rights_are_refused() {
    let h = harness().await;
    let reply = run(&h, member(), "!ticket settings cooldown 10").await;
    assert_eq!(color(&reply.message), Some(ERROR_COLOR));
    assert!(text(&reply.message).contains("administrator permission"));
    let config = h.tickets.config(GUILD).await.expect("config");
    assert_ne!(config.ticket_cooldown_secs, 10);

    let reply = run(&h, member(), "!scan ratelimit 1 5").await;
    assert_eq!(color(&reply.message), Some(ERROR_COLOR));
}

#[tokio::test]
async fn test_admin_role_grants_ticket_commands() {
    let h = harness().await;
    run(&h, admin(), &format!("!ticket roles admin=<@&{}>", ADMIN_ROLE)).await;
    let reply = run(&h, role_admin(), "!ticket settings max_open 2").await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));
    let config = h.tickets.config(GUILD).await.expect("config");
    assert_eq!(config.max_open_tickets_per_user, 2);
}

#[tokio::test]
async fn test_setting_survives_a_restart() {
    let h = harness().await;
    let reply = run(&h, admin(), "!ticket settings cooldown 60").await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));

    let reopened = ticket_core(&h.dir, &h.platform).await;
    let config = reopened.config(GUILD).await.expect("config");
    assert_eq!(config.ticket_cooldown_secs, 60);
}

#[tokio::test]
async fn test_bad_setting_values_are_explained() {
    let h = harness().await;
    let reply = run(&h, admin(), "!ticket settings max_open 0").await;
    assert!(text(&reply.message).contains("must be at least 1"));
    let reply = run(&h, admin(), "!ticket settings volume 11").await;
    assert!(text(&reply.message).contains("`volume` is not a setting"));
    let reply = run(&h, admin(), "!ticket settings cooldown").await;
    assert!(text(&reply.message).contains("needs a value argument"));
}

#[tokio::test]
async fn test_categories_are_added_edited_and_removed() {
    let h = harness().await;
    let reply = run(&h, admin(), r#"!ticket category add "Bug Reports" Something broke"#).await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));

    let reply = run(
        &h,
        admin(),
        r#"!ticket category edit "bug reports" emoji=🐛 color=#ff0000 field="Version|e.g. 1.2|required""#,
    )
    .await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));

    let config = h.tickets.config(GUILD).await.expect("config");
    let bugs = config.category("Bug Reports").expect("category");
    assert_eq!(bugs.description, "Something broke");
    assert_eq!(bugs.emoji, "🐛");
    assert_eq!(bugs.color, 0xFF0000);
    assert_eq!(bugs.custom_fields.len(), 1);
    assert!(bugs.custom_fields[0].required);

    let reply = run(&h, admin(), r#"!ticket category add "Bug Reports""#).await;
    assert!(text(&reply.message).contains("already exists"));

    run(&h, admin(), r#"!ticket category remove "Bug Reports""#).await;
    let config = h.tickets.config(GUILD).await.expect("config");
    assert!(config.category("Bug Reports").is_none());
}

#[tokio::test]
async fn test_last_category_cannot_be_removed() {
    let h = harness().await;
    let reply = run(&h, admin(), r#"!ticket category remove "General Support""#).await;
    assert_eq!(color(&reply.message), Some(ERROR_COLOR));
    let config = h.tickets.config(GUILD).await.expect("config");
    assert_eq!(config.categories.len(), 1);
}

#[tokio::test]
async fn test_setup_posts_panel_and_stores_channels() {
    let h = harness().await;
    let reply = run(
        &h,
        admin(),
        "!ticket setup panel=<#300> transcripts=<#301> support=<@&700>,<@&701>",
    )
    .await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));
    assert_eq!(h.platform.messages_in(300).len(), 1);

    let config = h.tickets.config(GUILD).await.expect("config");
    assert_eq!(config.transcript_channel_id, Some(301));
    assert_eq!(
        config.support_role_ids.into_iter().collect::<Vec<_>>(),
        vec![700, 701]
    );
}

#[tokio::test]
async fn test_ticket_export_attaches_a_file() {
    let h = harness().await;
    let reply = run(&h, admin(), "!ticket export csv").await;
    assert_eq!(reply.message.files.len(), 1);
    assert_eq!(reply.message.files[0].filename, format!("tickets-{}.csv", GUILD));
}

#[tokio::test]
async fn test_unknown_subcommand_names_the_path() {
    let h = harness().await;
    let reply = run(&h, admin(), "!ticket frobnicate").await;
    assert!(text(&reply.message).contains("Unknown command `ticket frobnicate`"));
}

#[tokio::test]
async fn test_setapi_removes_the_message_and_never_echoes_the_key() {
    let h = harness().await;
    let key = "vt-secret-abcdef0123456789";
    let reply = run(&h, admin(), &format!("!scan setapi {}", key)).await;
    assert!(reply.delete_source);
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));
    assert!(!text(&reply.message).contains(key));
    assert_eq!(h.scans.global_config().await.api_key.as_deref(), Some(key));
}

#[tokio::test]
async fn test_setapi_needs_server_administrator() {
    let h = harness().await;
    h.scans
        .update_guild(GUILD, |g| {
            g.admin_roles.insert(ADMIN_ROLE);
        })
        .await
        .expect("roles");
    let key = "vt-secret-abcdef0123456789";
    let reply = run(&h, role_admin(), &format!("!scan setapi {}", key)).await;
    assert!(reply.delete_source, "a refused key must still be removed");
    assert_eq!(color(&reply.message), Some(ERROR_COLOR));
    assert!(!text(&reply.message).contains(key));
    assert!(h.scans.global_config().await.api_key.is_none());

    let reply = run(&h, role_admin(), "!scan ratelimit 2 15").await;
    assert_eq!(color(&reply.message), Some(SUCCESS_COLOR), "{}", text(&reply.message));
}

#[tokio::test]
async fn test_scan_rate_limit_and_auto_scan_channels() {
    let h = harness().await;
    run(&h, admin(), "!scan ratelimit 4 30").await;
    let reply = run(&h, admin(), "!scan ratelimit 0 30").await;
    assert_eq!(color(&reply.message), Some(ERROR_COLOR));

    run(&h, admin(), "!scan autoscan add").await;
    run(&h, admin(), "!scan autoscan add <#77>").await;
    run(&h, admin(), "!scan autoscan remove <#77>").await;

    let guild = h.scans.guild_config(GUILD).await;
    assert_eq!(guild.rate_limit.per_user, 4);
    assert_eq!(guild.rate_limit.window_minutes, 30);
    assert_eq!(guild.auto_scan_channels.into_iter().collect::<Vec<_>>(), vec![CHANNEL]);
}

#[tokio::test]
async fn test_scan_toggles_flip_and_report_state() {
    let h = harness().await;
    let before = h.scans.guild_config(GUILD).await.enabled;
    let reply = run(&h, admin(), "!scan toggle enabled").await;
    assert_eq!(h.scans.guild_config(GUILD).await.enabled, !before);
    let expected = if before { "disabled" } else { "enabled" };
    assert!(text(&reply.message).contains(expected));

    let reply = run(&h, admin(), "!scan toggle everything").await;
    assert!(text(&reply.message).contains("cannot be toggled"));
}

#[tokio::test]
async fn test_scan_export_and_cleanup() {
    let h = harness().await;
    let reply = run(&h, admin(), "!scan export json").await;
    assert_eq!(reply.message.files.len(), 1);
    assert_eq!(reply.message.files[0].filename, format!("scan-history-{}.json", GUILD));

    let reply = run(&h, admin(), "!scan cleanup 30").await;
    assert!(text(&reply.message).contains("Removed 0 records"));
}

#[tokio::test]
async fn test_missing_subsystem_is_reported() {
    let h = harness().await;
    let commands = AdminCommands::new("?").with_tickets(Arc::clone(&h.tickets));
    let reply = commands
        .handle_message(&said(admin(), "?scan stats"))
        .await
        .expect("command");
    assert!(text(&reply.message).contains("scan subsystem is not running"));
}

#[tokio::test]
async fn test_direct_messages_are_refused() {
    let h = harness().await;
    let mut message = said(admin(), "!scan setapi secret-key-value");
    message.guild_id = None;
    let reply = h.commands.handle_message(&message).await.expect("command");
    assert!(reply.delete_source);
    assert!(text(&reply.message).contains("only works inside a server"));
}
