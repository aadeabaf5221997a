//! `scan` administrator subcommands.

use super::{
    Args, CommandContext, CommandReply, channel_or_none, id_list, parse_id_list, parse_snowflake,
    require,
};
use std::str::FromStr;
use tracing::info;
use vigil_core::GuildScanConfig;
use vigil_error::CommandResult;
use vigil_interface::{Embed, INFO_COLOR};
use vigil_scan::{ScanCore, is_scan_admin, views};
use vigil_storage::ExportFormat;

pub(super) async fn run(
    core: &ScanCore,
    ctx: &CommandContext,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let guild = core.guild_config(ctx.guild_id).await;
    let Some(sub) = args.subcommand() else {
        require(is_scan_admin(&guild, &ctx.member))?;
        return Ok(help());
    };
    // The API key is process-wide, so only server administrators may set it.
    if sub == "setapi" {
        require(*ctx.member.is_administrator())?;
        return set_api_key(core, args).await;
    }
    require(is_scan_admin(&guild, &ctx.member))?;

    match sub.as_str() {
        "toggle" => toggle(core, ctx, args).await,
        "ratelimit" => rate_limit(core, ctx, args).await,
        "autoscan" => channel_set(core, ctx, &guild, args, ChannelSet::AutoScan).await,
        "channels" => channel_set(core, ctx, &guild, args, ChannelSet::Allowed).await,
        "alerts" => alerts(core, ctx, args).await,
        "export" => export(core, ctx, args).await,
        "cleanup" => cleanup(core, ctx, args).await,
        "stats" => Ok(CommandReply::embed(views::stats(&core.stats(ctx.guild_id).await))),
        "config" => {
            let global = core.global_config().await;
            Ok(CommandReply::embed(views::info(&global, &guild)))
        }
        "panel" => {
            core.open_panel(ctx.guild_id, ctx.channel_id).await?;
            Ok(CommandReply::success("✅ Scan panel posted", "Members can now scan files here."))
        }
        "blacklist" => blacklist(core, ctx, &guild, args).await,
        "roles" => roles(core, ctx, &guild, args).await,
        "help" => Ok(help()),
        _ => Err(args.unknown()),
    }
}

fn help() -> CommandReply {
    CommandReply::embed(
        Embed::new("🛡️ Scan commands")
            .with_color(Some(INFO_COLOR))
            .with_description(Some(
                [
                    "`setapi <key>`",
                    "`toggle enabled|require_role|alerts`",
                    "`ratelimit <per_user> <window_minutes>`",
                    "`autoscan add|remove [#channel]` · `autoscan list|clear`",
                    "`channels add|remove [#channel]` · `channels list|clear`",
                    "`alerts [#channel|off]`",
                    "`export json|csv` · `cleanup <days>` · `stats` · `config`",
                    "`panel` · `blacklist add|remove <@user>` · `roles allowed=.. admin=..`",
                ]
                .join("\n"),
            )),
    )
}

async fn set_api_key(core: &ScanCore, mut args: Args) -> CommandResult<CommandReply> {
    let key = args.require("key")?;
    core.set_api_key(Some(key)).await?;
    info!("Scan API key replaced by command");
    let mut reply = CommandReply::success(
        "✅ API key saved",
        "The key was stored and your message was removed.",
    );
    reply.delete_source = true;
    Ok(reply)
}

async fn toggle(core: &ScanCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let what = args.require("enabled|require_role|alerts")?.to_lowercase();
    let (label, state) = match what.as_str() {
        "enabled" => (
            "Scanning",
            core.update_guild(ctx.guild_id, |g| {
                g.enabled = !g.enabled;
                g.enabled
            })
            .await?,
        ),
        "require_role" => (
            "Role requirement",
            core.update_guild(ctx.guild_id, |g| {
                g.require_role = !g.require_role;
                g.require_role
            })
            .await?,
        ),
        "alerts" => (
            "Threat alerts",
            core.update_guild(ctx.guild_id, |g| {
                g.alerts_enabled = !g.alerts_enabled;
                g.alerts_enabled
            })
            .await?,
        ),
        other => return Err(args.invalid("setting", format!("`{}` cannot be toggled", other))),
    };
    let state = if state { "enabled" } else { "disabled" };
    Ok(CommandReply::success("✅ Toggled", format!("{} {}.", label, state)))
}

async fn rate_limit(core: &ScanCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let per_user: u32 = args.parse("per_user")?;
    let window_minutes: u64 = args.parse("window_minutes")?;
    if per_user == 0 {
        return Err(args.invalid("per_user", "must be at least 1"));
    }
    if window_minutes == 0 {
        return Err(args.invalid("window_minutes", "must be at least 1"));
    }
    core.update_guild(ctx.guild_id, |g| {
        g.rate_limit.per_user = per_user;
        g.rate_limit.window_minutes = window_minutes;
    })
    .await?;
    Ok(CommandReply::success(
        "✅ Rate limit saved",
        format!("{} scans per {} minutes.", per_user, window_minutes),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelSet {
    AutoScan,
    Allowed,
}

impl ChannelSet {
    fn title(&self) -> &'static str {
        match self {
            ChannelSet::AutoScan => "Auto-scan channels",
            ChannelSet::Allowed => "Scan channels",
        }
    }

    fn of(self, guild: &mut GuildScanConfig) -> &mut std::collections::BTreeSet<u64> {
        match self {
            ChannelSet::AutoScan => &mut guild.auto_scan_channels,
            ChannelSet::Allowed => &mut guild.allowed_channels,
        }
    }
}

async fn channel_set(
    core: &ScanCore,
    ctx: &CommandContext,
    guild: &GuildScanConfig,
    mut args: Args,
    set: ChannelSet,
) -> CommandResult<CommandReply> {
    let action = args.subcommand().unwrap_or_else(|| "list".to_string());
    match action.as_str() {
        "add" | "remove" => {
            let channel = args.snowflake_or("channel", ctx.channel_id)?;
            let add = action == "add";
            core.update_guild(ctx.guild_id, |g| {
                if add {
                    set.of(g).insert(channel);
                } else {
                    set.of(g).remove(&channel);
                }
            })
            .await?;
            let verb = if add { "added to" } else { "removed from" };
            Ok(CommandReply::success(
                "✅ Channels updated",
                format!("<#{}> {} {}.", channel, verb, set.title().to_lowercase()),
            ))
        }
        "clear" => {
            core.update_guild(ctx.guild_id, |g| set.of(g).clear()).await?;
            Ok(CommandReply::success("✅ Channels cleared", format!("{} cleared.", set.title())))
        }
        "list" => {
            let mut copy = guild.clone();
            let ids = set.of(&mut copy);
            let empty = match set {
                ChannelSet::AutoScan => "None",
                ChannelSet::Allowed => "Any channel",
            };
            let text = if ids.is_empty() {
                empty.to_string()
            } else {
                id_list(ids, "#")
            };
            Ok(CommandReply::embed(
                Embed::new(format!("📺 {}", set.title()))
                    .with_color(Some(INFO_COLOR))
                    .with_description(Some(text)),
            ))
        }
        _ => Err(args.unknown()),
    }
}

async fn alerts(core: &ScanCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let channel = match args.next_word() {
        Some(raw) if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") => None,
        Some(raw) => Some(
            parse_snowflake(&raw)
                .ok_or_else(|| args.invalid("channel", format!("`{}` is not a channel", raw)))?,
        ),
        None => Some(ctx.channel_id),
    };
    core.update_guild(ctx.guild_id, |g| g.alert_channel_id = channel)
        .await?;
    Ok(CommandReply::success(
        "✅ Alert channel saved",
        format!("Threat alerts go to {}.", channel_or_none(channel)),
    ))
}

async fn export(core: &ScanCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let raw = args.next_word().unwrap_or_else(|| "json".to_string());
    let format = ExportFormat::from_str(&raw)
        .map_err(|_| args.invalid("format", "expected json or csv"))?;
    let bytes = core.export(ctx.guild_id, format).await?;
    Ok(CommandReply::success("📤 Scan export", "Scan history attached.").with_file(
        format!("scan-history-{}.{}", ctx.guild_id, format.extension()),
        bytes,
    ))
}

async fn cleanup(core: &ScanCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let days: u32 = args.parse("days")?;
    if days == 0 {
        return Err(args.invalid("days", "must be at least 1"));
    }
    let removed = core.cleanup(ctx.guild_id, days).await?;
    Ok(CommandReply::success(
        "🧹 History cleaned",
        format!("Removed {} records older than {} days.", removed, days),
    ))
}

async fn blacklist(
    core: &ScanCore,
    ctx: &CommandContext,
    guild: &GuildScanConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let action = args.subcommand().unwrap_or_else(|| "list".to_string());
    match action.as_str() {
        "add" | "remove" => {
            let user = args.snowflake("user")?;
            let add = action == "add";
            core.update_guild(ctx.guild_id, |g| {
                if add {
                    g.blacklisted_user_ids.insert(user);
                } else {
                    g.blacklisted_user_ids.remove(&user);
                }
            })
            .await?;
            let verb = if add { "can no longer" } else { "can again" };
            Ok(CommandReply::success(
                "✅ Scan blacklist updated",
                format!("<@{}> {} scan files.", user, verb),
            ))
        }
        "list" => Ok(CommandReply::embed(
            Embed::new("🚫 Scan blacklist")
                .with_color(Some(INFO_COLOR))
                .with_description(Some(id_list(&guild.blacklisted_user_ids, "@"))),
        )),
        _ => Err(args.unknown()),
    }
}

async fn roles(
    core: &ScanCore,
    ctx: &CommandContext,
    guild: &GuildScanConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let pairs = args.key_values()?;
    if pairs.is_empty() {
        return Ok(CommandReply::embed(
            Embed::new("👥 Scan roles")
                .with_color(Some(INFO_COLOR))
                .field("Allowed", id_list(&guild.allowed_roles, "@&"), false)
                .field("Admin", id_list(&guild.admin_roles, "@&"), false),
        ));
    }
    let mut allowed = None;
    let mut admin = None;
    for (key, value) in pairs {
        let ids = parse_id_list(&value).ok_or_else(|| args.invalid(&key, "expected role mentions"))?;
        match key.as_str() {
            "allowed" => allowed = Some(ids),
            "admin" => admin = Some(ids),
            _ => return Err(args.invalid(&key, "expected allowed= or admin=")),
        }
    }
    core.update_guild(ctx.guild_id, |g| {
        if let Some(ids) = allowed {
            g.allowed_roles = ids;
        }
        if let Some(ids) = admin {
            g.admin_roles = ids;
        }
    })
    .await?;
    Ok(CommandReply::success("✅ Roles saved", "Scan roles updated."))
}
