//! `ticket` administrator subcommands.

use super::{
    Args, CommandContext, CommandReply, channel_or_none, id_list, parse_id_list, parse_snowflake,
    parse_switch, require, yes_no,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use strum::VariantNames;
use tracing::debug;
use vigil_core::{
    ButtonStyle, CustomField, MAX_CUSTOM_FIELDS, MAX_SURVEY_QUESTIONS, TicketCategory,
    TicketConfig, TranscriptFormat, TranscriptZone,
};
use vigil_error::{CommandResult, TicketError, TicketErrorKind};
use vigil_interface::{Embed, INFO_COLOR};
use vigil_storage::ExportFormat;
use vigil_ticket::{TicketCore, is_admin};

pub(super) async fn run(
    core: &TicketCore,
    ctx: &CommandContext,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let config = core.config(ctx.guild_id).await?;
    require(is_admin(&config, &ctx.member))?;

    let Some(sub) = args.subcommand() else {
        return Ok(help());
    };
    match sub.as_str() {
        "setup" => setup(core, ctx, args).await,
        "panel" => panel(core, ctx, args).await,
        "category" => category(core, ctx, args).await,
        "settings" => settings(core, ctx, &config, args).await,
        "roles" => roles(core, ctx, &config, args).await,
        "stats" => Ok(stats(&config)),
        "blacklist" => blacklist(core, ctx, &config, args).await,
        "tags" => tags(core, ctx, &config, args).await,
        "export" => export(core, ctx, args).await,
        "survey" => survey(core, ctx, &config, args).await,
        "search" => search(core, ctx, args).await,
        "help" => Ok(help()),
        _ => Err(args.unknown()),
    }
}

fn help() -> CommandReply {
    CommandReply::embed(
        Embed::new("🎫 Ticket commands")
            .with_color(Some(INFO_COLOR))
            .with_description(Some(
                [
                    "`setup panel=#ch transcripts=#ch parent=<category id> support=@role admin=@role`",
                    "`panel [primary|secondary|success|danger]`",
                    "`category add|edit|remove \"<name>\" ...`",
                    "`settings [key value]`",
                    "`roles [support=.. admin=..]`",
                    "`stats`",
                    "`blacklist add|remove <@user>` · `blacklist clear|list`",
                    "`tags add|remove <tag>` · `tags emoji <tag> <emoji>` · `tags list`",
                    "`export csv|json`",
                    "`survey enable|disable|add|remove|clear|list`",
                    "`search <tag>`",
                ]
                .join("\n"),
            )),
    )
}

#[derive(Debug, Default)]
struct SetupPlan {
    panel: Option<u64>,
    transcripts: Option<u64>,
    parent: Option<u64>,
    support: Option<BTreeSet<u64>>,
    admin: Option<BTreeSet<u64>>,
}

async fn setup(core: &TicketCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let pairs = args.key_values()?;
    if pairs.is_empty() {
        return Err(args.missing("key=value"));
    }
    let mut plan = SetupPlan::default();
    for (key, value) in pairs {
        let id = || {
            parse_snowflake(&value)
                .ok_or_else(|| args.invalid(&key, format!("`{}` is not an ID or mention", value)))
        };
        let ids = || {
            parse_id_list(&value)
                .ok_or_else(|| args.invalid(&key, format!("`{}` is not a list of roles", value)))
        };
        match key.as_str() {
            "panel" => plan.panel = Some(id()?),
            "transcripts" | "transcript" => plan.transcripts = Some(id()?),
            "parent" | "category" => plan.parent = Some(id()?),
            "support" => plan.support = Some(ids()?),
            "admin" => plan.admin = Some(ids()?),
            _ => return Err(args.invalid(&key, "unknown setup key")),
        }
    }

    let SetupPlan {
        panel,
        transcripts,
        parent,
        support,
        admin,
    } = plan;
    let mut summary = Vec::new();
    if let Some(id) = transcripts {
        summary.push(format!("Transcripts: <#{}>", id));
    }
    if let Some(id) = parent {
        summary.push(format!("Ticket category: `{}`", id));
    }
    if let Some(ids) = &support {
        summary.push(format!("Support roles: {}", id_list(ids, "@&")));
    }
    if let Some(ids) = &admin {
        summary.push(format!("Admin roles: {}", id_list(ids, "@&")));
    }

    core.update_settings(ctx.guild_id, move |c| {
        if transcripts.is_some() {
            c.transcript_channel_id = transcripts;
        }
        if parent.is_some() {
            c.parent_category_id = parent;
        }
        if let Some(ids) = support {
            c.support_role_ids = ids;
        }
        if let Some(ids) = admin {
            c.admin_role_ids = ids;
        }
        Ok(())
    })
    .await?;

    if let Some(channel) = panel {
        core.open_panel(ctx.guild_id, channel, None).await?;
        summary.push(format!("Panel posted in <#{}>", channel));
    }
    Ok(CommandReply::success("✅ Ticket setup saved", summary.join("\n")))
}

async fn panel(core: &TicketCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let style = match args.next_word() {
        Some(raw) => Some(
            ButtonStyle::from_str(&raw)
                .map_err(|_| args.invalid("style", format!("`{}` is not a button style", raw)))?,
        ),
        None => None,
    };
    let message_id = core.open_panel(ctx.guild_id, ctx.channel_id, style).await?;
    debug!(message_id, "Panel posted by command");
    Ok(CommandReply::success("✅ Panel posted", "Members can now open tickets here."))
}

/// A change to one category, parsed before the guild lock is taken.
#[derive(Debug, Clone)]
enum CategoryEdit {
    Description(String),
    Emoji(String),
    Color(u32),
    Welcome(Option<String>),
    Priority(i32),
    Roles(BTreeSet<u64>),
    Tags(BTreeSet<String>),
    AddField(CustomField),
    ClearFields,
}

fn parse_color(raw: &str) -> Option<u32> {
    let hex = raw
        .trim_start_matches('#')
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u32::from_str_radix(hex, 16).ok().filter(|c| *c <= 0xFF_FFFF)
}

fn parse_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && t != "none")
        .collect()
}

/// `field=Label` or `field=Label|placeholder|required|long`.
fn parse_field(raw: &str) -> Option<CustomField> {
    let mut parts = raw.split('|').map(str::trim);
    let name = parts.next().filter(|n| !n.is_empty())?;
    let mut field = CustomField::new(name);
    for part in parts {
        match part.to_lowercase().as_str() {
            "required" => field.required = true,
            "long" => field.long = true,
            "" => {}
            _ => field.placeholder = part.to_string(),
        }
    }
    Some(field)
}

async fn category(core: &TicketCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let action = args.subcommand().ok_or_else(|| args.missing("add|edit|remove"))?;
    let name = args.require("name")?;
    match action.as_str() {
        "add" => {
            let description = args.rest().unwrap_or_default();
            let category = TicketCategory::new(name.clone(), description);
            let added = core
                .update_settings(ctx.guild_id, move |c| {
                    if c.category(&category.name).is_some() {
                        return Ok(false);
                    }
                    c.categories.push(category);
                    Ok(true)
                })
                .await?;
            if !added {
                return Err(args.invalid("name", format!("`{}` already exists", name)));
            }
            Ok(CommandReply::success("✅ Category added", format!("**{}** is now available.", name)))
        }
        "edit" => {
            let mut edits = Vec::new();
            for (key, value) in args.key_values()? {
                let edit = match key.as_str() {
                    "description" => CategoryEdit::Description(value),
                    "emoji" => CategoryEdit::Emoji(value),
                    "color" | "colour" => CategoryEdit::Color(
                        parse_color(&value)
                            .ok_or_else(|| args.invalid("color", "expected a hex color like #5865F2"))?,
                    ),
                    "welcome" if value.eq_ignore_ascii_case("none") => CategoryEdit::Welcome(None),
                    "welcome" => CategoryEdit::Welcome(Some(value)),
                    "priority" => CategoryEdit::Priority(
                        value
                            .parse()
                            .map_err(|_| args.invalid("priority", "expected a whole number"))?,
                    ),
                    "roles" => CategoryEdit::Roles(
                        parse_id_list(&value).ok_or_else(|| args.invalid("roles", "expected role mentions"))?,
                    ),
                    "tags" => CategoryEdit::Tags(parse_tags(&value)),
                    "field" if value.eq_ignore_ascii_case("clear") => CategoryEdit::ClearFields,
                    "field" => CategoryEdit::AddField(
                        parse_field(&value).ok_or_else(|| args.invalid("field", "a field needs a label"))?,
                    ),
                    _ => return Err(args.invalid(&key, "unknown category setting")),
                };
                edits.push(edit);
            }
            if edits.is_empty() {
                return Err(args.missing("key=value"));
            }
            let target = name.clone();
            let found = core
                .update_settings(ctx.guild_id, move |c| {
                    let Some(category) = c
                        .categories
                        .iter_mut()
                        .find(|cat| cat.name.eq_ignore_ascii_case(&target))
                    else {
                        return Ok(false);
                    };
                    for edit in edits {
                        match edit {
                            CategoryEdit::Description(d) => category.description = d,
                            CategoryEdit::Emoji(e) => category.emoji = e,
                            CategoryEdit::Color(color) => category.color = color,
                            CategoryEdit::Welcome(w) => category.custom_welcome = w,
                            CategoryEdit::Priority(p) => category.priority_level = p,
                            CategoryEdit::Roles(r) => category.required_roles = r,
                            CategoryEdit::Tags(t) => category.auto_tags = t,
                            CategoryEdit::ClearFields => category.custom_fields.clear(),
                            CategoryEdit::AddField(field) => {
                                if category.custom_fields.len() >= MAX_CUSTOM_FIELDS {
                                    return Err(TicketError::new(TicketErrorKind::InvalidInput(
                                        format!("a category holds at most {} custom fields", MAX_CUSTOM_FIELDS),
                                    )));
                                }
                                category.custom_fields.push(field);
                            }
                        }
                    }
                    Ok(true)
                })
                .await?;
            if !found {
                return Err(TicketError::new(TicketErrorKind::CategoryNotFound(name)).into());
            }
            Ok(CommandReply::success("✅ Category updated", format!("**{}** saved.", name)))
        }
        "remove" => {
            let target = name.clone();
            let outcome = core
                .update_settings(ctx.guild_id, move |c| {
                    let before = c.categories.len();
                    if before == 1 && c.category(&target).is_some() {
                        return Err(TicketError::new(TicketErrorKind::InvalidInput(
                            "the last category cannot be removed".to_string(),
                        )));
                    }
                    c.categories.retain(|cat| !cat.name.eq_ignore_ascii_case(&target));
                    Ok(c.categories.len() < before)
                })
                .await?;
            if !outcome {
                return Err(TicketError::new(TicketErrorKind::CategoryNotFound(name)).into());
            }
            Ok(CommandReply::success("✅ Category removed", format!("**{}** is gone.", name)))
        }
        _ => Err(args.unknown()),
    }
}

/// Ticket settings reachable through `settings <key> <value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::VariantNames)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
enum TicketSetting {
    Enabled,
    NamingFormat,
    Cooldown,
    MaxOpen,
    AutoCloseHours,
    AllowUserClose,
    AllowAnonymous,
    RequireReason,
    DmOnClose,
    DmOnReply,
    CloseConfirmation,
    ClaimSystem,
    RatingSystem,
    TagsEnabled,
    TranscriptFormat,
    TranscriptTimezone,
    IncludeAttachments,
    PinWelcome,
    WelcomeMessage,
    FormMode,
    TranscriptChannel,
    ParentCategory,
    CreationChannel,
    CloseChannel,
    PanelTitle,
    PanelDescription,
    PanelButtonLabel,
    PanelButtonEmoji,
    PanelButtonStyle,
    PanelFooter,
}

type SettingChange = Box<dyn FnOnce(&mut TicketConfig) + Send>;

fn switch(raw: &str) -> Result<bool, String> {
    parse_switch(raw).ok_or_else(|| format!("`{}` is not on or off", raw))
}

fn number<T: FromStr>(raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("`{}` is not a whole number", raw))
}

fn optional_channel(raw: &str) -> Result<Option<u64>, String> {
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    parse_snowflake(raw)
        .map(Some)
        .ok_or_else(|| format!("`{}` is not a channel", raw))
}

fn parse_setting(key: TicketSetting, raw: String) -> Result<SettingChange, String> {
    use TicketSetting as S;
    let change: SettingChange = match key {
        S::Enabled => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.enabled = v)
        }
        S::NamingFormat => {
            if !raw.contains("{number}") && !raw.contains("{user}") {
                return Err("use {number} or {user} in the format".to_string());
            }
            Box::new(move |c: &mut TicketConfig| c.naming_format = raw)
        }
        S::Cooldown => {
            let v = number(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.ticket_cooldown_secs = v)
        }
        S::MaxOpen => {
            let v: u32 = number(&raw)?;
            if v == 0 {
                return Err("must be at least 1".to_string());
            }
            Box::new(move |c: &mut TicketConfig| c.max_open_tickets_per_user = v)
        }
        S::AutoCloseHours => {
            let v = number(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.auto_close_hours = v)
        }
        S::AllowUserClose => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.allow_user_close = v)
        }
        S::AllowAnonymous => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.allow_anonymous = v)
        }
        S::RequireReason => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.require_reason_to_close = v)
        }
        S::DmOnClose => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.dm_on_close = v)
        }
        S::DmOnReply => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.dm_on_reply = v)
        }
        S::CloseConfirmation => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.close_confirmation = v)
        }
        S::ClaimSystem => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.claim_system = v)
        }
        S::RatingSystem => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.rating_system = v)
        }
        S::TagsEnabled => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.tags_enabled = v)
        }
        S::TranscriptFormat => {
            let v = TranscriptFormat::from_str(&raw)
                .map_err(|_| "expected text, html, csv or both".to_string())?;
            Box::new(move |c: &mut TicketConfig| c.transcript_format = v)
        }
        S::TranscriptTimezone => {
            if TranscriptZone::parse(&raw).is_none() {
                return Err(
                    "expected UTC, an offset like +02:00 or a zone like Europe/Berlin".to_string(),
                );
            }
            Box::new(move |c: &mut TicketConfig| c.transcript_timezone = raw)
        }
        S::IncludeAttachments => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.transcript_include_attachments = v)
        }
        S::PinWelcome => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.pin_welcome = v)
        }
        S::WelcomeMessage => Box::new(move |c: &mut TicketConfig| c.welcome_message = raw),
        S::FormMode => {
            let v = switch(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.form_mode = v)
        }
        S::TranscriptChannel => {
            let v = optional_channel(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.transcript_channel_id = v)
        }
        S::ParentCategory => {
            let v = optional_channel(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.parent_category_id = v)
        }
        S::CreationChannel => {
            let v = optional_channel(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.creation_notification_channel = v)
        }
        S::CloseChannel => {
            let v = optional_channel(&raw)?;
            Box::new(move |c: &mut TicketConfig| c.close_notification_channel = v)
        }
        S::PanelTitle => Box::new(move |c: &mut TicketConfig| c.panel.title = raw),
        S::PanelDescription => Box::new(move |c: &mut TicketConfig| c.panel.description = raw),
        S::PanelButtonLabel => Box::new(move |c: &mut TicketConfig| c.panel.button_label = raw),
        S::PanelButtonEmoji => Box::new(move |c: &mut TicketConfig| c.panel.button_emoji = raw),
        S::PanelButtonStyle => {
            let v = ButtonStyle::from_str(&raw)
                .map_err(|_| "expected primary, secondary, success or danger".to_string())?;
            Box::new(move |c: &mut TicketConfig| c.panel.button_style = v)
        }
        S::PanelFooter => {
            let v = (!raw.eq_ignore_ascii_case("none")).then_some(raw);
            Box::new(move |c: &mut TicketConfig| c.panel.footer = v)
        }
    };
    Ok(change)
}

fn settings_overview(config: &TicketConfig) -> CommandReply {
    let embed = Embed::new("⚙️ Ticket settings")
        .with_color(Some(INFO_COLOR))
        .field("Enabled", yes_no(config.enabled), true)
        .field("Naming", format!("`{}`", config.naming_format), true)
        .field("Cooldown", format!("{}s", config.ticket_cooldown_secs), true)
        .field("Max open", config.max_open_tickets_per_user.to_string(), true)
        .field(
            "Auto-close",
            if config.auto_close_hours == 0 {
                "Off".to_string()
            } else {
                format!("{}h idle", config.auto_close_hours)
            },
            true,
        )
        .field("User close", yes_no(config.allow_user_close), true)
        .field("Anonymous", yes_no(config.allow_anonymous), true)
        .field("Reason required", yes_no(config.require_reason_to_close), true)
        .field("Confirm close", yes_no(config.close_confirmation), true)
        .field("Claims", yes_no(config.claim_system), true)
        .field("Ratings", yes_no(config.rating_system), true)
        .field("Tags", yes_no(config.tags_enabled), true)
        .field("DM on close", yes_no(config.dm_on_close), true)
        .field("DM on reply", yes_no(config.dm_on_reply), true)
        .field("Form mode", yes_no(config.form_mode), true)
        .field(
            "Transcripts",
            format!(
                "{} · {} · {}",
                config.transcript_format,
                config.transcript_timezone,
                channel_or_none(config.transcript_channel_id)
            ),
            false,
        )
        .field(
            "Categories",
            config
                .categories
                .iter()
                .map(|c| format!("{} {}", c.emoji, c.name))
                .collect::<Vec<_>>()
                .join("\n"),
            false,
        )
        .with_footer(Some(format!("Keys: {}", TicketSetting::VARIANTS.join(", "))));
    CommandReply::embed(embed)
}

async fn settings(
    core: &TicketCore,
    ctx: &CommandContext,
    config: &TicketConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let Some(raw_key) = args.next_word() else {
        return Ok(settings_overview(config));
    };
    let key = TicketSetting::from_str(&raw_key).map_err(|_| {
        args.invalid(
            "key",
            format!("`{}` is not a setting; try one of {}", raw_key, TicketSetting::VARIANTS.join(", ")),
        )
    })?;
    let raw = args.require_rest("value")?;
    let change = parse_setting(key, raw.clone()).map_err(|reason| args.invalid(&key.to_string(), reason))?;
    core.update_settings(ctx.guild_id, move |c| {
        change(c);
        Ok(())
    })
    .await?;
    Ok(CommandReply::success("✅ Setting saved", format!("`{}` = `{}`", key, raw)))
}

async fn roles(
    core: &TicketCore,
    ctx: &CommandContext,
    config: &TicketConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let pairs = args.key_values()?;
    if pairs.is_empty() {
        return Ok(CommandReply::embed(
            Embed::new("👥 Ticket roles")
                .with_color(Some(INFO_COLOR))
                .field("Support", id_list(&config.support_role_ids, "@&"), false)
                .field("Admin", id_list(&config.admin_role_ids, "@&"), false),
        ));
    }
    let mut support = None;
    let mut admin = None;
    for (key, value) in pairs {
        let ids = parse_id_list(&value).ok_or_else(|| args.invalid(&key, "expected role mentions"))?;
        match key.as_str() {
            "support" => support = Some(ids),
            "admin" => admin = Some(ids),
            _ => return Err(args.invalid(&key, "expected support= or admin=")),
        }
    }
    core.update_settings(ctx.guild_id, move |c| {
        if let Some(ids) = support {
            c.support_role_ids = ids;
        }
        if let Some(ids) = admin {
            c.admin_role_ids = ids;
        }
        Ok(())
    })
    .await?;
    Ok(CommandReply::success("✅ Roles saved", "Ticket roles updated."))
}

fn stats(config: &TicketConfig) -> CommandReply {
    let stats = &config.stats;
    let average_rating = if stats.rating_count == 0 {
        "No ratings".to_string()
    } else {
        format!(
            "{:.2} ⭐ ({} ratings)",
            stats.rating_total as f64 / stats.rating_count as f64,
            stats.rating_count
        )
    };
    let mut embed = Embed::new("📊 Ticket statistics")
        .with_color(Some(INFO_COLOR))
        .field("Created", stats.total_created.to_string(), true)
        .field("Closed", stats.total_closed.to_string(), true)
        .field("Open", config.active_tickets.len().to_string(), true)
        .field(
            "Avg first response",
            format!("{:.1}h", stats.avg_response_time_hours),
            true,
        )
        .field(
            "Avg resolution",
            format!("{:.1}h", stats.avg_resolution_time_hours),
            true,
        )
        .field("Rating", average_rating, true);
    if !stats.categories.is_empty() {
        let lines: Vec<String> = stats
            .categories
            .iter()
            .map(|(name, c)| format!("{}: {} created, {} closed", name, c.created, c.closed))
            .collect();
        embed = embed.field("By category", lines.join("\n"), false);
    }
    CommandReply::embed(embed)
}

async fn blacklist(
    core: &TicketCore,
    ctx: &CommandContext,
    config: &TicketConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let action = args.subcommand().ok_or_else(|| args.missing("add|remove|clear|list"))?;
    match action.as_str() {
        "add" | "remove" => {
            let user = args.snowflake("user")?;
            let add = action == "add";
            core.update_settings(ctx.guild_id, move |c| {
                if add {
                    c.blacklisted_user_ids.insert(user);
                } else {
                    c.blacklisted_user_ids.remove(&user);
                }
                Ok(())
            })
            .await?;
            let verb = if add { "can no longer" } else { "can again" };
            Ok(CommandReply::success(
                "✅ Blacklist updated",
                format!("<@{}> {} open tickets.", user, verb),
            ))
        }
        "clear" => {
            let removed = core
                .update_settings(ctx.guild_id, |c| Ok(std::mem::take(&mut c.blacklisted_user_ids).len()))
                .await?;
            Ok(CommandReply::success("✅ Blacklist cleared", format!("{} users removed.", removed)))
        }
        "list" => Ok(CommandReply::embed(
            Embed::new("🚫 Ticket blacklist")
                .with_color(Some(INFO_COLOR))
                .with_description(Some(id_list(&config.blacklisted_user_ids, "@"))),
        )),
        _ => Err(args.unknown()),
    }
}

async fn tags(
    core: &TicketCore,
    ctx: &CommandContext,
    config: &TicketConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let action = args.subcommand().ok_or_else(|| args.missing("add|remove|emoji|list"))?;
    match action.as_str() {
        "add" => {
            let tag = args.require("tag")?.to_lowercase();
            let stored = tag.clone();
            core.update_settings(ctx.guild_id, move |c| {
                c.available_tags.insert(stored);
                Ok(())
            })
            .await?;
            Ok(CommandReply::success("✅ Tag added", format!("`{}` can now be applied.", tag)))
        }
        "remove" => {
            let tag = args.require("tag")?.to_lowercase();
            let target = tag.clone();
            let removed = core
                .update_settings(ctx.guild_id, move |c| {
                    c.tag_emojis.remove(&target);
                    Ok(c.available_tags.remove(&target))
                })
                .await?;
            if !removed {
                return Err(TicketError::new(TicketErrorKind::TagUnavailable(tag)).into());
            }
            Ok(CommandReply::success("✅ Tag removed", format!("`{}` is no longer offered.", tag)))
        }
        "emoji" => {
            let tag = args.require("tag")?.to_lowercase();
            let emoji = args.require("emoji")?;
            if !config.available_tags.contains(&tag) {
                return Err(TicketError::new(TicketErrorKind::TagUnavailable(tag)).into());
            }
            let (key, value) = (tag.clone(), emoji.clone());
            core.update_settings(ctx.guild_id, move |c| {
                c.tag_emojis.insert(key, value);
                Ok(())
            })
            .await?;
            Ok(CommandReply::success("✅ Tag emoji set", format!("{} `{}`", emoji, tag)))
        }
        "list" => {
            let lines: Vec<String> = config
                .available_tags
                .iter()
                .map(|t| match config.tag_emojis.get(t) {
                    Some(emoji) => format!("{} `{}`", emoji, t),
                    None => format!("`{}`", t),
                })
                .collect();
            Ok(CommandReply::embed(
                Embed::new("🏷️ Ticket tags")
                    .with_color(Some(INFO_COLOR))
                    .with_description(Some(if lines.is_empty() {
                        "No tags.".to_string()
                    } else {
                        lines.join("\n")
                    }))
                    .field("Enabled", yes_no(config.tags_enabled), true),
            ))
        }
        _ => Err(args.unknown()),
    }
}

async fn export(core: &TicketCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let raw = args.next_word().unwrap_or_else(|| "json".to_string());
    let format = ExportFormat::from_str(&raw)
        .map_err(|_| args.invalid("format", "expected csv or json"))?;
    let bytes = core.export_closed(ctx.guild_id, format).await?;
    Ok(CommandReply::success("📤 Ticket export", "Closed tickets attached.")
        .with_file(format!("tickets-{}.{}", ctx.guild_id, format.extension()), bytes))
}

async fn survey(
    core: &TicketCore,
    ctx: &CommandContext,
    config: &TicketConfig,
    mut args: Args,
) -> CommandResult<CommandReply> {
    let action = args
        .subcommand()
        .ok_or_else(|| args.missing("enable|disable|add|remove|clear|list"))?;
    match action.as_str() {
        "enable" | "disable" => {
            let on = action == "enable";
            core.update_settings(ctx.guild_id, move |c| {
                c.survey_enabled = on;
                Ok(())
            })
            .await?;
            Ok(CommandReply::success(
                "✅ Survey updated",
                format!("Post-close survey {}.", if on { "enabled" } else { "disabled" }),
            ))
        }
        "add" => {
            let question = args.require_rest("question")?;
            if config.survey_questions.len() >= MAX_SURVEY_QUESTIONS {
                return Err(args.invalid(
                    "question",
                    format!("a survey holds at most {} questions", MAX_SURVEY_QUESTIONS),
                ));
            }
            core.update_settings(ctx.guild_id, move |c| {
                c.survey_questions.push(question);
                Ok(())
            })
            .await?;
            Ok(CommandReply::success("✅ Question added", "The survey was updated."))
        }
        "remove" => {
            let index: usize = args.parse("number")?;
            if index == 0 || index > config.survey_questions.len() {
                return Err(args.invalid("number", format!("pick 1 to {}", config.survey_questions.len())));
            }
            let removed = core
                .update_settings(ctx.guild_id, move |c| {
                    Ok((index <= c.survey_questions.len()).then(|| c.survey_questions.remove(index - 1)))
                })
                .await?;
            Ok(CommandReply::success(
                "✅ Question removed",
                removed.unwrap_or_default(),
            ))
        }
        "clear" => {
            core.update_settings(ctx.guild_id, |c| {
                c.survey_questions.clear();
                Ok(())
            })
            .await?;
            Ok(CommandReply::success("✅ Survey cleared", "No questions remain."))
        }
        "list" => {
            let lines: Vec<String> = config
                .survey_questions
                .iter()
                .enumerate()
                .map(|(i, q)| format!("{}. {}", i + 1, q))
                .collect();
            Ok(CommandReply::embed(
                Embed::new("📝 Survey")
                    .with_color(Some(INFO_COLOR))
                    .field("Enabled", yes_no(config.survey_enabled), true)
                    .with_description(Some(if lines.is_empty() {
                        "No questions.".to_string()
                    } else {
                        lines.join("\n")
                    })),
            ))
        }
        _ => Err(args.unknown()),
    }
}

async fn search(core: &TicketCore, ctx: &CommandContext, mut args: Args) -> CommandResult<CommandReply> {
    let tag = args.require("tag")?;
    let found = core.search_by_tag(ctx.guild_id, &tag).await?;
    let mut embed = Embed::new(format!("🔍 Tickets tagged `{}`", tag.to_lowercase()))
        .with_color(Some(INFO_COLOR))
        .with_footer(Some(format!("{} matches", found.len())));
    if found.is_empty() {
        embed = embed.with_description(Some("Nothing found.".to_string()));
    }
    if !found.active.is_empty() {
        let lines: Vec<String> = found
            .active
            .iter()
            .take(15)
            .map(|t| format!("#{} <#{}> {}", t.number, t.channel_id, t.title))
            .collect();
        embed = embed.field("Open", lines.join("\n"), false);
    }
    if !found.closed.is_empty() {
        let lines: Vec<String> = found
            .closed
            .iter()
            .take(15)
            .map(|t| {
                format!(
                    "#{} {} (closed {})",
                    t.ticket.number,
                    t.ticket.title,
                    t.closed_at.format("%Y-%m-%d")
                )
            })
            .collect();
        embed = embed.field("Closed", lines.join("\n"), false);
    }
    Ok(CommandReply::embed(embed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_keys_parse_in_snake_case() {
        assert_eq!(TicketSetting::from_str("max_open").ok(), Some(TicketSetting::MaxOpen));
        assert_eq!(TicketSetting::from_str("DM_ON_CLOSE").ok(), Some(TicketSetting::DmOnClose));
        assert!(TicketSetting::from_str("colour_scheme").is_err());
    }

    #[test]
    fn test_setting_values_are_validated_before_applying() {
        let mut config = TicketConfig::default();
        parse_setting(TicketSetting::Cooldown, "60".into()).expect("number")(&mut config);
        parse_setting(TicketSetting::AllowAnonymous, "on".into()).expect("switch")(&mut config);
        parse_setting(TicketSetting::TranscriptFormat, "HTML".into()).expect("format")(&mut config);
        parse_setting(TicketSetting::CloseChannel, "<#55>".into()).expect("channel")(&mut config);
        parse_setting(TicketSetting::TranscriptTimezone, "Europe/Berlin".into()).expect("zone")(
            &mut config,
        );
        assert_eq!(config.ticket_cooldown_secs, 60);
        assert!(config.allow_anonymous);
        assert_eq!(config.transcript_format, TranscriptFormat::Html);
        assert_eq!(config.close_notification_channel, Some(55));
        assert_eq!(config.transcript_timezone, "Europe/Berlin");

        assert!(parse_setting(TicketSetting::MaxOpen, "0".into()).is_err());
        assert!(parse_setting(TicketSetting::TranscriptTimezone, "Mars/Olympus".into()).is_err());
        assert!(parse_setting(TicketSetting::NamingFormat, "support".into()).is_err());
    }

    #[test]
    fn test_field_and_color_syntax() {
        let field = parse_field("Order number|e.g. 1234|required").expect("field");
        assert_eq!(field.name, "Order number");
        assert_eq!(field.placeholder, "e.g. 1234");
        assert!(field.required);
        assert!(!field.long);
        assert!(parse_field("|long").is_none());

        assert_eq!(parse_color("#5865F2"), Some(0x5865F2));
        assert_eq!(parse_color("0xff0000"), Some(0xFF0000));
        assert_eq!(parse_color("1000000"), None);
    }
}
