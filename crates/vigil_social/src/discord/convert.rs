//! Conversions between Vigil's platform-neutral types and serenity models.

use chrono::{DateTime, Utc};
use serenity::all::{
    ButtonStyle as DiscordButtonStyle, ComponentInteraction as DiscordComponent,
    ComponentInteractionDataKind, CreateActionRow, CreateAttachment, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateModal, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, EditMessage, GuildId, InputTextStyle, Member,
    Message, ModalInteraction, PermissionOverwrite as DiscordOverwrite, PermissionOverwriteType,
    Permissions, ReactionType, RoleId, Timestamp, User, UserId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use vigil_core::{ButtonStyle, MemberInfo};
use vigil_error::{PlatformError, PlatformErrorKind};
use vigil_interface::{
    ActionRow, AttachmentRef, ChannelPermissions, Component, ComponentInteraction, Embed,
    EmbedSummary, FileAttachment, HistoryMessage, IncomingMessage, InteractionResponse, Modal,
    ModalSubmission, OutgoingMessage, OverwriteTarget, PermissionOverwrite, TextInput,
};

/// Map a serenity failure onto a platform error kind.
///
/// `not_found` builds the kind used for a 404 from the addressed object.
#[track_caller]
pub(crate) fn platform_error(
    err: serenity::Error,
    not_found: impl FnOnce() -> PlatformErrorKind,
    other: impl FnOnce(String) -> PlatformErrorKind,
) -> PlatformError {
    let kind = match &err {
        serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(response)) => {
            match response.status_code.as_u16() {
                403 => PlatformErrorKind::InsufficientPermissions(response.error.message.clone()),
                404 => not_found(),
                _ => other(err.to_string()),
            }
        }
        _ => other(err.to_string()),
    };
    PlatformError::new(kind)
}

fn permission_bits(bits: ChannelPermissions) -> Permissions {
    let mut permissions = Permissions::empty();
    if bits.read {
        permissions |= Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY;
    }
    if bits.write {
        permissions |= Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES | Permissions::EMBED_LINKS;
    }
    if bits.manage {
        permissions |= Permissions::MANAGE_CHANNELS | Permissions::MANAGE_MESSAGES;
    }
    permissions
}

/// Overwrites for channel creation. The everyone role shares the guild's ID.
pub(crate) fn overwrites(guild_id: u64, overwrites: &[PermissionOverwrite]) -> Vec<DiscordOverwrite> {
    overwrites
        .iter()
        .map(|o| DiscordOverwrite {
            allow: permission_bits(o.allow),
            deny: permission_bits(o.deny),
            kind: match o.target {
                OverwriteTarget::Everyone => PermissionOverwriteType::Role(RoleId::new(guild_id)),
                OverwriteTarget::Role(id) => PermissionOverwriteType::Role(RoleId::new(id)),
                OverwriteTarget::Member(id) => PermissionOverwriteType::Member(UserId::new(id)),
            },
        })
        .collect()
}

fn button_style(style: ButtonStyle) -> DiscordButtonStyle {
    match style {
        ButtonStyle::Primary => DiscordButtonStyle::Primary,
        ButtonStyle::Secondary => DiscordButtonStyle::Secondary,
        ButtonStyle::Success => DiscordButtonStyle::Success,
        ButtonStyle::Danger => DiscordButtonStyle::Danger,
    }
}

fn reaction(emoji: &str) -> ReactionType {
    ReactionType::try_from(emoji).unwrap_or_else(|_| ReactionType::Unicode(emoji.to_string()))
}

fn timestamp(at: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_unix_timestamp(at.timestamp()).ok()
}

pub(crate) fn embed(embed: &Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new().title(&embed.title);
    if let Some(description) = &embed.description {
        out = out.description(description);
    }
    if let Some(color) = embed.color {
        out = out.colour(color);
    }
    for field in &embed.fields {
        out = out.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        out = out.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(at) = embed.timestamp.and_then(timestamp) {
        out = out.timestamp(at);
    }
    out
}

/// A row of buttons, or a single select menu.
///
/// Rows mixing a select with other widgets are not allowed by the platform;
/// the select wins and the rest is dropped.
pub(crate) fn action_row(row: &ActionRow) -> Option<CreateActionRow> {
    let mut buttons = Vec::new();
    for component in &row.components {
        match component {
            Component::Button {
                custom_id,
                label,
                style,
                emoji,
                disabled,
            } => {
                let mut button = CreateButton::new(custom_id)
                    .label(label)
                    .style(button_style(*style))
                    .disabled(*disabled);
                if let Some(emoji) = emoji {
                    button = button.emoji(reaction(emoji));
                }
                buttons.push(button);
            }
            Component::Link { label, url } => buttons.push(CreateButton::new_link(url).label(label)),
            Component::Select {
                custom_id,
                placeholder,
                options,
                disabled,
            } => {
                if !buttons.is_empty() {
                    debug!(custom_id = %custom_id, "Dropping buttons that share a row with a select");
                }
                let options = options
                    .iter()
                    .map(|option| {
                        let mut out = CreateSelectMenuOption::new(&option.label, &option.value);
                        if let Some(description) = &option.description {
                            out = out.description(description);
                        }
                        if let Some(emoji) = &option.emoji {
                            out = out.emoji(reaction(emoji));
                        }
                        out
                    })
                    .collect();
                let menu = CreateSelectMenu::new(custom_id, CreateSelectMenuKind::String { options })
                    .placeholder(placeholder)
                    .disabled(*disabled);
                return Some(CreateActionRow::SelectMenu(menu));
            }
        }
    }
    if buttons.is_empty() {
        None
    } else {
        Some(CreateActionRow::Buttons(buttons))
    }
}

fn rows(message: &OutgoingMessage) -> Vec<CreateActionRow> {
    message.components.iter().filter_map(action_row).collect()
}

fn attachments(files: &[FileAttachment]) -> Vec<CreateAttachment> {
    files
        .iter()
        .map(|file| CreateAttachment::bytes(file.bytes.clone(), file.filename.clone()))
        .collect()
}

pub(crate) fn create_message(message: &OutgoingMessage) -> CreateMessage {
    let mut out = CreateMessage::new()
        .embeds(message.embeds.iter().map(embed).collect())
        .components(rows(message))
        .add_files(attachments(&message.files));
    if let Some(content) = &message.content {
        out = out.content(content);
    }
    out
}

pub(crate) fn edit_message(message: &OutgoingMessage) -> EditMessage {
    EditMessage::new()
        .content(message.content.clone().unwrap_or_default())
        .embeds(message.embeds.iter().map(embed).collect())
        .components(rows(message))
}

fn response_message(message: &OutgoingMessage) -> CreateInteractionResponseMessage {
    let mut out = CreateInteractionResponseMessage::new()
        .embeds(message.embeds.iter().map(embed).collect())
        .components(rows(message))
        .add_files(attachments(&message.files));
    if let Some(content) = &message.content {
        out = out.content(content);
    }
    out
}

fn modal(modal: &Modal) -> CreateModal {
    let inputs = modal
        .inputs
        .iter()
        .map(|input: &TextInput| {
            let style = if input.long {
                InputTextStyle::Paragraph
            } else {
                InputTextStyle::Short
            };
            let mut out = CreateInputText::new(style, &input.label, &input.custom_id)
                .required(input.required);
            if let Some(placeholder) = &input.placeholder {
                out = out.placeholder(placeholder);
            }
            if let Some(max) = input.max_length {
                out = out.max_length(u16::try_from(max).unwrap_or(u16::MAX));
            }
            if let Some(value) = &input.value {
                out = out.value(value);
            }
            CreateActionRow::InputText(out)
        })
        .collect();
    CreateModal::new(&modal.custom_id, &modal.title).components(inputs)
}

pub(crate) fn interaction_response(response: &InteractionResponse) -> CreateInteractionResponse {
    match response {
        InteractionResponse::Message { message, ephemeral } => {
            CreateInteractionResponse::Message(response_message(message).ephemeral(*ephemeral))
        }
        InteractionResponse::Update(message) => {
            CreateInteractionResponse::UpdateMessage(response_message(message))
        }
        InteractionResponse::Modal(form) => CreateInteractionResponse::Modal(modal(form)),
        InteractionResponse::Acknowledge => CreateInteractionResponse::Acknowledge,
    }
}

fn display_name(user: &User) -> String {
    user.global_name.clone().unwrap_or_else(|| user.name.clone())
}

/// Member snapshot from an interaction, where permissions are resolved.
pub(crate) fn interaction_member(member: Option<&Member>, user: &User) -> MemberInfo {
    let base = MemberInfo::new(user.id.get(), display_name(user)).with_is_bot(user.bot);
    match member {
        Some(member) => base
            .with_display_name(member.display_name().to_string())
            .with_role_ids(member.roles.iter().map(|r| r.get()).collect())
            .with_is_administrator(member.permissions.is_some_and(|p| p.administrator())),
        None => base,
    }
}

/// Member snapshot from a message. The administrator flag is left unset.
pub(crate) fn message_author(message: &Message) -> MemberInfo {
    let roles: BTreeSet<u64> = message
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();
    let name = message
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_else(|| display_name(&message.author));
    MemberInfo::new(message.author.id.get(), name)
        .with_role_ids(roles)
        .with_is_bot(message.author.bot)
}

fn attachment_refs(message: &Message) -> Vec<AttachmentRef> {
    message
        .attachments
        .iter()
        .map(|a| AttachmentRef::new(a.filename.clone(), a.url.clone(), u64::from(a.size)))
        .collect()
}

pub(crate) fn incoming_message(message: &Message) -> IncomingMessage {
    IncomingMessage {
        guild_id: message.guild_id.map(GuildId::get),
        channel_id: message.channel_id.get(),
        message_id: message.id.get(),
        author: message_author(message),
        content: message.content.clone(),
        attachments: attachment_refs(message),
    }
}

pub(crate) fn history_message(message: &Message) -> HistoryMessage {
    HistoryMessage {
        id: message.id.get(),
        author_id: message.author.id.get(),
        author_name: display_name(&message.author),
        author_avatar: message.author.avatar_url(),
        is_bot: message.author.bot,
        content: message.content.clone(),
        timestamp: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
            .unwrap_or_default(),
        attachments: attachment_refs(message),
        embeds: message
            .embeds
            .iter()
            .map(|e| EmbedSummary {
                title: e.title.clone(),
                description: e.description.clone(),
            })
            .collect(),
    }
}

pub(crate) fn component_interaction(interaction: &DiscordComponent) -> ComponentInteraction {
    let values = match &interaction.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        _ => Vec::new(),
    };
    ComponentInteraction {
        guild_id: interaction.guild_id.map(GuildId::get),
        channel_id: interaction.channel_id.get(),
        message_id: interaction.message.id.get(),
        member: interaction_member(interaction.member.as_ref(), &interaction.user),
        custom_id: interaction.data.custom_id.clone(),
        values,
    }
}

pub(crate) fn modal_submission(interaction: &ModalInteraction) -> ModalSubmission {
    let mut values = BTreeMap::new();
    for row in &interaction.data.components {
        for component in &row.components {
            if let serenity::all::ActionRowComponent::InputText(input) = component {
                values.insert(
                    input.custom_id.clone(),
                    input.value.clone().unwrap_or_default(),
                );
            }
        }
    }
    ModalSubmission {
        guild_id: interaction.guild_id.map(GuildId::get),
        channel_id: interaction.channel_id.get(),
        member: interaction_member(interaction.member.as_ref(), &interaction.user),
        custom_id: interaction.data.custom_id.clone(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_bits_cover_each_level() {
        assert_eq!(permission_bits(ChannelPermissions::NONE), Permissions::empty());
        let read = permission_bits(ChannelPermissions::READ);
        assert!(read.view_channel());
        assert!(!read.send_messages());
        let all = permission_bits(ChannelPermissions::ALL);
        assert!(all.send_messages() && all.manage_channels());
    }

    #[test]
    fn test_everyone_overwrite_targets_guild_role() {
        let converted = overwrites(
            77,
            &[PermissionOverwrite::deny(
                OverwriteTarget::Everyone,
                ChannelPermissions::READ,
            )],
        );
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].kind, PermissionOverwriteType::Role(RoleId::new(77)));
        assert!(converted[0].deny.view_channel());
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        assert!(action_row(&ActionRow::default()).is_none());
        let row = ActionRow::new(vec![Component::button("a", "A", ButtonStyle::Danger)]);
        assert!(action_row(&row).is_some());
    }
}
