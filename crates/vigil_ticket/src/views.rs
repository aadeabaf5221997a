//! Messages, embeds and widgets the ticket subsystem posts.

use crate::flow::FormInput;
use crate::TicketWidget;
use chrono::{DateTime, Utc};
use vigil_core::{
    ActiveTicket, ButtonStyle, ClosedTicket, Closer, SurveyAnswer, TicketCategory, TicketConfig,
};
use vigil_interface::{
    ActionRow, Component, ERROR_COLOR, Embed, INFO_COLOR, MAX_MODAL_INPUTS, Modal,
    OutgoingMessage, SUCCESS_COLOR, SelectOption, TextInput,
};

const CLOSE_COLOR: u32 = 0xE67E22;

/// Panel message with the single entry button.
pub fn panel_message(config: &TicketConfig, style: ButtonStyle) -> OutgoingMessage {
    let panel = &config.panel;
    let mut embed = Embed::new(panel.title.clone())
        .with_description(Some(panel.description.clone()))
        .with_color(Some(INFO_COLOR))
        .with_footer(panel.footer.clone());
    for category in &config.categories {
        let description = if category.description.is_empty() {
            "\u{200b}".to_string()
        } else {
            category.description.clone()
        };
        embed = embed.field(format!("{} {}", category.emoji, category.name), description, true);
    }
    let button = Component::button(TicketWidget::Panel, panel.button_label.clone(), style)
        .with_emoji(panel.button_emoji.clone());
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![button]))
}

/// Categories in picker order: highest priority first, then configured order.
pub fn ordered_categories(config: &TicketConfig) -> Vec<&TicketCategory> {
    let mut categories: Vec<&TicketCategory> = config.categories.iter().collect();
    categories.sort_by(|a, b| b.priority_level.cmp(&a.priority_level));
    categories
}

/// Ephemeral category picker, with the anonymous toggle when allowed.
pub fn category_picker(config: &TicketConfig, session: &str, anonymous: bool) -> OutgoingMessage {
    let options = ordered_categories(config)
        .into_iter()
        .map(|category| {
            let mut option = SelectOption::new(category.name.clone(), category.name.clone());
            if !category.description.is_empty() {
                option.description = Some(category.description.clone());
            }
            option.emoji = Some(category.emoji.clone());
            option
        })
        .collect();
    let select = Component::Select {
        custom_id: TicketWidget::Category {
            session: session.to_string(),
        }
        .to_string(),
        placeholder: "Choose a category".to_string(),
        options,
        disabled: false,
    };

    let mut embed = Embed::new("Open a ticket")
        .with_description(Some("Pick the category that best fits your request.".to_string()))
        .with_color(Some(INFO_COLOR));
    if config.allow_anonymous {
        let state = if anonymous { "on" } else { "off" };
        embed = embed.field("Anonymous", state, true);
    }

    let mut message = OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![select]));
    if config.allow_anonymous {
        let (label, style) = if anonymous {
            ("Anonymous: on", ButtonStyle::Success)
        } else {
            ("Anonymous: off", ButtonStyle::Secondary)
        };
        message = message.with_row(ActionRow::new(vec![Component::button(
            TicketWidget::AnonymousToggle {
                session: session.to_string(),
            },
            label,
            style,
        )]));
    }
    message
}

/// Creation form modal for one step.
pub fn form_modal(
    session: &str,
    step: usize,
    total_steps: usize,
    category: &TicketCategory,
    inputs: &[FormInput],
) -> Modal {
    let title = if total_steps > 1 {
        format!("{} ticket ({}/{})", category.name, step + 1, total_steps)
    } else {
        format!("{} ticket", category.name)
    };
    let inputs = inputs
        .iter()
        .take(MAX_MODAL_INPUTS)
        .filter_map(|input| match input {
            FormInput::Title => {
                let mut text = TextInput::short(input.custom_id(), "Title");
                text.max_length = Some(vigil_core::MAX_TITLE_LEN as u32);
                Some(text)
            }
            FormInput::Description => {
                let mut text = TextInput::paragraph(input.custom_id(), "Description");
                text.max_length = Some(vigil_core::MAX_DESCRIPTION_LEN as u32);
                Some(text)
            }
            FormInput::Field(index) => category.custom_fields.get(*index).map(|field| TextInput {
                custom_id: input.custom_id(),
                label: field.name.clone(),
                placeholder: (!field.placeholder.is_empty()).then(|| field.placeholder.clone()),
                required: field.required,
                long: field.long,
                max_length: Some(field.max_length),
                value: None,
            }),
        })
        .collect();
    Modal {
        custom_id: TicketWidget::Form {
            session: session.to_string(),
            step,
        }
        .to_string(),
        title: title.chars().take(45).collect(),
        inputs,
    }
}

/// Prompt shown between form steps.
pub fn continue_prompt(session: &str, step: usize, total_steps: usize) -> OutgoingMessage {
    let embed = Embed::new("Almost there")
        .with_description(Some(format!(
            "Step {} of {} saved. Continue to fill in the rest.",
            step, total_steps
        )))
        .with_color(Some(INFO_COLOR));
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![Component::button(
        TicketWidget::FormContinue {
            session: session.to_string(),
            step,
        },
        "Continue",
        ButtonStyle::Primary,
    )]))
}

/// Control panel row under the welcome message.
pub fn control_panel(config: &TicketConfig, ticket_id: &str) -> ActionRow {
    let id = ticket_id.to_string();
    let mut components = vec![
        Component::button(
            TicketWidget::Close { ticket_id: id.clone() },
            "Close",
            ButtonStyle::Danger,
        )
        .with_emoji("🔒"),
        Component::button(
            TicketWidget::Transcript { ticket_id: id.clone() },
            "Transcript",
            ButtonStyle::Secondary,
        )
        .with_emoji("📜"),
    ];
    if config.claim_system {
        components.push(
            Component::button(
                TicketWidget::Claim { ticket_id: id.clone() },
                "Claim",
                ButtonStyle::Success,
            )
            .with_emoji("🙋"),
        );
    }
    if config.tags_enabled {
        components.push(
            Component::button(TicketWidget::Tag { ticket_id: id }, "Tag", ButtonStyle::Secondary)
                .with_emoji("🏷️"),
        );
    }
    ActionRow::new(components)
}

/// Welcome message posted in a new ticket channel.
///
/// The mention is the creator, or "Support Team" for anonymous tickets.
pub fn welcome_message(
    config: &TicketConfig,
    ticket: &ActiveTicket,
    category: &TicketCategory,
) -> OutgoingMessage {
    let mention = if ticket.is_anonymous {
        "Support Team".to_string()
    } else {
        format!("<@{}>", ticket.creator_id)
    };
    let welcome = category
        .custom_welcome
        .clone()
        .unwrap_or_else(|| config.welcome_message.clone());

    let mut embed = Embed::new(format!("{} Ticket #{}: {}", category.emoji, ticket.number, ticket.title))
        .with_description(Some(welcome))
        .with_color(Some(category.color))
        .with_timestamp(Some(ticket.created_at))
        .field("Category", ticket.category_name.clone(), true)
        .field("Opened by", ticket.creator_label(), true);
    if !ticket.description.is_empty() {
        embed = embed.field("Description", ticket.description.clone(), false);
    }
    for (name, value) in &ticket.custom_field_values {
        embed = embed.field(name.clone(), value.clone(), false);
    }
    if !ticket.tags.is_empty() {
        embed = embed.field("Tags", tag_list(config, ticket), false);
    }

    OutgoingMessage::embed(embed)
        .with_content(mention)
        .with_row(control_panel(config, &ticket.id))
}

/// Tags with their configured emoji, comma separated.
pub fn tag_list(config: &TicketConfig, ticket: &ActiveTicket) -> String {
    ticket
        .tags
        .iter()
        .map(|tag| match config.tag_emojis.get(tag) {
            Some(emoji) => format!("{} {}", emoji, tag),
            None => tag.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ephemeral tag picker.
pub fn tag_picker(config: &TicketConfig, ticket: &ActiveTicket) -> OutgoingMessage {
    let options = config
        .available_tags
        .iter()
        .map(|tag| {
            let mut option = SelectOption::new(tag.clone(), tag.clone());
            option.emoji = config.tag_emojis.get(tag).cloned();
            option.description = Some(if ticket.tags.contains(tag) {
                "Applied, select to remove".to_string()
            } else {
                "Select to apply".to_string()
            });
            option
        })
        .collect();
    let embed = Embed::new(format!("Tags for ticket #{}", ticket.number))
        .with_description(Some(if ticket.tags.is_empty() {
            "No tags applied".to_string()
        } else {
            tag_list(config, ticket)
        }))
        .with_color(Some(INFO_COLOR));
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![Component::Select {
        custom_id: TicketWidget::TagSelect {
            ticket_id: ticket.id.clone(),
        }
        .to_string(),
        placeholder: "Toggle a tag".to_string(),
        options,
        disabled: false,
    }]))
}

/// Ephemeral close confirmation.
pub fn close_confirmation(correlation: &str) -> OutgoingMessage {
    let embed = Embed::new("Close this ticket?")
        .with_description(Some(
            "The channel will be deleted once the transcript is saved.".to_string(),
        ))
        .with_color(Some(CLOSE_COLOR));
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![
        Component::button(
            TicketWidget::CloseConfirm {
                correlation: correlation.to_string(),
            },
            "Close",
            ButtonStyle::Danger,
        ),
        Component::button(
            TicketWidget::CloseCancel {
                correlation: correlation.to_string(),
            },
            "Cancel",
            ButtonStyle::Secondary,
        ),
    ]))
}

/// Modal asking for a close reason.
pub fn close_reason_modal(ticket: &ActiveTicket) -> Modal {
    let mut reason = TextInput::paragraph("reason", "Reason");
    reason.max_length = Some(500);
    Modal {
        custom_id: TicketWidget::CloseReason {
            ticket_id: ticket.id.clone(),
        }
        .to_string(),
        title: format!("Close ticket #{}", ticket.number),
        inputs: vec![reason],
    }
}

fn closer_label(closer: &Closer) -> String {
    match closer {
        Closer::Member(id) => format!("<@{}>", id),
        Closer::Auto => "Automatic (inactivity)".to_string(),
    }
}

/// Embed posted in the channel as closing starts.
pub fn closure_embed(ticket: &ActiveTicket, closer: &Closer, reason: Option<&str>) -> Embed {
    Embed::new(format!("🔒 Ticket #{} closing", ticket.number))
        .with_description(Some("This channel will be deleted shortly.".to_string()))
        .with_color(Some(CLOSE_COLOR))
        .field("Closed by", closer_label(closer), true)
        .field("Reason", reason.unwrap_or("No reason given").to_string(), true)
}

/// Message carrying transcript files to the transcript channel.
pub fn transcript_message(
    ticket: &ActiveTicket,
    closed: Option<(&Closer, Option<&str>)>,
    now: DateTime<Utc>,
) -> OutgoingMessage {
    let mut embed = Embed::new(format!("📜 Transcript: ticket #{}", ticket.number))
        .with_color(Some(INFO_COLOR))
        .with_timestamp(Some(now))
        .field("Category", ticket.category_name.clone(), true)
        .field("Creator", ticket.creator_label(), true)
        .field("Title", ticket.title.clone(), false);
    if let Some((closer, reason)) = closed {
        embed = embed
            .field("Closed by", closer_label(closer), true)
            .field("Reason", reason.unwrap_or("No reason given").to_string(), true);
    }
    OutgoingMessage::embed(embed)
}

/// Rating request sent to the creator after close.
pub fn rating_request(guild_id: u64, closed: &ClosedTicket) -> OutgoingMessage {
    let embed = Embed::new("How did we do?")
        .with_description(Some(format!(
            "Your ticket #{} ({}) was closed. Rate the support you received.",
            closed.ticket.number, closed.ticket.title
        )))
        .with_color(Some(INFO_COLOR));
    let stars = (1..=5u8)
        .map(|stars| {
            Component::button(
                TicketWidget::Rate {
                    guild_id,
                    ticket_id: closed.ticket.id.clone(),
                    stars,
                },
                "⭐".repeat(stars as usize),
                ButtonStyle::Secondary,
            )
        })
        .collect();
    OutgoingMessage::embed(embed).with_row(ActionRow::new(stars))
}

/// Close notice sent to the creator.
pub fn close_notice(closed: &ClosedTicket) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new(format!("Ticket #{} closed", closed.ticket.number))
            .with_description(Some(format!("Your ticket \"{}\" was closed.", closed.ticket.title)))
            .with_color(Some(CLOSE_COLOR))
            .field(
                "Reason",
                closed
                    .close_reason
                    .clone()
                    .unwrap_or_else(|| "No reason given".to_string()),
                false,
            ),
    )
}

/// Notification posted when a ticket is created.
pub fn creation_notice(ticket: &ActiveTicket) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new(format!("🎫 New ticket #{}", ticket.number))
            .with_color(Some(SUCCESS_COLOR))
            .with_timestamp(Some(ticket.created_at))
            .field("Channel", format!("<#{}>", ticket.channel_id), true)
            .field("Category", ticket.category_name.clone(), true)
            .field("Creator", ticket.creator_label(), true)
            .field("Title", ticket.title.clone(), false),
    )
}

/// Notification posted when a ticket is closed.
pub fn closed_notice(closed: &ClosedTicket) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new(format!("🔒 Ticket #{} closed", closed.ticket.number))
            .with_color(Some(ERROR_COLOR))
            .with_timestamp(Some(closed.closed_at))
            .field("Category", closed.ticket.category_name.clone(), true)
            .field("Closed by", closer_label(&closed.closed_by), true)
            .field(
                "Open for",
                format!("{:.1} hours", closed.resolution_time_hours),
                true,
            )
            .field(
                "Reason",
                closed
                    .close_reason
                    .clone()
                    .unwrap_or_else(|| "No reason given".to_string()),
                false,
            ),
    )
}

/// Notice sent to the creator when staff reply.
pub fn reply_notice(ticket: &ActiveTicket, link: String) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new(format!("New reply on ticket #{}", ticket.number))
            .with_description(Some(format!(
                "Staff replied to \"{}\". [Jump to the ticket]({})",
                ticket.title, link
            )))
            .with_color(Some(INFO_COLOR)),
    )
}

/// Claim announcement in the ticket channel.
pub fn claim_notice(ticket: &ActiveTicket, staff_id: u64) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new("🙋 Ticket claimed")
            .with_description(Some(format!(
                "<@{}> is now handling ticket #{}.",
                staff_id, ticket.number
            )))
            .with_color(Some(SUCCESS_COLOR)),
    )
}

/// Rating mirrored to the transcript channel.
pub fn rating_feedback(closed: &ClosedTicket, stars: u8) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new(format!("⭐ Feedback for ticket #{}", closed.ticket.number))
            .with_color(Some(SUCCESS_COLOR))
            .field("Rating", format!("{} ({}/5)", "⭐".repeat(stars as usize), stars), true)
            .field("Creator", closed.ticket.creator_label(), true),
    )
}

/// Survey answers mirrored to the transcript channel.
pub fn survey_feedback(closed: &ClosedTicket, answers: &[SurveyAnswer]) -> OutgoingMessage {
    let mut embed = Embed::new(format!("📝 Survey for ticket #{}", closed.ticket.number))
        .with_color(Some(SUCCESS_COLOR));
    for answer in answers {
        let value = if answer.answer.is_empty() {
            "(no answer)".to_string()
        } else {
            answer.answer.clone()
        };
        embed = embed.field(answer.question.clone(), value, false);
    }
    OutgoingMessage::embed(embed)
}

/// Thank-you after a rating, with the survey button when surveys are on.
pub fn rating_thanks(
    config: &TicketConfig,
    guild_id: u64,
    ticket_id: &str,
    stars: u8,
) -> OutgoingMessage {
    let message = OutgoingMessage::embed(Embed::success(
        "Thanks for your feedback!",
        format!("You rated this ticket {}.", "⭐".repeat(stars as usize)),
    ));
    if config.survey_enabled && !config.survey_questions.is_empty() {
        message.with_row(ActionRow::new(vec![Component::button(
            TicketWidget::Survey {
                guild_id,
                ticket_id: ticket_id.to_string(),
            },
            "Take the survey",
            ButtonStyle::Primary,
        )]))
    } else {
        message
    }
}

/// Survey modal with one paragraph input per question.
pub fn survey_modal(guild_id: u64, ticket_id: &str, questions: &[String]) -> Modal {
    let inputs = questions
        .iter()
        .take(MAX_MODAL_INPUTS)
        .enumerate()
        .map(|(index, question)| {
            let mut input = TextInput::paragraph(format!("q:{}", index), question.chars().take(45).collect::<String>());
            input.required = false;
            input.max_length = Some(1000);
            input
        })
        .collect();
    Modal {
        custom_id: TicketWidget::Survey {
            guild_id,
            ticket_id: ticket_id.to_string(),
        }
        .to_string(),
        title: "Support survey".to_string(),
        inputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_panel_follows_switches() {
        let mut config = TicketConfig::default();
        assert_eq!(control_panel(&config, "t").components.len(), 4);
        config.claim_system = false;
        config.tags_enabled = false;
        let row = control_panel(&config, "t");
        let ids: Vec<&str> = row.components.iter().filter_map(Component::custom_id).collect();
        assert_eq!(ids, vec!["ticket:close:t", "ticket:transcript:t"]);
    }

    #[test]
    fn test_picker_hides_toggle_unless_anonymous_allowed() {
        let mut config = TicketConfig::default();
        assert_eq!(category_picker(&config, "s", false).components.len(), 1);
        config.allow_anonymous = true;
        let picker = category_picker(&config, "s", true);
        assert_eq!(picker.custom_ids(), vec!["ticket:category:s", "ticket:anon:s"]);
    }

    #[test]
    fn test_categories_ordered_by_priority() {
        let mut config = TicketConfig::default();
        let mut urgent = TicketCategory::new("Urgent", "");
        urgent.priority_level = 5;
        config.categories.push(urgent);
        let names: Vec<&str> = ordered_categories(&config)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Urgent", "General Support"]);
    }

    #[test]
    fn test_rating_request_has_five_stars() {
        let ticket = crate::tests_support::active_ticket("abc", 3);
        let closed = ClosedTicket::from_active(ticket, Utc::now(), Closer::Auto, None, None);
        let message = rating_request(7, &closed);
        assert_eq!(message.custom_ids().len(), 5);
        assert_eq!(message.custom_ids()[4], "ticket:rate:7:abc:5");
    }
}
