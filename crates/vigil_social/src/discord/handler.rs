//! Gateway event routing.

use super::convert;
use crate::{AdminCommands, CommandContext, CommandReply, Invocation, Subsystem, tokenize};
use async_trait::async_trait;
use serenity::all::{
    Command, CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    EventHandler, GatewayIntents, GuildId, Interaction, Message, Ready, RoleId, User,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use vigil_core::MemberInfo;
use vigil_error::{CommandError, CommandErrorKind};
use vigil_interface::{ChatPlatform, InteractionResponse};
use vigil_scan::ScanInteractions;
use vigil_ticket::TicketInteractions;

/// Gateway intents the handler needs.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Serenity event handler for Vigil.
///
/// Text messages go to the command router first, then to ticket activity
/// tracking and scan upload/auto-scan. Component and modal interactions are
/// offered to the ticket router and then the scan router; each ignores
/// routing ids it does not own.
pub struct VigilHandler {
    platform: Arc<dyn ChatPlatform>,
    commands: AdminCommands,
    tickets: Option<TicketInteractions>,
    scans: Option<ScanInteractions>,
}

impl VigilHandler {
    /// Handler delivering replies through `platform`.
    pub fn new(platform: Arc<dyn ChatPlatform>, commands: AdminCommands) -> Self {
        Self {
            platform,
            commands,
            tickets: None,
            scans: None,
        }
    }

    /// Route ticket widgets and activity.
    pub fn with_tickets(mut self, tickets: TicketInteractions) -> Self {
        self.tickets = Some(tickets);
        self
    }

    /// Route scan widgets and uploads.
    pub fn with_scans(mut self, scans: ScanInteractions) -> Self {
        self.scans = Some(scans);
        self
    }

    async fn deliver_command_reply(&self, msg: &Message, reply: CommandReply) {
        let channel_id = msg.channel_id.get();
        if reply.delete_source
            && let Err(e) = self.platform.delete_message(channel_id, msg.id.get()).await
        {
            warn!(error = %e, "Could not delete command message");
        }
        if let Err(e) = self.platform.send_message(channel_id, &reply.message).await {
            warn!(error = %e, "Could not send command reply");
        }
    }

    #[instrument(skip(self, ctx, command), fields(name = %command.data.name))]
    async fn run_slash_command(&self, ctx: &Context, command: &CommandInteraction) {
        let member = convert::interaction_member(command.member.as_deref(), &command.user);
        let reply = match (command.guild_id, command.data.name.parse::<Subsystem>()) {
            (Some(guild_id), Ok(subsystem)) => {
                let args = command
                    .data
                    .options
                    .iter()
                    .find(|o| o.name == "args")
                    .and_then(|o| o.value.as_str())
                    .unwrap_or("");
                let invocation = Invocation {
                    subsystem,
                    words: tokenize(args),
                };
                let command_ctx =
                    CommandContext::new(guild_id.get(), command.channel_id.get(), member);
                self.commands.execute(&command_ctx, invocation).await
            }
            (None, _) => {
                CommandReply::failure(&CommandError::new(CommandErrorKind::NotInGuild))
            }
            (_, Err(_)) => {
                debug!("Not one of our commands");
                return;
            }
        };
        let response = InteractionResponse::Message {
            message: reply.message,
            ephemeral: true,
        };
        if let Err(e) = command
            .create_response(&ctx.http, convert::interaction_response(&response))
            .await
        {
            warn!(error = %e, "Could not answer slash command");
        }
    }

    /// Resolve a message author's administrator flag for text commands.
    ///
    /// Messages carry roles but not computed permissions, so the guild's
    /// roles and owner are looked up.
    async fn resolve_admin(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        author: &User,
        member: MemberInfo,
    ) -> MemberInfo {
        let guild = match guild_id.to_partial_guild(&ctx.http).await {
            Ok(guild) => guild,
            Err(e) => {
                warn!(error = %e, "Could not load guild to check permissions");
                return member;
            }
        };
        if guild.owner_id == author.id {
            return member.with_is_administrator(true);
        }
        let everyone = guild.roles.get(&RoleId::new(guild_id.get()));
        let admin = everyone.is_some_and(|r| r.permissions.administrator())
            || member.role_ids().iter().any(|id| {
                guild
                    .roles
                    .get(&RoleId::new(*id))
                    .is_some_and(|r| r.permissions.administrator())
            });
        member.with_is_administrator(admin)
    }
}

fn slash_command(subsystem: Subsystem, description: &str) -> CreateCommand {
    CreateCommand::new(subsystem.as_ref())
        .description(description)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "args", "Subcommand and arguments")
                .required(false),
        )
}

#[async_trait]
impl EventHandler for VigilHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Gateway ready");
        let commands = vec![
            slash_command(Subsystem::Ticket, "Configure the ticket system"),
            slash_command(Subsystem::Scan, "Configure file scanning"),
        ];
        match Command::set_global_commands(&ctx.http, commands).await {
            Ok(registered) => info!(count = registered.len(), "Slash commands registered"),
            Err(e) => error!(error = %e, "Slash command registration failed"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let mut incoming = convert::incoming_message(&msg);

        if self.commands.parse(&incoming.content).is_some() {
            if let Some(guild_id) = msg.guild_id {
                incoming.author = self
                    .resolve_admin(&ctx, guild_id, &msg.author, incoming.author)
                    .await;
            }
            if let Some(reply) = self.commands.handle_message(&incoming).await {
                self.deliver_command_reply(&msg, reply).await;
            }
            return;
        }

        if let Some(tickets) = &self.tickets {
            tickets.handle_message(&incoming).await;
        }
        if let Some(scans) = &self.scans {
            scans.handle_message(&incoming).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) => {
                let event = convert::component_interaction(&component);
                let mut response = None;
                if let Some(tickets) = &self.tickets {
                    response = tickets.handle_component(&event).await;
                }
                if response.is_none()
                    && let Some(scans) = &self.scans
                {
                    response = scans.handle_component(&event).await;
                }
                let response = response.unwrap_or_else(|| {
                    debug!(custom_id = %event.custom_id, "Unrouted component");
                    InteractionResponse::Acknowledge
                });
                if let Err(e) = component
                    .create_response(&ctx.http, convert::interaction_response(&response))
                    .await
                {
                    warn!(error = %e, "Could not answer component");
                }
            }
            Interaction::Modal(modal) => {
                let event = convert::modal_submission(&modal);
                let response = match &self.tickets {
                    Some(tickets) => tickets.handle_modal(&event).await,
                    None => None,
                }
                .unwrap_or(InteractionResponse::Acknowledge);
                if let Err(e) = modal
                    .create_response(&ctx.http, convert::interaction_response(&response))
                    .await
                {
                    warn!(error = %e, "Could not answer modal");
                }
            }
            Interaction::Command(command) => self.run_slash_command(&ctx, &command).await,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents_include_message_content() {
        let intents = intents();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents.contains(GatewayIntents::GUILD_MESSAGES));
    }
}
