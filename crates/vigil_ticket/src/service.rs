//! Ticket core: shared state plus creation and panel posting.

use crate::access::ticket_overwrites;
use crate::views;
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use vigil_core::{
    ActiveTicket, ButtonStyle, Clock, GuildConfig, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN,
    MemberInfo, TicketCategory, TicketConfig,
};
use vigil_error::{TicketError, TicketErrorKind, TicketResult};
use vigil_interface::{ChatPlatform, NewChannel};
use vigil_rate_limit::CooldownTracker;
use vigil_storage::ConfigStore;

/// Stands in for `{user}` in channel names of anonymous tickets.
pub const ANONYMOUS_CHANNEL_LABEL: &str = "anonymous";

/// Everything needed to open a ticket.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct CreateTicketRequest {
    /// Guild
    pub guild_id: u64,
    /// Member opening the ticket
    pub requester: MemberInfo,
    /// Category name, matched case-insensitively
    #[new(into)]
    pub category: String,
    /// Title
    #[new(into)]
    pub title: String,
    /// Description
    #[new(into)]
    pub description: String,
    /// Custom field values by field name
    #[new(default)]
    pub custom_fields: BTreeMap<String, String>,
    /// Hide the creator from staff
    #[new(default)]
    pub anonymous: bool,
}

/// The ticket subsystem.
///
/// Every operation runs its read-modify-write against one guild under that
/// guild's lock from [`ConfigStore::guild`]. Mutations go through
/// [`commit`](Self::commit), so memory never runs ahead of disk.
pub struct TicketCore {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownTracker,
    pub(crate) closing: Mutex<HashSet<(u64, String)>>,
    enabled: bool,
}

impl std::fmt::Debug for TicketCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketCore")
            .field("enabled", &self.enabled)
            .field("closing", &self.closing.lock().len())
            .finish_non_exhaustive()
    }
}

impl TicketCore {
    /// Core over the given platform, store and clock.
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<ConfigStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            platform,
            store,
            cooldowns: CooldownTracker::new(Arc::clone(&clock)),
            clock,
            closing: Mutex::new(HashSet::new()),
            enabled: true,
        }
    }

    /// Set the process-wide switch. A disabled core refuses new tickets in
    /// every guild.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Process-wide switch.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Chat platform.
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Guild configuration store.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of a guild's ticket configuration, records included.
    pub async fn config(&self, guild_id: u64) -> TicketResult<TicketConfig> {
        Ok(self.store.get(guild_id).await?.ticket)
    }

    /// Apply `f` to a copy of the guild, persist the copy, then swap it in.
    ///
    /// If `f` fails or the write fails, the guild is left untouched.
    pub(crate) async fn commit<R>(
        &self,
        guild: &mut GuildConfig,
        f: impl FnOnce(&mut TicketConfig) -> TicketResult<R>,
    ) -> TicketResult<R> {
        let mut next = guild.clone();
        let value = f(&mut next.ticket)?;
        if let Err(e) = self.store.save(&next).await {
            error!(guild_id = guild.guild_id, error = %e, "Failed to persist ticket state");
            return Err(e.into());
        }
        *guild = next;
        Ok(value)
    }

    /// Settings without the ticket records, for work done outside the lock.
    pub(crate) fn settings_of(config: &mut TicketConfig) -> TicketConfig {
        let active = std::mem::take(&mut config.active_tickets);
        let closed = std::mem::take(&mut config.closed_tickets);
        let settings = config.clone();
        config.active_tickets = active;
        config.closed_tickets = closed;
        settings
    }

    /// Gates every creation path checks, in order: enabled, blacklist,
    /// cooldown, open ticket limit.
    fn check_gates(
        &self,
        config: &TicketConfig,
        guild_id: u64,
        member: &MemberInfo,
    ) -> TicketResult<()> {
        let user_id = *member.user_id();
        if !self.enabled || !config.enabled {
            debug!(guild_id, "Ticket system disabled");
            return Err(TicketError::new(TicketErrorKind::Disabled));
        }
        if config.blacklisted_user_ids.contains(&user_id) {
            debug!(guild_id, user_id, "Blacklisted user refused");
            return Err(TicketError::new(TicketErrorKind::Blacklisted));
        }
        let cooldown = Duration::seconds(config.ticket_cooldown_secs as i64);
        if let Some(remaining) = self.cooldowns.remaining(&(guild_id, user_id), cooldown) {
            let retry_after_secs = ((remaining.num_milliseconds() + 999) / 1000).max(1) as u64;
            debug!(guild_id, user_id, retry_after_secs, "Creation cooldown active");
            return Err(TicketError::new(TicketErrorKind::RateLimited { retry_after_secs }));
        }
        let limit = config.max_open_tickets_per_user;
        if config.open_count(user_id) >= limit as usize {
            debug!(guild_id, user_id, limit, "Open ticket limit reached");
            return Err(TicketError::new(TicketErrorKind::MaxOpenReached { limit }));
        }
        Ok(())
    }

    /// Run the creation gates without creating anything.
    ///
    /// Used when the panel is clicked so refused users never see the form.
    pub async fn check_can_open(&self, guild_id: u64, member: &MemberInfo) -> TicketResult<()> {
        let handle = self.store.guild(guild_id).await?;
        let guild = handle.lock().await;
        self.check_gates(&guild.ticket, guild_id, member)
    }

    /// Post the ticket panel in `channel_id`.
    ///
    /// A previous panel message is deleted. Returns the new message id.
    #[instrument(skip(self))]
    pub async fn open_panel(
        &self,
        guild_id: u64,
        channel_id: u64,
        style: Option<ButtonStyle>,
    ) -> TicketResult<u64> {
        let handle = self.store.guild(guild_id).await?;
        let mut guild = handle.lock().await;
        let style = style.unwrap_or(guild.ticket.panel.button_style);
        let message = views::panel_message(&guild.ticket, style);
        let message_id = self
            .platform
            .send_message(channel_id, &message)
            .await
            .map_err(|e| TicketError::new(TicketErrorKind::CreationFailed(e.kind.to_string())))?;

        if let (Some(old_channel), Some(old_message)) =
            (guild.ticket.panel_channel_id, guild.ticket.panel_message_id)
            && let Err(e) = self.platform.delete_message(old_channel, old_message).await
        {
            warn!(error = %e, "Could not delete previous panel");
        }

        self.commit(&mut guild, |config| {
            config.panel_channel_id = Some(channel_id);
            config.panel_message_id = Some(message_id);
            Ok(())
        })
        .await?;
        info!(message_id, "Ticket panel posted");
        Ok(message_id)
    }

    /// Open a ticket.
    ///
    /// Gates run in order (enabled, blacklist, cooldown, open limit, category,
    /// role, input) and the first failure is returned. The guild lock is held
    /// from the gates through channel creation and insertion.
    #[instrument(
        skip(self, request),
        fields(
            guild_id = request.guild_id,
            user_id = *request.requester.user_id(),
            category = %request.category
        )
    )]
    pub async fn create_ticket(&self, request: CreateTicketRequest) -> TicketResult<ActiveTicket> {
        let guild_id = request.guild_id;
        let user_id = *request.requester.user_id();
        let handle = self.store.guild(guild_id).await?;
        let mut guild = handle.lock().await;

        self.check_gates(&guild.ticket, guild_id, &request.requester)?;
        let category = guild
            .ticket
            .category(&request.category)
            .cloned()
            .ok_or_else(|| {
                TicketError::new(TicketErrorKind::CategoryNotFound(request.category.clone()))
            })?;
        if !category.required_roles.is_empty()
            && !request.requester.has_any_role(&category.required_roles)
        {
            return Err(TicketError::new(TicketErrorKind::MissingRole {
                category: category.name.clone(),
            }));
        }
        validate_request(&guild.ticket, &category, &request)?;

        let number = guild.ticket.ticket_counter + 1;
        let now = self.clock.now();
        // `{user}` in the naming format must not leak an anonymous creator.
        let name_label = if request.anonymous {
            ANONYMOUS_CHANNEL_LABEL
        } else {
            request.requester.display_name().as_str()
        };
        let mut ticket = ActiveTicket {
            id: uuid::Uuid::new_v4().to_string(),
            number,
            channel_id: 0,
            channel_name: guild.ticket.channel_name(number, name_label),
            creator_id: user_id,
            category_name: category.name.clone(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            is_anonymous: request.anonymous,
            created_at: now,
            last_activity: now,
            custom_field_values: request.custom_fields.clone(),
            tags: category.auto_tags.clone(),
            claimed_by: None,
            claimed_at: None,
            first_response_at: None,
            response_time_hours: None,
        };

        let new_channel = NewChannel {
            name: ticket.channel_name.clone(),
            parent_id: guild.ticket.parent_category_id,
            topic: Some(ticket.topic()),
            overwrites: ticket_overwrites(
                &guild.ticket,
                self.platform.bot_user_id(),
                user_id,
                request.anonymous,
            ),
        };
        ticket.channel_id = match self.platform.create_channel(guild_id, &new_channel).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Ticket channel creation failed");
                return Err(TicketError::new(TicketErrorKind::CreationFailed(
                    e.kind.to_string(),
                )));
            }
        };

        let inserted = ticket.clone();
        let committed = self
            .commit(&mut guild, move |config| {
                config.ticket_counter = number;
                config.stats.record_created(&inserted.category_name);
                config.active_tickets.insert(inserted.id.clone(), inserted);
                Ok(())
            })
            .await;
        if let Err(e) = committed {
            if let Err(cleanup) = self.platform.delete_channel(ticket.channel_id).await {
                warn!(error = %cleanup, "Could not remove orphaned ticket channel");
            }
            return Err(e);
        }
        self.cooldowns.record((guild_id, user_id));

        let welcome = views::welcome_message(&guild.ticket, &ticket, &category);
        let pin = guild.ticket.pin_welcome;
        let notify = guild.ticket.creation_notification_channel;
        drop(guild);

        match self.platform.send_message(ticket.channel_id, &welcome).await {
            Ok(message_id) if pin => {
                if let Err(e) = self.platform.pin_message(ticket.channel_id, message_id).await {
                    warn!(error = %e, "Could not pin welcome message");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not post welcome message"),
        }
        if let Some(channel) = notify
            && let Err(e) = self
                .platform
                .send_message(channel, &views::creation_notice(&ticket))
                .await
        {
            warn!(error = %e, "Could not post creation notification");
        }

        info!(
            number = ticket.number,
            channel_id = ticket.channel_id,
            anonymous = ticket.is_anonymous,
            "Ticket created"
        );
        Ok(ticket)
    }
}

fn validate_request(
    config: &TicketConfig,
    category: &TicketCategory,
    request: &CreateTicketRequest,
) -> TicketResult<()> {
    let invalid = |msg: String| Err(TicketError::new(TicketErrorKind::InvalidInput(msg)));

    let title = request.title.trim();
    if title.is_empty() {
        return invalid("a title is required".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return invalid(format!("the title is limited to {} characters", MAX_TITLE_LEN));
    }
    if request.description.trim().chars().count() > MAX_DESCRIPTION_LEN {
        return invalid(format!(
            "the description is limited to {} characters",
            MAX_DESCRIPTION_LEN
        ));
    }
    for name in request.custom_fields.keys() {
        if !category.custom_fields.iter().any(|f| &f.name == name) {
            return invalid(format!("unknown field '{}'", name));
        }
    }
    for field in &category.custom_fields {
        let value = request
            .custom_fields
            .get(&field.name)
            .map(|v| v.trim())
            .unwrap_or("");
        if field.required && value.is_empty() {
            return invalid(format!("'{}' is required", field.name));
        }
        if value.chars().count() > field.max_length as usize {
            return invalid(format!(
                "'{}' is limited to {} characters",
                field.name, field.max_length
            ));
        }
    }
    if request.anonymous && !config.allow_anonymous {
        return invalid("anonymous tickets are not allowed in this server".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::CustomField;

    fn request(title: &str) -> CreateTicketRequest {
        CreateTicketRequest::new(1, MemberInfo::new(42, "alice"), "Bug", title, "")
    }

    fn bug_category() -> TicketCategory {
        let mut category = TicketCategory::new("Bug", "");
        let mut version = CustomField::new("Version");
        version.required = true;
        version.max_length = 5;
        category.custom_fields.push(version);
        category
    }

    #[test]
    fn test_validation_checks_each_input() {
        let config = TicketConfig::default();
        let category = bug_category();

        let err = validate_request(&config, &category, &request("  ")).unwrap_err();
        assert!(matches!(err.kind, TicketErrorKind::InvalidInput(_)));

        let err = validate_request(&config, &category, &request(&"x".repeat(101))).unwrap_err();
        assert!(matches!(err.kind, TicketErrorKind::InvalidInput(_)));

        let err = validate_request(&config, &category, &request("Crash")).unwrap_err();
        assert_eq!(
            err.kind,
            TicketErrorKind::InvalidInput("'Version' is required".to_string())
        );

        let mut ok = request("Crash");
        ok.custom_fields.insert("Version".into(), "1.2".into());
        assert!(validate_request(&config, &category, &ok).is_ok());

        ok.custom_fields.insert("Version".into(), "1.2.345".into());
        assert!(validate_request(&config, &category, &ok).is_err());
    }

    #[test]
    fn test_anonymous_needs_guild_permission() {
        let mut config = TicketConfig::default();
        let category = TicketCategory::new("Bug", "");
        let mut anonymous = request("Crash");
        anonymous.anonymous = true;
        assert!(validate_request(&config, &category, &anonymous).is_err());
        config.allow_anonymous = true;
        assert!(validate_request(&config, &category, &anonymous).is_ok());
    }

    #[test]
    fn test_settings_snapshot_leaves_records_in_place() {
        let mut config = TicketConfig::default();
        config
            .active_tickets
            .insert("a".into(), crate::tests_support::active_ticket("a", 1));
        let settings = TicketCore::settings_of(&mut config);
        assert!(settings.active_tickets.is_empty());
        assert_eq!(config.active_tickets.len(), 1);
    }
}
