//! Close, claim, tags, activity and on-demand transcripts.

use crate::access::is_staff;
use crate::transcript::build_transcript;
use crate::{TicketCore, views};
use tracing::{debug, info, instrument, warn};
use vigil_core::{
    ActiveTicket, ClosedTicket, Closer, MAX_CLOSED_TICKETS, MemberInfo, TicketConfig,
    hours_between,
};
use vigil_error::{TicketError, TicketErrorKind, TicketResult};
use vigil_interface::IncomingMessage;

/// Who is closing a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseActor {
    /// A guild member, checked against staff roles and the creator
    Member(MemberInfo),
    /// The inactivity reaper
    Auto,
}

impl CloseActor {
    /// Persisted closer value.
    pub fn closer(&self) -> Closer {
        match self {
            CloseActor::Member(member) => Closer::Member(*member.user_id()),
            CloseActor::Auto => Closer::Auto,
        }
    }
}

fn no_such_ticket(ticket_id: &str) -> TicketError {
    TicketError::new(TicketErrorKind::NoSuchTicket(ticket_id.to_string()))
}

/// Whether `member` may close `ticket`: staff always, the creator when
/// `allow_user_close` is set.
pub fn authorize_close(
    config: &TicketConfig,
    ticket: &ActiveTicket,
    member: &MemberInfo,
) -> TicketResult<()> {
    let creator = *member.user_id() == ticket.creator_id && config.allow_user_close;
    if is_staff(config, member) || creator {
        Ok(())
    } else {
        Err(TicketError::new(TicketErrorKind::PermissionDenied(
            "only staff or the ticket creator can close this ticket".to_string(),
        )))
    }
}

impl TicketCore {
    fn is_closing(&self, guild_id: u64, ticket_id: &str) -> bool {
        self.closing
            .lock()
            .contains(&(guild_id, ticket_id.to_string()))
    }

    /// Close a ticket.
    ///
    /// The ticket is marked closing under the guild lock, channel I/O runs
    /// outside it, and the move from active to closed happens under the lock
    /// again. Only that move and its write can fail the call; the closure
    /// embed, transcript, DMs, notification and channel deletion are logged
    /// on failure and skipped.
    ///
    /// A ticket already closing or closed yields `NoSuchTicket`. An
    /// [`CloseActor::Auto`] close of a ticket that is no longer idle yields
    /// `NotIdle` and changes nothing.
    #[instrument(skip(self, actor, reason), fields(closer = %actor.closer()))]
    pub async fn close_ticket(
        &self,
        guild_id: u64,
        ticket_id: &str,
        actor: CloseActor,
        reason: Option<String>,
    ) -> TicketResult<ClosedTicket> {
        let closer = actor.closer();
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let handle = self.store().guild(guild_id).await?;
        let key = (guild_id, ticket_id.to_string());

        let (ticket, settings) = {
            let mut guild = handle.lock().await;
            let ticket = guild
                .ticket
                .active_tickets
                .get(ticket_id)
                .cloned()
                .ok_or_else(|| no_such_ticket(ticket_id))?;
            if self.is_closing(guild_id, ticket_id) {
                debug!("Close already in progress");
                return Err(no_such_ticket(ticket_id));
            }
            match &actor {
                CloseActor::Member(member) => {
                    authorize_close(&guild.ticket, &ticket, member)?;
                    if guild.ticket.require_reason_to_close && reason.is_none() {
                        return Err(TicketError::new(TicketErrorKind::ReasonRequired));
                    }
                }
                CloseActor::Auto => {
                    // The reaper picked this ticket earlier; activity may have
                    // landed while it was closing others.
                    let hours = guild.ticket.auto_close_hours;
                    if hours == 0 || ticket.idle_hours(self.clock().now()) < hours as f64 {
                        debug!(hours, "Ticket no longer idle");
                        return Err(TicketError::new(TicketErrorKind::NotIdle { hours }));
                    }
                }
            }
            self.closing.lock().insert(key.clone());
            (ticket, Self::settings_of(&mut guild.ticket))
        };
        info!(number = ticket.number, "Closing ticket");

        let closure = views::closure_embed(&ticket, &closer, reason.as_deref());
        if let Err(e) = self
            .platform()
            .send_message(ticket.channel_id, &vigil_interface::OutgoingMessage::embed(closure))
            .await
        {
            warn!(error = %e, "Could not post closure embed");
        }
        let transcript_message_id = self
            .deliver_transcript(guild_id, &ticket, &settings, Some((&closer, reason.as_deref())))
            .await
            .map_err(|e| warn!(error = %e, "Transcript skipped"))
            .ok()
            .flatten();

        let closed = {
            let mut guild = handle.lock().await;
            let now = self.clock().now();
            let result = self
                .commit(&mut guild, |config| {
                    let active = config
                        .active_tickets
                        .remove(ticket_id)
                        .ok_or_else(|| no_such_ticket(ticket_id))?;
                    let closed = ClosedTicket::from_active(
                        active,
                        now,
                        closer,
                        reason.clone(),
                        transcript_message_id,
                    );
                    config
                        .stats
                        .record_closed(&closed.ticket.category_name, closed.resolution_time_hours);
                    config
                        .closed_tickets
                        .insert(closed.ticket.id.clone(), closed.clone());
                    let trimmed = config.trim_closed(MAX_CLOSED_TICKETS);
                    if trimmed > 0 {
                        debug!(trimmed, "Dropped oldest closed tickets");
                    }
                    Ok(closed)
                })
                .await;
            self.closing.lock().remove(&key);
            result?
        };

        if !closed.ticket.is_anonymous {
            if settings.rating_system
                && let Err(e) = self
                    .platform()
                    .send_direct_message(
                        closed.ticket.creator_id,
                        &views::rating_request(guild_id, &closed),
                    )
                    .await
            {
                warn!(error = %e, "Could not send rating request");
            }
            if settings.dm_on_close
                && let Err(e) = self
                    .platform()
                    .send_direct_message(closed.ticket.creator_id, &views::close_notice(&closed))
                    .await
            {
                warn!(error = %e, "Could not send close notice");
            }
        }
        if let Some(channel) = settings.close_notification_channel
            && let Err(e) = self
                .platform()
                .send_message(channel, &views::closed_notice(&closed))
                .await
        {
            warn!(error = %e, "Could not post close notification");
        }
        if let Err(e) = self.platform().delete_channel(closed.ticket.channel_id).await {
            let err = TicketError::new(TicketErrorKind::ChannelDeletionFailed(e.kind.to_string()));
            warn!(error = %err, "Ticket channel left behind");
        }

        info!(
            number = closed.ticket.number,
            resolution_hours = closed.resolution_time_hours,
            "Ticket closed"
        );
        Ok(closed)
    }

    /// Render and post a transcript to the transcript channel.
    ///
    /// Returns `Ok(None)` when no transcript channel is configured.
    async fn deliver_transcript(
        &self,
        guild_id: u64,
        ticket: &ActiveTicket,
        settings: &TicketConfig,
        closed: Option<(&Closer, Option<&str>)>,
    ) -> TicketResult<Option<u64>> {
        let Some(channel) = settings.transcript_channel_id else {
            debug!("No transcript channel configured");
            return Ok(None);
        };
        let history = self
            .platform()
            .channel_history(ticket.channel_id)
            .await
            .map_err(|e| {
                TicketError::new(TicketErrorKind::TranscriptGenerationFailed(e.kind.to_string()))
            })?;
        let now = self.clock().now();
        let files = build_transcript(settings, &ticket.channel_name, guild_id, &history, now)?;
        let mut message = views::transcript_message(ticket, closed, now);
        message.files = files;
        let message_id = self
            .platform()
            .send_message(channel, &message)
            .await
            .map_err(|e| {
                TicketError::new(TicketErrorKind::TranscriptDeliveryFailed(e.kind.to_string()))
            })?;
        debug!(message_id, messages = history.len(), "Transcript delivered");
        Ok(Some(message_id))
    }

    /// Post a transcript of an open ticket on request of staff.
    #[instrument(skip(self, requester))]
    pub async fn send_transcript(
        &self,
        guild_id: u64,
        ticket_id: &str,
        requester: &MemberInfo,
    ) -> TicketResult<u64> {
        let handle = self.store().guild(guild_id).await?;
        let (ticket, settings) = {
            let mut guild = handle.lock().await;
            if !is_staff(&guild.ticket, requester) {
                return Err(TicketError::new(TicketErrorKind::PermissionDenied(
                    "only staff can request transcripts".to_string(),
                )));
            }
            let ticket = guild
                .ticket
                .active_tickets
                .get(ticket_id)
                .cloned()
                .ok_or_else(|| no_such_ticket(ticket_id))?;
            (ticket, Self::settings_of(&mut guild.ticket))
        };
        self.deliver_transcript(guild_id, &ticket, &settings, None)
            .await?
            .ok_or_else(|| {
                TicketError::new(TicketErrorKind::TranscriptDeliveryFailed(
                    "no transcript channel is configured".to_string(),
                ))
            })
    }

    /// Claim a ticket for `staff`.
    ///
    /// Re-claiming one's own ticket is a no-op.
    #[instrument(skip(self, staff), fields(staff_id = *staff.user_id()))]
    pub async fn claim_ticket(
        &self,
        guild_id: u64,
        ticket_id: &str,
        staff: &MemberInfo,
    ) -> TicketResult<ActiveTicket> {
        let staff_id = *staff.user_id();
        let handle = self.store().guild(guild_id).await?;
        let mut guild = handle.lock().await;
        if !guild.ticket.claim_system {
            return Err(TicketError::new(TicketErrorKind::ClaimDisabled));
        }
        if !is_staff(&guild.ticket, staff) {
            return Err(TicketError::new(TicketErrorKind::PermissionDenied(
                "only staff can claim tickets".to_string(),
            )));
        }
        if self.is_closing(guild_id, ticket_id) {
            return Err(no_such_ticket(ticket_id));
        }
        let current = guild
            .ticket
            .active_tickets
            .get(ticket_id)
            .ok_or_else(|| no_such_ticket(ticket_id))?;
        match current.claimed_by {
            Some(holder) if holder == staff_id => {
                debug!("Already claimed by the same member");
                return Ok(current.clone());
            }
            Some(holder) => {
                return Err(TicketError::new(TicketErrorKind::AlreadyClaimed {
                    claimed_by: holder,
                }));
            }
            None => {}
        }

        let now = self.clock().now();
        let ticket = self
            .commit(&mut guild, |config| {
                let ticket = config
                    .active_tickets
                    .get_mut(ticket_id)
                    .ok_or_else(|| no_such_ticket(ticket_id))?;
                ticket.claimed_by = Some(staff_id);
                ticket.claimed_at = Some(now);
                Ok(ticket.clone())
            })
            .await?;
        drop(guild);

        if let Err(e) = self
            .platform()
            .send_message(ticket.channel_id, &views::claim_notice(&ticket, staff_id))
            .await
        {
            warn!(error = %e, "Could not announce claim");
        }
        info!(number = ticket.number, "Ticket claimed");
        Ok(ticket)
    }

    /// Apply a tag.
    pub async fn add_tag(
        &self,
        guild_id: u64,
        ticket_id: &str,
        staff: &MemberInfo,
        tag: &str,
    ) -> TicketResult<ActiveTicket> {
        self.update_tag(guild_id, ticket_id, staff, tag, true).await
    }

    /// Remove a tag.
    pub async fn remove_tag(
        &self,
        guild_id: u64,
        ticket_id: &str,
        staff: &MemberInfo,
        tag: &str,
    ) -> TicketResult<ActiveTicket> {
        self.update_tag(guild_id, ticket_id, staff, tag, false).await
    }

    #[instrument(skip(self, staff))]
    async fn update_tag(
        &self,
        guild_id: u64,
        ticket_id: &str,
        staff: &MemberInfo,
        tag: &str,
        add: bool,
    ) -> TicketResult<ActiveTicket> {
        let tag = tag.trim().to_lowercase();
        let handle = self.store().guild(guild_id).await?;
        let mut guild = handle.lock().await;
        if !guild.ticket.tags_enabled {
            return Err(TicketError::new(TicketErrorKind::TagsDisabled));
        }
        if !is_staff(&guild.ticket, staff) {
            return Err(TicketError::new(TicketErrorKind::PermissionDenied(
                "only staff can tag tickets".to_string(),
            )));
        }
        if self.is_closing(guild_id, ticket_id) {
            return Err(no_such_ticket(ticket_id));
        }

        let ticket = self
            .commit(&mut guild, |config| {
                let available = config.available_tags.contains(&tag);
                let ticket = config
                    .active_tickets
                    .get_mut(ticket_id)
                    .ok_or_else(|| no_such_ticket(ticket_id))?;
                if add {
                    if !available {
                        return Err(TicketError::new(TicketErrorKind::TagUnavailable(
                            tag.clone(),
                        )));
                    }
                    ticket.tags.insert(tag.clone());
                } else {
                    if !available && !ticket.tags.contains(&tag) {
                        return Err(TicketError::new(TicketErrorKind::TagUnavailable(
                            tag.clone(),
                        )));
                    }
                    ticket.tags.remove(&tag);
                }
                Ok(ticket.clone())
            })
            .await?;
        drop(guild);

        if let Err(e) = self
            .platform()
            .set_channel_topic(ticket.channel_id, &ticket.topic())
            .await
        {
            warn!(error = %e, "Could not update channel topic");
        }
        debug!(tag = %tag, add, "Tags updated");
        Ok(ticket)
    }

    /// Record a message posted in a ticket channel.
    ///
    /// Bumps `last_activity`; the first staff message from someone other
    /// than the creator also records the response time. Returns whether the
    /// message belonged to an open ticket. Guilds not yet loaded are ignored,
    /// so this never creates configuration for unrelated guilds.
    #[instrument(skip(self, message), fields(channel_id = message.channel_id))]
    pub async fn record_activity(&self, message: &IncomingMessage) -> TicketResult<bool> {
        if *message.author.is_bot() {
            return Ok(false);
        }
        let Some(guild_id) = message.guild_id else {
            return Ok(false);
        };
        let Some(handle) = self.store().loaded(guild_id).await else {
            return Ok(false);
        };
        let author_id = *message.author.user_id();
        let mut guild = handle.lock().await;
        let Some(ticket) = guild.ticket.ticket_by_channel(message.channel_id).cloned() else {
            return Ok(false);
        };
        if self.is_closing(guild_id, &ticket.id) {
            return Ok(false);
        }

        let staff_reply = is_staff(&guild.ticket, &message.author) && author_id != ticket.creator_id;
        let first_response = staff_reply && ticket.first_response_at.is_none();
        let now = self.clock().now();
        let notify = staff_reply && guild.ticket.dm_on_reply && !ticket.is_anonymous;

        self.commit(&mut guild, |config| {
            let Some(active) = config.active_tickets.get_mut(&ticket.id) else {
                return Ok(());
            };
            if now > active.last_activity {
                active.last_activity = now;
            }
            if first_response {
                let hours = hours_between(active.created_at, now);
                active.first_response_at = Some(now);
                active.response_time_hours = Some(hours);
                config.stats.record_response(hours);
            }
            Ok(())
        })
        .await?;
        drop(guild);

        if first_response {
            info!(number = ticket.number, "First staff response recorded");
        }
        if notify {
            let link =
                self.platform()
                    .message_link(guild_id, message.channel_id, message.message_id);
            if let Err(e) = self
                .platform()
                .send_direct_message(ticket.creator_id, &views::reply_notice(&ticket, link))
                .await
            {
                warn!(error = %e, "Could not notify creator of reply");
            }
        }
        Ok(true)
    }
}
