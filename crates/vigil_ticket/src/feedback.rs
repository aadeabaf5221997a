//! Ratings and surveys on closed tickets.

use crate::{TicketCore, views};
use tracing::{info, instrument, warn};
use vigil_core::{ClosedTicket, MAX_SURVEY_QUESTIONS, SurveyAnswer, TicketConfig};
use vigil_error::{TicketError, TicketErrorKind, TicketResult};
use vigil_interface::OutgoingMessage;

fn closed_for_creator<'a>(
    config: &'a mut TicketConfig,
    ticket_id: &str,
    rater_id: u64,
) -> TicketResult<&'a mut ClosedTicket> {
    let closed = config
        .closed_tickets
        .get_mut(ticket_id)
        .ok_or_else(|| TicketError::new(TicketErrorKind::NoSuchTicket(ticket_id.to_string())))?;
    if closed.ticket.creator_id != rater_id {
        return Err(TicketError::new(TicketErrorKind::PermissionDenied(
            "only the ticket creator can leave feedback".to_string(),
        )));
    }
    Ok(closed)
}

impl TicketCore {
    /// Store the creator's star rating on a closed ticket.
    #[instrument(skip(self))]
    pub async fn submit_rating(
        &self,
        guild_id: u64,
        ticket_id: &str,
        rater_id: u64,
        stars: u8,
    ) -> TicketResult<ClosedTicket> {
        let handle = self.store().guild(guild_id).await?;
        let mut guild = handle.lock().await;
        if !guild.ticket.rating_system {
            return Err(TicketError::new(TicketErrorKind::RatingDisabled));
        }
        if !(1..=5).contains(&stars) {
            return Err(TicketError::new(TicketErrorKind::InvalidRating(stars)));
        }
        let closed = self
            .commit(&mut guild, |config| {
                let closed = closed_for_creator(config, ticket_id, rater_id)?;
                if closed.rating.is_some() {
                    return Err(TicketError::new(TicketErrorKind::AlreadyRated));
                }
                closed.rating = Some(stars);
                let closed = closed.clone();
                config.stats.record_rating(stars);
                Ok(closed)
            })
            .await?;
        let mirror = guild.ticket.transcript_channel_id;
        drop(guild);

        info!(stars, "Rating recorded");
        self.mirror_feedback(mirror, views::rating_feedback(&closed, stars))
            .await;
        Ok(closed)
    }

    /// Store the creator's survey answers on a closed ticket.
    ///
    /// Answers beyond the question limit are dropped.
    #[instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn submit_survey(
        &self,
        guild_id: u64,
        ticket_id: &str,
        rater_id: u64,
        mut answers: Vec<SurveyAnswer>,
    ) -> TicketResult<ClosedTicket> {
        answers.truncate(MAX_SURVEY_QUESTIONS);
        let handle = self.store().guild(guild_id).await?;
        let mut guild = handle.lock().await;
        if !guild.ticket.survey_enabled {
            return Err(TicketError::new(TicketErrorKind::SurveyDisabled));
        }
        let stored = answers.clone();
        let closed = self
            .commit(&mut guild, |config| {
                let closed = closed_for_creator(config, ticket_id, rater_id)?;
                if closed.survey_responses.is_some() {
                    return Err(TicketError::new(TicketErrorKind::AlreadyRated));
                }
                closed.survey_responses = Some(stored);
                Ok(closed.clone())
            })
            .await?;
        let mirror = guild.ticket.transcript_channel_id;
        drop(guild);

        info!("Survey recorded");
        self.mirror_feedback(mirror, views::survey_feedback(&closed, &answers))
            .await;
        Ok(closed)
    }

    async fn mirror_feedback(&self, channel: Option<u64>, message: OutgoingMessage) {
        if let Some(channel) = channel
            && let Err(e) = self.platform().send_message(channel, &message).await
        {
            warn!(error = %e, "Could not mirror feedback to transcript channel");
        }
    }
}
