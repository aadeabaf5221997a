//! Routes ticket widget events to the core.
//!
//! Form sessions live here, keyed by a session id carried in the widget
//! routing ids. Close confirmations are bounded waits on an
//! [`InteractionWaiter`] keyed by a correlation id.

use crate::flow::{
    FORM_SESSION_SECS, PanelEffect, PanelEvent, PanelState, TicketDraft, advance, form_steps,
};
use crate::lifecycle::authorize_close;
use crate::{CloseActor, CreateTicketRequest, TicketCore, TicketWidget, views};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use vigil_core::{MemberInfo, SurveyAnswer, TicketConfig};
use vigil_error::{TicketError, TicketErrorKind, TicketResult};
use vigil_interface::{
    ComponentInteraction, Embed, IncomingMessage, InteractionResponse, InteractionWaiter,
    ModalSubmission, OutgoingMessage,
};

/// How long a close confirmation stays answerable.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Answer to a close confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CloseDecision {
    /// Go ahead
    Confirm,
    /// Keep the ticket open
    Cancel,
}

#[derive(Debug, Clone)]
struct FormSession {
    guild_id: u64,
    user_id: u64,
    state: PanelState,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    /// Reply creates a new ephemeral message
    Fresh,
    /// Reply can replace the message holding the widget
    Component,
    /// Reply to a modal submission
    Modal,
}

fn expired_response(surface: Surface) -> InteractionResponse {
    let embed = Embed::error(TicketErrorKind::WidgetTimeout.to_string());
    match surface {
        Surface::Component => InteractionResponse::Update(OutgoingMessage::embed(embed)),
        Surface::Fresh | Surface::Modal => InteractionResponse::ephemeral(embed),
    }
}

fn guild_of(guild_id: Option<u64>) -> TicketResult<u64> {
    guild_id.ok_or_else(|| {
        TicketError::new(TicketErrorKind::InvalidInput(
            "this only works inside a server".to_string(),
        ))
    })
}

/// Ticket widget router.
#[derive(Debug)]
pub struct TicketInteractions {
    core: Arc<TicketCore>,
    sessions: Mutex<HashMap<String, FormSession>>,
    confirmations: Arc<InteractionWaiter<CloseDecision>>,
    confirm_timeout: Duration,
}

impl TicketInteractions {
    /// Router over `core`.
    pub fn new(core: Arc<TicketCore>) -> Self {
        Self {
            core,
            sessions: Mutex::new(HashMap::new()),
            confirmations: Arc::new(InteractionWaiter::new()),
            confirm_timeout: CONFIRM_TIMEOUT,
        }
    }

    /// Override the confirmation window.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// The core behind the router.
    pub fn core(&self) -> &Arc<TicketCore> {
        &self.core
    }

    /// Number of open form sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Handle a button or select. `None` if the widget is not ours.
    #[instrument(skip(self, event), fields(custom_id = %event.custom_id, user_id = *event.member.user_id()))]
    pub async fn handle_component(
        &self,
        event: &ComponentInteraction,
    ) -> Option<InteractionResponse> {
        let widget = TicketWidget::parse(&event.custom_id)?;
        let response = match self.route_component(widget, event).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Ticket widget refused");
                InteractionResponse::error(e.user_message())
            }
        };
        Some(response)
    }

    /// Handle a modal submission. `None` if the modal is not ours.
    #[instrument(skip(self, event), fields(custom_id = %event.custom_id, user_id = *event.member.user_id()))]
    pub async fn handle_modal(&self, event: &ModalSubmission) -> Option<InteractionResponse> {
        let widget = TicketWidget::parse(&event.custom_id)?;
        let response = match self.route_modal(widget, event).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Ticket modal refused");
                InteractionResponse::error(e.user_message())
            }
        };
        Some(response)
    }

    /// Feed a guild message to activity tracking.
    pub async fn handle_message(&self, message: &IncomingMessage) {
        if let Err(e) = self.core.record_activity(message).await {
            warn!(error = %e, "Activity tracking failed");
        }
    }

    async fn route_component(
        &self,
        widget: TicketWidget,
        event: &ComponentInteraction,
    ) -> TicketResult<InteractionResponse> {
        let member = &event.member;
        match widget {
            TicketWidget::Panel => self.start_session(guild_of(event.guild_id)?, member).await,
            TicketWidget::AnonymousToggle { session } => {
                self.step_session(&session, member, PanelEvent::AnonymousToggled, Surface::Component)
                    .await
            }
            TicketWidget::Category { session } => {
                let choice = event.values.first().cloned().ok_or_else(|| {
                    TicketError::new(TicketErrorKind::InvalidInput(
                        "no category selected".to_string(),
                    ))
                })?;
                self.step_session(
                    &session,
                    member,
                    PanelEvent::CategoryChosen(choice),
                    Surface::Component,
                )
                .await
            }
            TicketWidget::FormContinue { session, step } => {
                self.step_session(
                    &session,
                    member,
                    PanelEvent::ContinueClicked { step },
                    Surface::Component,
                )
                .await
            }
            TicketWidget::Close { ticket_id } => {
                self.begin_close(guild_of(event.guild_id)?, ticket_id, member)
                    .await
            }
            TicketWidget::CloseConfirm { correlation } => {
                if self.confirmations.resolve(&correlation, CloseDecision::Confirm) {
                    Ok(InteractionResponse::Update(OutgoingMessage::embed(
                        Embed::new("🔒 Closing ticket...")
                            .with_color(Some(vigil_interface::INFO_COLOR)),
                    )))
                } else {
                    Ok(expired_response(Surface::Component))
                }
            }
            TicketWidget::CloseCancel { correlation } => {
                if self.confirmations.resolve(&correlation, CloseDecision::Cancel) {
                    Ok(InteractionResponse::Update(OutgoingMessage::embed(
                        Embed::success("Close cancelled", "The ticket stays open."),
                    )))
                } else {
                    Ok(expired_response(Surface::Component))
                }
            }
            TicketWidget::Transcript { ticket_id } => {
                let guild_id = guild_of(event.guild_id)?;
                self.core
                    .send_transcript(guild_id, &ticket_id, member)
                    .await?;
                Ok(InteractionResponse::ephemeral(Embed::success(
                    "Transcript saved",
                    "A transcript was posted to the transcript channel.",
                )))
            }
            TicketWidget::Claim { ticket_id } => {
                let guild_id = guild_of(event.guild_id)?;
                let ticket = self.core.claim_ticket(guild_id, &ticket_id, member).await?;
                Ok(InteractionResponse::ephemeral(Embed::success(
                    "Ticket claimed",
                    format!("You are now handling ticket #{}.", ticket.number),
                )))
            }
            TicketWidget::Tag { ticket_id } => {
                let guild_id = guild_of(event.guild_id)?;
                let config = self.core.config(guild_id).await?;
                let ticket = tag_target(&config, &ticket_id, member)?;
                Ok(InteractionResponse::Message {
                    message: views::tag_picker(&config, ticket),
                    ephemeral: true,
                })
            }
            TicketWidget::TagSelect { ticket_id } => {
                let guild_id = guild_of(event.guild_id)?;
                let tag = event.values.first().cloned().ok_or_else(|| {
                    TicketError::new(TicketErrorKind::InvalidInput("no tag selected".to_string()))
                })?;
                let config = self.core.config(guild_id).await?;
                let applied = tag_target(&config, &ticket_id, member)?
                    .tags
                    .contains(&tag.to_lowercase());
                let ticket = if applied {
                    self.core.remove_tag(guild_id, &ticket_id, member, &tag).await?
                } else {
                    self.core.add_tag(guild_id, &ticket_id, member, &tag).await?
                };
                Ok(InteractionResponse::Update(views::tag_picker(&config, &ticket)))
            }
            TicketWidget::Rate {
                guild_id,
                ticket_id,
                stars,
            } => {
                self.core
                    .submit_rating(guild_id, &ticket_id, *member.user_id(), stars)
                    .await?;
                let config = self.core.config(guild_id).await?;
                Ok(InteractionResponse::Update(views::rating_thanks(
                    &config, guild_id, &ticket_id, stars,
                )))
            }
            TicketWidget::Survey {
                guild_id,
                ticket_id,
            } => {
                let config = self.core.config(guild_id).await?;
                if !config.survey_enabled || config.survey_questions.is_empty() {
                    return Err(TicketError::new(TicketErrorKind::SurveyDisabled));
                }
                Ok(InteractionResponse::Modal(views::survey_modal(
                    guild_id,
                    &ticket_id,
                    &config.survey_questions,
                )))
            }
            TicketWidget::Form { .. } | TicketWidget::CloseReason { .. } => Err(TicketError::new(
                TicketErrorKind::InvalidInput("unexpected widget".to_string()),
            )),
        }
    }

    async fn route_modal(
        &self,
        widget: TicketWidget,
        event: &ModalSubmission,
    ) -> TicketResult<InteractionResponse> {
        let member = &event.member;
        match widget {
            TicketWidget::Form { session, step } => {
                self.step_session(
                    &session,
                    member,
                    PanelEvent::ModalSubmitted {
                        step,
                        values: event.values.clone(),
                    },
                    Surface::Modal,
                )
                .await
            }
            TicketWidget::CloseReason { ticket_id } => {
                let guild_id = guild_of(event.guild_id)?;
                let reason = event.values.get("reason").cloned();
                let closed = self
                    .core
                    .close_ticket(guild_id, &ticket_id, CloseActor::Member(member.clone()), reason)
                    .await?;
                Ok(InteractionResponse::ephemeral(Embed::success(
                    "Ticket closed",
                    format!("Ticket #{} was closed.", closed.ticket.number),
                )))
            }
            TicketWidget::Survey {
                guild_id,
                ticket_id,
            } => {
                let config = self.core.config(guild_id).await?;
                let answers = config
                    .survey_questions
                    .iter()
                    .enumerate()
                    .map(|(index, question)| {
                        let answer = event
                            .values
                            .get(&format!("q:{}", index))
                            .map(|a| a.trim().to_string())
                            .unwrap_or_default();
                        SurveyAnswer::new(question.clone(), answer)
                    })
                    .collect();
                self.core
                    .submit_survey(guild_id, &ticket_id, *member.user_id(), answers)
                    .await?;
                Ok(InteractionResponse::ephemeral(Embed::success(
                    "Thank you!",
                    "Your survey answers were recorded.",
                )))
            }
            _ => Err(TicketError::new(TicketErrorKind::InvalidInput(
                "unexpected form".to_string(),
            ))),
        }
    }

    async fn start_session(
        &self,
        guild_id: u64,
        member: &MemberInfo,
    ) -> TicketResult<InteractionResponse> {
        self.core.check_can_open(guild_id, member).await?;
        let config = self.core.config(guild_id).await?;
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let now = self.core.clock().now();
        let (state, effects) = advance(
            PanelState::ChoosingCategory { anonymous: false },
            PanelEvent::PanelClicked,
            &config,
        );
        {
            let mut sessions = self.sessions.lock();
            sessions.retain(|_, s| s.expires_at > now);
            sessions.insert(
                session_id.clone(),
                FormSession {
                    guild_id,
                    user_id: *member.user_id(),
                    state,
                    expires_at: now + chrono::Duration::seconds(FORM_SESSION_SECS),
                },
            );
        }
        debug!(session = %session_id, "Form session started");
        self.apply(guild_id, member, &session_id, &config, effects, Surface::Fresh)
            .await
    }

    async fn step_session(
        &self,
        session_id: &str,
        member: &MemberInfo,
        event: PanelEvent,
        surface: Surface,
    ) -> TicketResult<InteractionResponse> {
        let Some(session) = self.sessions.lock().get(session_id).cloned() else {
            return Ok(expired_response(surface));
        };
        if session.user_id != *member.user_id() {
            return Err(TicketError::new(TicketErrorKind::PermissionDenied(
                "this form belongs to someone else".to_string(),
            )));
        }
        let config = self.core.config(session.guild_id).await?;
        let now = self.core.clock().now();
        let event = if now >= session.expires_at {
            debug!(session = %session_id, "Form session expired");
            PanelEvent::TimedOut
        } else {
            event
        };

        let (state, effects) = advance(session.state, event, &config);
        {
            let mut sessions = self.sessions.lock();
            match state {
                PanelState::Expired | PanelState::Submitted(_) => {
                    sessions.remove(session_id);
                }
                state => {
                    sessions.insert(session_id.to_string(), FormSession { state, ..session });
                }
            }
        }
        self.apply(session.guild_id, member, session_id, &config, effects, surface)
            .await
    }

    async fn apply(
        &self,
        guild_id: u64,
        member: &MemberInfo,
        session_id: &str,
        config: &TicketConfig,
        effects: Vec<PanelEffect>,
        surface: Surface,
    ) -> TicketResult<InteractionResponse> {
        let mut response = InteractionResponse::Acknowledge;
        let mut rejection = None;
        let mut disable = false;

        for effect in effects {
            match effect {
                PanelEffect::ShowPicker { anonymous } => {
                    let picker = views::category_picker(config, session_id, anonymous);
                    response = match surface {
                        Surface::Component => InteractionResponse::Update(picker),
                        Surface::Fresh | Surface::Modal => InteractionResponse::Message {
                            message: picker,
                            ephemeral: true,
                        },
                    };
                }
                PanelEffect::OpenModal {
                    category,
                    step,
                    total_steps,
                } => {
                    let category = config.category(&category).ok_or_else(|| {
                        TicketError::new(TicketErrorKind::CategoryNotFound(category.clone()))
                    })?;
                    let steps = form_steps(category, config.form_mode);
                    let inputs = steps.get(step).ok_or_else(|| {
                        TicketError::new(TicketErrorKind::InvalidInput(
                            "form step out of range".to_string(),
                        ))
                    })?;
                    response = InteractionResponse::Modal(views::form_modal(
                        session_id,
                        step,
                        total_steps,
                        category,
                        inputs,
                    ));
                }
                PanelEffect::PromptContinue { step, total_steps } => {
                    response = InteractionResponse::Message {
                        message: views::continue_prompt(session_id, step, total_steps),
                        ephemeral: true,
                    };
                }
                PanelEffect::Create(draft) => {
                    let ticket = self
                        .core
                        .create_ticket(request_from(guild_id, member, draft))
                        .await?;
                    response = InteractionResponse::ephemeral(Embed::success(
                        "Ticket created",
                        format!("Your ticket is ready: <#{}>", ticket.channel_id),
                    ));
                }
                PanelEffect::Reject(kind) => rejection = Some(kind),
                PanelEffect::DisableWidget => disable = true,
            }
        }

        if disable && surface == Surface::Component {
            let kind = rejection.unwrap_or(TicketErrorKind::WidgetTimeout);
            return Ok(InteractionResponse::Update(OutgoingMessage::embed(
                Embed::error(kind.to_string()),
            )));
        }
        if let Some(kind) = rejection {
            return Err(TicketError::new(kind));
        }
        if disable {
            return Ok(expired_response(surface));
        }
        Ok(response)
    }

    async fn begin_close(
        &self,
        guild_id: u64,
        ticket_id: String,
        member: &MemberInfo,
    ) -> TicketResult<InteractionResponse> {
        let config = self.core.config(guild_id).await?;
        let ticket = config.active_tickets.get(&ticket_id).ok_or_else(|| {
            TicketError::new(TicketErrorKind::NoSuchTicket(ticket_id.clone()))
        })?;
        authorize_close(&config, ticket, member)?;

        // Submitting the reason modal is the confirmation; dismissing it
        // leaves the ticket open. No second prompt follows.
        if config.require_reason_to_close {
            return Ok(InteractionResponse::Modal(views::close_reason_modal(ticket)));
        }
        if !config.close_confirmation {
            let closed = self
                .core
                .close_ticket(guild_id, &ticket_id, CloseActor::Member(member.clone()), None)
                .await?;
            return Ok(InteractionResponse::ephemeral(Embed::success(
                "Ticket closed",
                format!("Ticket #{} was closed.", closed.ticket.number),
            )));
        }

        let correlation = uuid::Uuid::new_v4().simple().to_string();
        let rx = self.confirmations.register(correlation.clone());
        let core = Arc::clone(&self.core);
        let waiter = Arc::clone(&self.confirmations);
        let timeout = self.confirm_timeout;
        let actor = CloseActor::Member(member.clone());
        let key = correlation.clone();
        tokio::spawn(async move {
            match waiter.wait_registered(&key, rx, timeout).await {
                Some(CloseDecision::Confirm) => {
                    debug!(decision = %CloseDecision::Confirm, "Close confirmed");
                    if let Err(e) = core.close_ticket(guild_id, &ticket_id, actor, None).await {
                        warn!(error = %e, "Confirmed close failed");
                    }
                }
                Some(decision @ CloseDecision::Cancel) => debug!(%decision, "Close cancelled"),
                None => debug!("Close confirmation expired"),
            }
        });

        Ok(InteractionResponse::Message {
            message: views::close_confirmation(&correlation),
            ephemeral: true,
        })
    }
}

fn tag_target<'a>(
    config: &'a TicketConfig,
    ticket_id: &str,
    member: &MemberInfo,
) -> TicketResult<&'a vigil_core::ActiveTicket> {
    if !config.tags_enabled {
        return Err(TicketError::new(TicketErrorKind::TagsDisabled));
    }
    if !crate::is_staff(config, member) {
        return Err(TicketError::new(TicketErrorKind::PermissionDenied(
            "only staff can tag tickets".to_string(),
        )));
    }
    config
        .active_tickets
        .get(ticket_id)
        .ok_or_else(|| TicketError::new(TicketErrorKind::NoSuchTicket(ticket_id.to_string())))
}

fn request_from(guild_id: u64, member: &MemberInfo, draft: TicketDraft) -> CreateTicketRequest {
    CreateTicketRequest {
        guild_id,
        requester: member.clone(),
        category: draft.category,
        title: draft.title,
        description: draft.description,
        custom_fields: draft.fields,
        anonymous: draft.anonymous,
    }
}
