//! Routes scan widget events and uploads to the core.

use crate::service::is_scan_admin;
use crate::{ScanCore, ScanWidget, views};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use vigil_core::MemberInfo;
use vigil_error::{ScanError, ScanErrorKind, ScanResult};
use vigil_interface::{
    AttachmentRef, ComponentInteraction, IncomingMessage, InteractionResponse, InteractionWaiter,
    OutgoingMessage,
};

/// How long the upload button waits for a file.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

fn upload_key(guild_id: u64, channel_id: u64, user_id: u64) -> String {
    format!("upload:{}:{}:{}", guild_id, channel_id, user_id)
}

/// Scan widget router.
#[derive(Debug)]
pub struct ScanInteractions {
    core: Arc<ScanCore>,
    uploads: Arc<InteractionWaiter<AttachmentRef>>,
    upload_timeout: Duration,
}

impl ScanInteractions {
    /// Router over `core`.
    pub fn new(core: Arc<ScanCore>) -> Self {
        Self {
            core,
            uploads: Arc::new(InteractionWaiter::new()),
            upload_timeout: UPLOAD_TIMEOUT,
        }
    }

    /// Override the upload window.
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// The core behind the router.
    pub fn core(&self) -> &Arc<ScanCore> {
        &self.core
    }

    /// Handle a button. `None` if the widget is not ours.
    #[instrument(skip(self, event), fields(custom_id = %event.custom_id, user_id = *event.member.user_id()))]
    pub async fn handle_component(
        &self,
        event: &ComponentInteraction,
    ) -> Option<InteractionResponse> {
        let widget = ScanWidget::parse(&event.custom_id)?;
        let response = match self.route(widget, event).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Scan widget refused");
                InteractionResponse::error(e.user_message())
            }
        };
        Some(response)
    }

    /// Feed a guild message to the upload waiter and auto-scan.
    ///
    /// Returns true if the message was consumed by either.
    pub async fn handle_message(&self, message: &IncomingMessage) -> bool {
        if let Some(guild_id) = message.guild_id
            && let Some(attachment) = message.attachments.first()
        {
            let key = upload_key(guild_id, message.channel_id, *message.author.user_id());
            if self.uploads.resolve(&key, attachment.clone()) {
                debug!(filename = %attachment.filename, "Upload received");
                return true;
            }
        }
        self.core.auto_scan(message).await.is_some()
    }

    async fn route(
        &self,
        widget: ScanWidget,
        event: &ComponentInteraction,
    ) -> ScanResult<InteractionResponse> {
        let guild_id = event.guild_id.ok_or_else(|| {
            ScanError::new(ScanErrorKind::PermissionDenied(
                "scanning only works inside a server".to_string(),
            ))
        })?;
        let member = &event.member;
        match widget {
            ScanWidget::Upload => self.begin_upload(guild_id, event.channel_id, member).await,
            ScanWidget::History { page } => {
                let history = self
                    .core
                    .user_history(guild_id, *member.user_id(), page.unwrap_or(0))
                    .await;
                Ok(paged(views::history_page(&history, false), page.is_some()))
            }
            ScanWidget::AdminHistory { page } => {
                let guild = self.core.guild_config(guild_id).await;
                if !is_scan_admin(&guild, member) {
                    return Err(ScanError::new(ScanErrorKind::PermissionDenied(
                        "only scan admins can view server history".to_string(),
                    )));
                }
                let history = self.core.admin_history(guild_id, page.unwrap_or(0)).await;
                Ok(paged(views::history_page(&history, true), page.is_some()))
            }
            ScanWidget::Info => {
                let global = self.core.global_config().await;
                Ok(InteractionResponse::ephemeral(views::info(
                    &global,
                    &global.guild(guild_id),
                )))
            }
            ScanWidget::Details { sha } => {
                let record = self.core.find(guild_id, &sha).await?;
                Ok(InteractionResponse::ephemeral(views::details(&record)))
            }
            ScanWidget::Delete { owner } => {
                let guild = self.core.guild_config(guild_id).await;
                if owner != *member.user_id() && !is_scan_admin(&guild, member) {
                    return Err(ScanError::new(ScanErrorKind::PermissionDenied(
                        "only the requester or a scan admin can delete this card".to_string(),
                    )));
                }
                self.core
                    .platform()
                    .delete_message(event.channel_id, event.message_id)
                    .await
                    .map_err(|e| {
                        ScanError::new(ScanErrorKind::NetworkError(e.kind.to_string()))
                    })?;
                Ok(InteractionResponse::Acknowledge)
            }
        }
    }

    async fn begin_upload(
        &self,
        guild_id: u64,
        channel_id: u64,
        member: &MemberInfo,
    ) -> ScanResult<InteractionResponse> {
        self.core.preflight(guild_id, member, channel_id).await?;
        let key = upload_key(guild_id, channel_id, *member.user_id());
        if self.uploads.is_pending(&key) {
            return Ok(InteractionResponse::ephemeral(views::upload_prompt(
                self.upload_timeout.as_secs(),
            )));
        }

        let rx = self.uploads.register(key.clone());
        let core = Arc::clone(&self.core);
        let uploads = Arc::clone(&self.uploads);
        let timeout = self.upload_timeout;
        let member = member.clone();
        tokio::spawn(async move {
            match uploads.wait_registered(&key, rx, timeout).await {
                Some(attachment) => {
                    if let Err(e) = core
                        .scan_attachment(guild_id, channel_id, &member, &attachment, false)
                        .await
                    {
                        core.report_failure(channel_id, &attachment.filename, &e)
                            .await;
                    }
                }
                None => {
                    debug!("Upload window closed");
                    if let Err(e) = core
                        .platform()
                        .send_message(channel_id, &views::upload_timeout(*member.user_id()))
                        .await
                    {
                        debug!(error = %e, "Could not post upload timeout notice");
                    }
                }
            }
        });

        Ok(InteractionResponse::ephemeral(views::upload_prompt(
            self.upload_timeout.as_secs(),
        )))
    }
}

fn paged(message: OutgoingMessage, paging: bool) -> InteractionResponse {
    if paging {
        InteractionResponse::Update(message)
    } else {
        InteractionResponse::Message {
            message,
            ephemeral: true,
        }
    }
}

