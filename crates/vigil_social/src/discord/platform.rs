//! [`ChatPlatform`] on top of serenity's HTTP client.

use super::convert;
use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, CreateChannel, EditChannel, GetMessages, GuildId, MessageId, UserId,
};
use serenity::http::Http;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use vigil_error::{PlatformError, PlatformErrorKind, PlatformResult};
use vigil_interface::{ChatPlatform, HistoryMessage, NewChannel, OutgoingMessage};

/// Page size for history reads; the platform's ceiling.
const HISTORY_PAGE: u8 = 100;

/// Discord implementation of the chat platform.
///
/// Holds its own HTTP client so it can be built before the gateway
/// connection is up.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    bot_user_id: u64,
    downloads: reqwest::Client,
}

impl std::fmt::Debug for SerenityPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerenityPlatform")
            .field("bot_user_id", &self.bot_user_id)
            .finish_non_exhaustive()
    }
}

impl SerenityPlatform {
    /// Connect with a bot token and look up the bot's own user ID.
    ///
    /// # Errors
    ///
    /// Returns error if the token is rejected.
    #[instrument(skip(token), fields(token_len = token.as_ref().len()))]
    pub async fn connect(token: impl AsRef<str>) -> PlatformResult<Self> {
        let http = Arc::new(Http::new(token.as_ref()));
        let me = http
            .get_current_user()
            .await
            .map_err(|e| PlatformError::new(PlatformErrorKind::Api(e.to_string())))?;
        info!(bot_user_id = me.id.get(), name = %me.name, "Connected to Discord");
        Ok(Self::with_http_client(http, me.id.get()))
    }

    /// Platform sharing an existing HTTP client.
    pub fn with_http_client(http: Arc<Http>, bot_user_id: u64) -> Self {
        Self {
            http,
            bot_user_id,
            downloads: reqwest::Client::new(),
        }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    fn bot_user_id(&self) -> u64 {
        self.bot_user_id
    }

    #[instrument(skip(self, channel), fields(name = %channel.name))]
    async fn create_channel(&self, guild_id: u64, channel: &NewChannel) -> PlatformResult<u64> {
        let mut builder = CreateChannel::new(&channel.name)
            .kind(ChannelType::Text)
            .permissions(convert::overwrites(guild_id, &channel.overwrites));
        if let Some(parent) = channel.parent_id {
            builder = builder.category(ChannelId::new(parent));
        }
        if let Some(topic) = &channel.topic {
            builder = builder.topic(topic);
        }
        let created = GuildId::new(guild_id)
            .create_channel(&self.http, builder)
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::ChannelCreateFailed("guild or category not found".to_string()),
                    PlatformErrorKind::ChannelCreateFailed,
                )
            })?;
        debug!(channel_id = created.id.get(), "Channel created");
        Ok(created.id.get())
    }

    #[instrument(skip(self))]
    async fn delete_channel(&self, channel_id: u64) -> PlatformResult<()> {
        ChannelId::new(channel_id)
            .delete(&self.http)
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::ChannelNotFound(channel_id),
                    PlatformErrorKind::ChannelDeleteFailed,
                )
            })?;
        Ok(())
    }

    #[instrument(skip(self, topic))]
    async fn set_channel_topic(&self, channel_id: u64, topic: &str) -> PlatformResult<()> {
        ChannelId::new(channel_id)
            .edit(&self.http, EditChannel::new().topic(topic))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::ChannelNotFound(channel_id),
                    PlatformErrorKind::Api,
                )
            })?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn send_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<u64> {
        let sent = ChannelId::new(channel_id)
            .send_message(&self.http, convert::create_message(message))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::ChannelNotFound(channel_id),
                    PlatformErrorKind::MessageSendFailed,
                )
            })?;
        Ok(sent.id.get())
    }

    #[instrument(skip(self, message))]
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<()> {
        ChannelId::new(channel_id)
            .edit_message(&self.http, MessageId::new(message_id), convert::edit_message(message))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::MessageNotFound(message_id),
                    PlatformErrorKind::MessageSendFailed,
                )
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()> {
        ChannelId::new(channel_id)
            .delete_message(&self.http, MessageId::new(message_id))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::MessageNotFound(message_id),
                    PlatformErrorKind::Api,
                )
            })
    }

    #[instrument(skip(self))]
    async fn pin_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()> {
        ChannelId::new(channel_id)
            .pin(&self.http, MessageId::new(message_id))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::MessageNotFound(message_id),
                    PlatformErrorKind::Api,
                )
            })
    }

    #[instrument(skip(self, message))]
    async fn send_direct_message(
        &self,
        user_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<u64> {
        let sent = UserId::new(user_id)
            .direct_message(&self.http, convert::create_message(message))
            .await
            .map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::UserNotFound(user_id),
                    PlatformErrorKind::DirectMessageFailed,
                )
            })?;
        Ok(sent.id.get())
    }

    #[instrument(skip(self), fields(messages))]
    async fn channel_history(&self, channel_id: u64) -> PlatformResult<Vec<HistoryMessage>> {
        let channel = ChannelId::new(channel_id);
        let mut collected = Vec::new();
        let mut before: Option<MessageId> = None;
        loop {
            let mut request = GetMessages::new().limit(HISTORY_PAGE);
            if let Some(id) = before {
                request = request.before(id);
            }
            let page = channel.messages(&self.http, request).await.map_err(|e| {
                convert::platform_error(
                    e,
                    || PlatformErrorKind::ChannelNotFound(channel_id),
                    PlatformErrorKind::Api,
                )
            })?;
            let full = page.len() == usize::from(HISTORY_PAGE);
            // Pages arrive newest first.
            before = page.last().map(|m| m.id);
            collected.extend(page.iter().map(convert::history_message));
            if !full || before.is_none() {
                break;
            }
        }
        collected.reverse();
        tracing::Span::current().record("messages", collected.len());
        Ok(collected)
    }

    #[instrument(skip(self, url))]
    async fn download_attachment(&self, url: &str) -> PlatformResult<Vec<u8>> {
        let download = |e: reqwest::Error| {
            PlatformError::new(PlatformErrorKind::DownloadFailed(e.without_url().to_string()))
        };
        let response = self
            .downloads
            .get(url)
            .send()
            .await
            .map_err(download)?
            .error_for_status()
            .map_err(download)?;
        let bytes = response.bytes().await.map_err(download)?;
        debug!(size = bytes.len(), "Attachment downloaded");
        Ok(bytes.to_vec())
    }
}
