//! Chat platform trait.

use crate::{HistoryMessage, NewChannel, OutgoingMessage};
use async_trait::async_trait;
use vigil_error::PlatformResult;

/// Operations the ticket and scan cores need from the chat platform.
///
/// Interaction replies (ephemeral messages, modals) are not part of this
/// trait: handlers return an [`InteractionResponse`](crate::InteractionResponse)
/// and the adapter delivers it on the interaction that triggered them.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// User ID of the bot itself.
    fn bot_user_id(&self) -> u64;

    /// Create a text channel in `guild_id` and return its ID.
    ///
    /// # Errors
    ///
    /// Returns error if the platform rejects the channel or its overwrites.
    async fn create_channel(&self, guild_id: u64, channel: &NewChannel) -> PlatformResult<u64>;

    /// Delete a channel.
    async fn delete_channel(&self, channel_id: u64) -> PlatformResult<()>;

    /// Replace a channel's topic line.
    async fn set_channel_topic(&self, channel_id: u64, topic: &str) -> PlatformResult<()>;

    /// Post a message and return its ID.
    async fn send_message(&self, channel_id: u64, message: &OutgoingMessage)
    -> PlatformResult<u64>;

    /// Replace the content of an existing message.
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<()>;

    /// Delete a message.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()>;

    /// Pin a message.
    async fn pin_message(&self, channel_id: u64, message_id: u64) -> PlatformResult<()>;

    /// Send a direct message and return its ID.
    ///
    /// # Errors
    ///
    /// Returns error if the user has direct messages closed.
    async fn send_direct_message(
        &self,
        user_id: u64,
        message: &OutgoingMessage,
    ) -> PlatformResult<u64>;

    /// Full channel history, oldest first.
    async fn channel_history(&self, channel_id: u64) -> PlatformResult<Vec<HistoryMessage>>;

    /// Download an attachment by URL.
    async fn download_attachment(&self, url: &str) -> PlatformResult<Vec<u8>>;

    /// Link that jumps to a message.
    fn message_link(&self, guild_id: u64, channel_id: u64, message_id: u64) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            guild_id, channel_id, message_id
        )
    }
}
