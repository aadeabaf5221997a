//! Inbound events as delivered by the platform adapter.

use crate::AttachmentRef;
use std::collections::BTreeMap;
use vigil_core::MemberInfo;

/// A button click or select choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInteraction {
    /// Guild, absent in direct messages
    pub guild_id: Option<u64>,
    /// Channel holding the widget
    pub channel_id: u64,
    /// Message the widget is attached to
    pub message_id: u64,
    /// Who clicked
    pub member: MemberInfo,
    /// Routing id of the widget
    pub custom_id: String,
    /// Selected values for select menus
    pub values: Vec<String>,
}

/// A submitted modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSubmission {
    /// Guild, absent in direct messages
    pub guild_id: Option<u64>,
    /// Channel the modal was opened from
    pub channel_id: u64,
    /// Who submitted
    pub member: MemberInfo,
    /// Routing id of the modal
    pub custom_id: String,
    /// Input values by input routing id
    pub values: BTreeMap<String, String>,
}

/// A message posted in a guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Guild, absent in direct messages
    pub guild_id: Option<u64>,
    /// Channel
    pub channel_id: u64,
    /// Message ID
    pub message_id: u64,
    /// Author
    pub author: MemberInfo,
    /// Text content
    pub content: String,
    /// Attached files
    pub attachments: Vec<AttachmentRef>,
}
