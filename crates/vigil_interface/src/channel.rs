//! Channel creation and history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission bits the cores care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelPermissions {
    /// View channel and read history
    pub read: bool,
    /// Send messages and attach files
    pub write: bool,
    /// Manage channel and messages
    pub manage: bool,
}

impl ChannelPermissions {
    /// No bits.
    pub const NONE: Self = Self {
        read: false,
        write: false,
        manage: false,
    };
    /// Read only.
    pub const READ: Self = Self {
        read: true,
        write: false,
        manage: false,
    };
    /// Read and write.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        manage: false,
    };
    /// Read, write and manage.
    pub const ALL: Self = Self {
        read: true,
        write: true,
        manage: true,
    };
}

/// Subject of a permission overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverwriteTarget {
    /// The guild default role
    Everyone,
    /// A role
    Role(u64),
    /// A single member
    Member(u64),
}

/// Per-channel permission delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct PermissionOverwrite {
    /// Who the delta applies to
    pub target: OverwriteTarget,
    /// Granted bits
    pub allow: ChannelPermissions,
    /// Denied bits
    pub deny: ChannelPermissions,
}

impl PermissionOverwrite {
    /// Grant `allow` to `target`.
    pub fn allow(target: OverwriteTarget, allow: ChannelPermissions) -> Self {
        Self::new(target, allow, ChannelPermissions::NONE)
    }

    /// Deny `deny` to `target`.
    pub fn deny(target: OverwriteTarget, deny: ChannelPermissions) -> Self {
        Self::new(target, ChannelPermissions::NONE, deny)
    }
}

/// A text channel to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChannel {
    /// Channel name
    pub name: String,
    /// Parent channel category
    pub parent_id: Option<u64>,
    /// Topic line
    pub topic: Option<String>,
    /// Permission overwrites
    pub overwrites: Vec<PermissionOverwrite>,
}

impl NewChannel {
    /// True if some overwrite grants `member_id` read access.
    pub fn grants_read_to_member(&self, member_id: u64) -> bool {
        self.overwrites
            .iter()
            .any(|o| o.target == OverwriteTarget::Member(member_id) && o.allow.read)
    }
}

/// Attachment on a message in channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct AttachmentRef {
    /// File name
    #[new(into)]
    pub filename: String,
    /// Download URL
    #[new(into)]
    pub url: String,
    /// Size in bytes
    pub size: u64,
}

/// Title and description of an embed in channel history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbedSummary {
    /// Embed title
    pub title: Option<String>,
    /// Embed description
    pub description: Option<String>,
}

/// A message read back from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Message ID
    pub id: u64,
    /// Author user ID
    pub author_id: u64,
    /// Author display name
    pub author_name: String,
    /// Author avatar URL
    pub author_avatar: Option<String>,
    /// Author is a bot
    pub is_bot: bool,
    /// Text content
    pub content: String,
    /// Post time
    pub timestamp: DateTime<Utc>,
    /// Attachments
    pub attachments: Vec<AttachmentRef>,
    /// Embeds
    pub embeds: Vec<EmbedSummary>,
}
