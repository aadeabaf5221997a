//! Outgoing message, embed and widget types.
//!
//! These are platform-neutral descriptions; the platform adapter converts
//! them into wire builders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::ButtonStyle;

/// A field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct EmbedField {
    /// Field title
    #[new(into)]
    pub name: String,
    /// Field body
    #[new(into)]
    pub value: String,
    /// Render side by side with neighbours
    pub inline: bool,
}

/// Rich embed.
///
/// # Examples
///
/// ```
/// use vigil_interface::Embed;
///
/// let embed = Embed::new("Ticket closed")
///     .with_color(Some(0xE74C3C))
///     .field("Reason", "fixed", false);
/// assert_eq!(embed.fields.len(), 1);
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_setters::Setters,
)]
#[setters(prefix = "with_", into)]
pub struct Embed {
    /// Title line
    pub title: String,
    /// Body text
    pub description: Option<String>,
    /// 24-bit RGB color
    pub color: Option<u32>,
    /// Named fields
    #[setters(skip)]
    pub fields: Vec<EmbedField>,
    /// Footer text
    pub footer: Option<String>,
    /// Timestamp shown in the footer
    pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
    /// Embed with a title and nothing else.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField::new(name, value, inline));
        self
    }

    /// Red failure embed carrying a user-facing message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("❌ Error")
            .with_description(Some(message.into()))
            .with_color(Some(ERROR_COLOR))
    }

    /// Green success embed.
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title)
            .with_description(Some(message.into()))
            .with_color(Some(SUCCESS_COLOR))
    }
}

/// Color used for failure embeds.
pub const ERROR_COLOR: u32 = 0xE74C3C;
/// Color used for success embeds.
pub const SUCCESS_COLOR: u32 = 0x2ECC71;
/// Neutral informational color.
pub const INFO_COLOR: u32 = 0x3498DB;

/// Option in a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct SelectOption {
    /// Visible label
    #[new(into)]
    pub label: String,
    /// Value returned on selection
    #[new(into)]
    pub value: String,
    /// Secondary text
    #[new(default)]
    pub description: Option<String>,
    /// Leading emoji
    #[new(default)]
    pub emoji: Option<String>,
}

/// An interactive widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    /// Push button
    Button {
        /// Routing id
        custom_id: String,
        /// Label
        label: String,
        /// Visual style
        style: ButtonStyle,
        /// Leading emoji
        emoji: Option<String>,
        /// Greyed out
        disabled: bool,
    },
    /// Link button opening a URL
    Link {
        /// Label
        label: String,
        /// Target URL
        url: String,
    },
    /// Drop-down select
    Select {
        /// Routing id
        custom_id: String,
        /// Placeholder text
        placeholder: String,
        /// Options
        options: Vec<SelectOption>,
        /// Greyed out
        disabled: bool,
    },
}

impl Component {
    /// Enabled button.
    pub fn button(
        custom_id: impl Into<String>,
        label: impl Into<String>,
        style: ButtonStyle,
    ) -> Self {
        Component::Button {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            emoji: None,
            disabled: false,
        }
    }

    /// Same component with an emoji, when it supports one.
    pub fn with_emoji(self, emoji: impl Into<String>) -> Self {
        match self {
            Component::Button {
                custom_id,
                label,
                style,
                disabled,
                ..
            } => Component::Button {
                custom_id,
                label,
                style,
                emoji: Some(emoji.into()),
                disabled,
            },
            other => other,
        }
    }

    /// Routing id, if the component has one.
    pub fn custom_id(&self) -> Option<&str> {
        match self {
            Component::Button { custom_id, .. } | Component::Select { custom_id, .. } => {
                Some(custom_id)
            }
            Component::Link { .. } => None,
        }
    }

    /// Same component, greyed out.
    pub fn disabled(self) -> Self {
        match self {
            Component::Button {
                custom_id,
                label,
                style,
                emoji,
                ..
            } => Component::Button {
                custom_id,
                label,
                style,
                emoji,
                disabled: true,
            },
            Component::Select {
                custom_id,
                placeholder,
                options,
                ..
            } => Component::Select {
                custom_id,
                placeholder,
                options,
                disabled: true,
            },
            link => link,
        }
    }
}

/// A row of widgets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionRow {
    /// Widgets in display order
    pub components: Vec<Component>,
}

impl ActionRow {
    /// Row from a list of widgets.
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Same row with every widget greyed out.
    pub fn disabled(self) -> Self {
        Self {
            components: self.components.into_iter().map(Component::disabled).collect(),
        }
    }
}

/// A file attached to an outgoing message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct FileAttachment {
    /// File name shown to users
    #[new(into)]
    pub filename: String,
    /// Content
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A message to post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Plain text content
    pub content: Option<String>,
    /// Embeds
    pub embeds: Vec<Embed>,
    /// Widget rows
    pub components: Vec<ActionRow>,
    /// File attachments
    pub files: Vec<FileAttachment>,
}

impl OutgoingMessage {
    /// Message with a single embed.
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    /// Message with text content only.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Set the text content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Append a widget row.
    pub fn with_row(mut self, row: ActionRow) -> Self {
        self.components.push(row);
        self
    }

    /// Append a file.
    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    /// Every routing id in the message.
    pub fn custom_ids(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|row| row.components.iter())
            .filter_map(Component::custom_id)
            .collect()
    }
}

/// Text input inside a modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Routing id of the value
    pub custom_id: String,
    /// Label
    pub label: String,
    /// Placeholder
    pub placeholder: Option<String>,
    /// Must be filled
    pub required: bool,
    /// Paragraph style
    pub long: bool,
    /// Length ceiling
    pub max_length: Option<u32>,
    /// Prefilled value
    pub value: Option<String>,
}

impl TextInput {
    /// Required single-line input.
    pub fn short(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            placeholder: None,
            required: true,
            long: false,
            max_length: None,
            value: None,
        }
    }

    /// Required paragraph input.
    pub fn paragraph(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            long: true,
            ..Self::short(custom_id, label)
        }
    }
}

/// Text-entry modal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modal {
    /// Routing id
    pub custom_id: String,
    /// Title bar
    pub title: String,
    /// Inputs, at most five
    pub inputs: Vec<TextInput>,
}

/// Maximum inputs the platform allows in one modal.
pub const MAX_MODAL_INPUTS: usize = 5;

/// Reply to a component, modal or command interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionResponse {
    /// New message, optionally visible only to the invoker
    Message {
        /// Content
        message: OutgoingMessage,
        /// Only the invoker sees it
        ephemeral: bool,
    },
    /// Replace the message the widget is attached to
    Update(OutgoingMessage),
    /// Open a modal
    Modal(Modal),
    /// Acknowledge without visible output
    Acknowledge,
}

impl InteractionResponse {
    /// Ephemeral single-embed reply.
    pub fn ephemeral(embed: Embed) -> Self {
        InteractionResponse::Message {
            message: OutgoingMessage::embed(embed),
            ephemeral: true,
        }
    }

    /// Ephemeral failure embed.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ephemeral(Embed::error(message))
    }
}
