//! Interfaces between the Vigil cores and the outside world.
//!
//! - [`ChatPlatform`]: channels, messages, direct messages, history
//! - [`VerdictService`]: file upload and analysis polling
//! - [`InteractionWaiter`]: correlation-id keyed bounded waits
//!
//! Enable the `mock` feature for [`MockChatPlatform`] and
//! [`ScriptedVerdictService`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod channel;
mod events;
mod message;
mod platform;
mod verdict;
mod waiter;

#[cfg(feature = "mock")]
mod mock;

pub use channel::{
    AttachmentRef, ChannelPermissions, EmbedSummary, HistoryMessage, NewChannel, OverwriteTarget,
    PermissionOverwrite,
};
pub use events::{ComponentInteraction, IncomingMessage, ModalSubmission};
pub use message::{
    ActionRow, Component, ERROR_COLOR, Embed, EmbedField, FileAttachment, INFO_COLOR,
    InteractionResponse, MAX_MODAL_INPUTS, Modal, OutgoingMessage, SUCCESS_COLOR, SelectOption,
    TextInput,
};
pub use platform::ChatPlatform;
pub use verdict::{AnalysisStatus, VerdictService};
pub use waiter::InteractionWaiter;

#[cfg(feature = "mock")]
pub use mock::{
    CreatedChannel, HeldHistory, MockChatPlatform, ScriptedVerdictService, SentMessage,
};
