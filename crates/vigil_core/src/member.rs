//! Guild member snapshot used for permission decisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A member as seen at the moment an action was requested.
///
/// The platform adapter fills this from the interaction or message event, so
/// the cores never have to call back into the platform to check roles.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_getters::Getters,
    derive_setters::Setters,
    derive_new::new,
)]
#[setters(prefix = "with_")]
pub struct MemberInfo {
    /// User ID
    user_id: u64,
    /// Display name (nickname or global name)
    #[new(into)]
    display_name: String,
    /// Role IDs held in the guild
    #[new(default)]
    role_ids: BTreeSet<u64>,
    /// Whether the member holds the administrator permission
    #[new(default)]
    is_administrator: bool,
    /// Whether the account is a bot
    #[new(default)]
    is_bot: bool,
}

impl MemberInfo {
    /// True if the member holds at least one of `roles`.
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a u64>) -> bool {
        roles.into_iter().any(|role| self.role_ids.contains(role))
    }

    /// Platform mention string.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}
