//! Stable routing ids for ticket widgets.
//!
//! Every button, select and modal the ticket subsystem emits carries one of
//! these ids. The platform adapter hands the id back verbatim and
//! [`TicketWidget::parse`] turns it into a typed route.

use std::fmt;

const PREFIX: &str = "ticket";

/// A routed ticket widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketWidget {
    /// Panel entry button
    Panel,
    /// Anonymous toggle on the category picker
    AnonymousToggle {
        /// Form session
        session: String,
    },
    /// Category select on the picker
    Category {
        /// Form session
        session: String,
    },
    /// Creation form modal for one step
    Form {
        /// Form session
        session: String,
        /// Zero-based step
        step: usize,
    },
    /// "Continue" button between form steps
    FormContinue {
        /// Form session
        session: String,
        /// Step the button opens
        step: usize,
    },
    /// Control panel close button
    Close {
        /// Ticket id
        ticket_id: String,
    },
    /// Modal asking for a close reason
    CloseReason {
        /// Ticket id
        ticket_id: String,
    },
    /// Confirm button of a pending close
    CloseConfirm {
        /// Correlation id of the pending close
        correlation: String,
    },
    /// Cancel button of a pending close
    CloseCancel {
        /// Correlation id of the pending close
        correlation: String,
    },
    /// Control panel transcript button
    Transcript {
        /// Ticket id
        ticket_id: String,
    },
    /// Control panel claim button
    Claim {
        /// Ticket id
        ticket_id: String,
    },
    /// Control panel tag button
    Tag {
        /// Ticket id
        ticket_id: String,
    },
    /// Tag select menu
    TagSelect {
        /// Ticket id
        ticket_id: String,
    },
    /// Star button in the rating DM
    Rate {
        /// Guild the ticket belonged to
        guild_id: u64,
        /// Ticket id
        ticket_id: String,
        /// One to five
        stars: u8,
    },
    /// Survey button and survey modal
    Survey {
        /// Guild the ticket belonged to
        guild_id: u64,
        /// Ticket id
        ticket_id: String,
    },
}

impl TicketWidget {
    /// Parse a routing id; `None` if it is not a ticket widget.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_ticket::TicketWidget;
    ///
    /// let widget = TicketWidget::parse("ticket:claim:abc").unwrap();
    /// assert_eq!(widget, TicketWidget::Claim { ticket_id: "abc".into() });
    /// assert_eq!(widget.to_string(), "ticket:claim:abc");
    /// assert!(TicketWidget::parse("scan:upload").is_none());
    /// ```
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(':');
        if parts.next()? != PREFIX {
            return None;
        }
        let action = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        let owned = |i: usize| rest.get(i).filter(|s| !s.is_empty()).map(|s| s.to_string());

        let widget = match (action, rest.len()) {
            ("panel", 0) => TicketWidget::Panel,
            ("anon", 1) => TicketWidget::AnonymousToggle { session: owned(0)? },
            ("category", 1) => TicketWidget::Category { session: owned(0)? },
            ("form", 2) => TicketWidget::Form {
                session: owned(0)?,
                step: rest[1].parse().ok()?,
            },
            ("form-next", 2) => TicketWidget::FormContinue {
                session: owned(0)?,
                step: rest[1].parse().ok()?,
            },
            ("close", 1) => TicketWidget::Close { ticket_id: owned(0)? },
            ("close-reason", 1) => TicketWidget::CloseReason { ticket_id: owned(0)? },
            ("close-confirm", 1) => TicketWidget::CloseConfirm {
                correlation: owned(0)?,
            },
            ("close-cancel", 1) => TicketWidget::CloseCancel {
                correlation: owned(0)?,
            },
            ("transcript", 1) => TicketWidget::Transcript { ticket_id: owned(0)? },
            ("claim", 1) => TicketWidget::Claim { ticket_id: owned(0)? },
            ("tag", 1) => TicketWidget::Tag { ticket_id: owned(0)? },
            ("tag-select", 1) => TicketWidget::TagSelect { ticket_id: owned(0)? },
            ("rate", 3) => TicketWidget::Rate {
                guild_id: rest[0].parse().ok()?,
                ticket_id: owned(1)?,
                stars: rest[2].parse().ok()?,
            },
            ("survey", 2) => TicketWidget::Survey {
                guild_id: rest[0].parse().ok()?,
                ticket_id: owned(1)?,
            },
            _ => return None,
        };
        Some(widget)
    }
}

impl fmt::Display for TicketWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketWidget::Panel => write!(f, "{}:panel", PREFIX),
            TicketWidget::AnonymousToggle { session } => write!(f, "{}:anon:{}", PREFIX, session),
            TicketWidget::Category { session } => write!(f, "{}:category:{}", PREFIX, session),
            TicketWidget::Form { session, step } => {
                write!(f, "{}:form:{}:{}", PREFIX, session, step)
            }
            TicketWidget::FormContinue { session, step } => {
                write!(f, "{}:form-next:{}:{}", PREFIX, session, step)
            }
            TicketWidget::Close { ticket_id } => write!(f, "{}:close:{}", PREFIX, ticket_id),
            TicketWidget::CloseReason { ticket_id } => {
                write!(f, "{}:close-reason:{}", PREFIX, ticket_id)
            }
            TicketWidget::CloseConfirm { correlation } => {
                write!(f, "{}:close-confirm:{}", PREFIX, correlation)
            }
            TicketWidget::CloseCancel { correlation } => {
                write!(f, "{}:close-cancel:{}", PREFIX, correlation)
            }
            TicketWidget::Transcript { ticket_id } => {
                write!(f, "{}:transcript:{}", PREFIX, ticket_id)
            }
            TicketWidget::Claim { ticket_id } => write!(f, "{}:claim:{}", PREFIX, ticket_id),
            TicketWidget::Tag { ticket_id } => write!(f, "{}:tag:{}", PREFIX, ticket_id),
            TicketWidget::TagSelect { ticket_id } => {
                write!(f, "{}:tag-select:{}", PREFIX, ticket_id)
            }
            TicketWidget::Rate {
                guild_id,
                ticket_id,
                stars,
            } => write!(f, "{}:rate:{}:{}:{}", PREFIX, guild_id, ticket_id, stars),
            TicketWidget::Survey {
                guild_id,
                ticket_id,
            } => write!(f, "{}:survey:{}:{}", PREFIX, guild_id, ticket_id),
        }
    }
}

impl From<TicketWidget> for String {
    fn from(widget: TicketWidget) -> Self {
        widget.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_survive_formatting() {
        let widgets = [
            TicketWidget::Panel,
            TicketWidget::Form {
                session: "s1".into(),
                step: 2,
            },
            TicketWidget::CloseConfirm {
                correlation: "c-9".into(),
            },
            TicketWidget::Rate {
                guild_id: 77,
                ticket_id: "0b7e-11".into(),
                stars: 4,
            },
            TicketWidget::Survey {
                guild_id: 77,
                ticket_id: "0b7e-11".into(),
            },
        ];
        for widget in widgets {
            assert_eq!(TicketWidget::parse(&widget.to_string()), Some(widget));
        }
    }

    #[test]
    fn test_malformed_ids_are_rejected() {
        assert!(TicketWidget::parse("ticket").is_none());
        assert!(TicketWidget::parse("ticket:close:").is_none());
        assert!(TicketWidget::parse("ticket:rate:abc:id:5").is_none());
        assert!(TicketWidget::parse("ticket:form:s:x").is_none());
        assert!(TicketWidget::parse("ticket:panel:extra").is_none());
        assert!(TicketWidget::parse("scan:history:0").is_none());
    }
}
