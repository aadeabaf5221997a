//! Routing ids for scan widgets.

use std::fmt;

const PREFIX: &str = "scan";

/// A routed scan widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanWidget {
    /// Panel button that waits for an upload
    Upload,
    /// The member's own history; `None` opens page one in a new message
    History {
        /// Page to show when paging
        page: Option<usize>,
    },
    /// Guild-wide history for scan admins
    AdminHistory {
        /// Page to show when paging
        page: Option<usize>,
    },
    /// Scanner settings overview
    Info,
    /// Full verdict for a record
    Details {
        /// Digest prefix of the record
        sha: String,
    },
    /// Remove a result card
    Delete {
        /// Member who requested the scan
        owner: u64,
    },
}

impl ScanWidget {
    /// Parse a routing id; `None` if it is not a scan widget.
    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.splitn(3, ':');
        if parts.next()? != PREFIX {
            return None;
        }
        let kind = parts.next()?;
        let arg = parts.next();
        let page = |arg: Option<&str>| match arg {
            None => Some(None),
            Some(n) => n.parse().ok().map(Some),
        };
        match (kind, arg) {
            ("upload", None) => Some(Self::Upload),
            ("info", None) => Some(Self::Info),
            ("history", arg) => page(arg).map(|page| Self::History { page }),
            ("adminhistory", arg) => page(arg).map(|page| Self::AdminHistory { page }),
            ("details", Some(sha)) if !sha.is_empty() => Some(Self::Details {
                sha: sha.to_string(),
            }),
            ("delete", Some(owner)) => owner.parse().ok().map(|owner| Self::Delete { owner }),
            _ => None,
        }
    }
}

impl fmt::Display for ScanWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "{}:upload", PREFIX),
            Self::Info => write!(f, "{}:info", PREFIX),
            Self::History { page: None } => write!(f, "{}:history", PREFIX),
            Self::History { page: Some(n) } => write!(f, "{}:history:{}", PREFIX, n),
            Self::AdminHistory { page: None } => write!(f, "{}:adminhistory", PREFIX),
            Self::AdminHistory { page: Some(n) } => write!(f, "{}:adminhistory:{}", PREFIX, n),
            Self::Details { sha } => write!(f, "{}:details:{}", PREFIX, sha),
            Self::Delete { owner } => write!(f, "{}:delete:{}", PREFIX, owner),
        }
    }
}

impl From<ScanWidget> for String {
    fn from(widget: ScanWidget) -> Self {
        widget.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_widget_survives_display_and_parse() {
        let widgets = [
            ScanWidget::Upload,
            ScanWidget::Info,
            ScanWidget::History { page: None },
            ScanWidget::History { page: Some(3) },
            ScanWidget::AdminHistory { page: Some(0) },
            ScanWidget::Details {
                sha: "0123456789abcdef".into(),
            },
            ScanWidget::Delete { owner: 42 },
        ];
        for widget in widgets {
            assert_eq!(ScanWidget::parse(&widget.to_string()), Some(widget));
        }
    }

    #[test]
    fn test_foreign_and_malformed_ids() {
        assert_eq!(ScanWidget::parse("ticket:panel"), None);
        assert_eq!(ScanWidget::parse("scan:history:x"), None);
        assert_eq!(ScanWidget::parse("scan:delete:"), None);
        assert_eq!(ScanWidget::parse("scan:upload:1"), None);
    }
}
