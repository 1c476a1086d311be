//! Inbound email representation and address handling.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// One inbound email under consideration.
///
/// `id` is the transport's stable message identifier; it doubles as the
/// workspace key for the message's whole walk through the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Stable, unique message identifier.
    pub id: String,
    /// Sender address as it appeared on the wire (may carry a display name).
    pub sender: String,
    /// `To` recipients.
    #[serde(default)]
    pub to: Vec<String>,
    /// `Cc` recipients.
    #[serde(default)]
    pub cc: Vec<String>,
    /// `Bcc` recipients.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Message id this one replies to, if any.
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Thread reference chain.
    #[serde(default)]
    pub references: Vec<String>,
}

impl EmailMessage {
    /// The sender's bare, normalized address.
    pub fn sender_address(&self) -> Result<String> {
        normalize_address(&self.sender)
    }

    /// Whether `address` (already normalized) appears as sender, cc, or
    /// bcc of this message.
    pub fn involves(&self, address: &str) -> bool {
        let matches = |raw: &String| {
            normalize_address(raw)
                .map(|a| a == address)
                .unwrap_or(false)
        };
        matches(&self.sender) || self.cc.iter().any(matches) || self.bcc.iter().any(matches)
    }

    /// Subject for a reply in this thread, defaulting when the original
    /// had none.
    pub fn reply_subject(&self) -> String {
        if self.subject.trim().is_empty() {
            "Meeting Coordination".to_string()
        } else {
            self.subject.clone()
        }
    }
}

/// Normalize a header address into a bare, lowercase address.
///
/// Accepts both `user@example.com` and `Name <User@Example.com>` forms.
pub fn normalize_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
        _ => trimmed,
    };
    let bare = bare.trim().to_ascii_lowercase();
    if bare.is_empty() || !bare.contains('@') {
        return Err(SchedulerError::InvalidAddress {
            value: raw.to_string(),
        });
    }
    Ok(bare)
}

/// Prefix `subject` with the reply marker, idempotently.
pub fn reply_prefixed(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.to_ascii_lowercase().starts_with("re:") {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            id: "<abc@mail>".into(),
            sender: "Alice Example <Alice@Example.com>".into(),
            to: vec!["bot@example.com".into()],
            cc: vec!["Bob <bob@example.com>".into()],
            bcc: vec![],
            subject: "Quick sync".into(),
            body: "Let's meet".into(),
            in_reply_to: None,
            references: vec!["<root@mail>".into()],
        }
    }

    #[test]
    fn normalizes_display_name_form() {
        assert_eq!(
            normalize_address("Alice Example <Alice@Example.com>").unwrap(),
            "alice@example.com"
        );
        assert_eq!(normalize_address("  BOB@x.io  ").unwrap(), "bob@x.io");
    }

    #[test]
    fn rejects_non_addresses() {
        assert!(normalize_address("not an address").is_err());
        assert!(normalize_address("").is_err());
        assert!(normalize_address("Name <>").is_err());
    }

    #[test]
    fn involves_checks_sender_cc_bcc() {
        let msg = message();
        assert!(msg.involves("alice@example.com"));
        assert!(msg.involves("bob@example.com"));
        // `to` does not count: the authorized user is matched as the
        // originator or a copied party, not as the mailbox owner.
        assert!(!msg.involves("bot@example.com"));
        assert!(!msg.involves("carol@example.com"));
    }

    #[test]
    fn reply_subject_defaults_when_empty() {
        let mut msg = message();
        assert_eq!(msg.reply_subject(), "Quick sync");
        msg.subject = "  ".into();
        assert_eq!(msg.reply_subject(), "Meeting Coordination");
    }

    #[test]
    fn reply_prefix_is_idempotent() {
        assert_eq!(reply_prefixed("Quick sync"), "Re: Quick sync");
        assert_eq!(reply_prefixed("Re: Quick sync"), "Re: Quick sync");
        assert_eq!(reply_prefixed("RE: Quick sync"), "RE: Quick sync");
    }
}
