//! [`MessageLog`] – user-facing messages.
//!
//! Load faults and plugin faults are surfaced to the user once, as entries in
//! this log.  Every entry is mirrored to `tracing` at the matching level.

use atsbridge_types::{BridgeError, Message, MessageSeverity};
use tracing::{error, info, warn};

/// Ordered list of user-facing messages.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: MessageSeverity, text: impl Into<String>) {
        let message = Message::new(severity, text);
        match severity {
            MessageSeverity::Information => info!(id = %message.id, "{}", message.text),
            MessageSeverity::Warning => warn!(id = %message.id, "{}", message.text),
            MessageSeverity::Error => error!(id = %message.id, "{}", message.text),
        }
        self.entries.push(message);
    }

    /// Record `err` with the severity its kind calls for.
    pub fn push_error(&mut self, err: &BridgeError) {
        let severity = match err {
            BridgeError::UnsupportedPlatform(_) => MessageSeverity::Warning,
            _ => MessageSeverity::Error,
        };
        self.push(severity, err.to_string());
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Remove and return every entry.
    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.entries)
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|m| m.severity == MessageSeverity::Error)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_are_warnings() {
        let mut log = MessageLog::new();
        log.push_error(&BridgeError::UnsupportedPlatform("ats.dll".to_string()));
        assert_eq!(log.entries()[0].severity, MessageSeverity::Warning);
        assert!(!log.has_errors());
        assert!(log.entries()[0].text.contains("32-bit Microsoft Windows"));
    }

    #[test]
    fn drain_empties_the_log() {
        let mut log = MessageLog::new();
        log.push(MessageSeverity::Information, "loaded");
        log.push_error(&BridgeError::NotActive);
        assert!(log.has_errors());
        assert_eq!(log.drain().len(), 2);
        assert!(log.is_empty());
    }
}
