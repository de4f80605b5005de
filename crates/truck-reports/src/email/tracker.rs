//! Filtering search results against already processed UIDs.

use std::collections::HashSet;

use log::debug;

use super::message::MailMessage;

/// Search results split by whether they were seen before.
#[derive(Debug, Default)]
pub struct Unprocessed {
    pub messages: Vec<MailMessage>,
    /// UIDs dropped because they were in the skip-set.
    pub skipped: Vec<u32>,
}

/// Drops every message whose UID is in `processed`, keeping the order of
/// the rest.
pub fn filter_unprocessed(messages: Vec<MailMessage>, processed: &HashSet<u32>) -> Unprocessed {
    let mut result = Unprocessed::default();
    for message in messages {
        if processed.contains(&message.uid) {
            result.skipped.push(message.uid);
        } else {
            result.messages.push(message);
        }
    }

    debug!(
        "Filtered {} UIDs, {} unprocessed",
        result.skipped.len() + result.messages.len(),
        result.messages.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::message::{BodyPart, MailEnvelope, SectionPath};

    fn message(uid: u32) -> MailMessage {
        MailMessage {
            uid,
            envelope: MailEnvelope::default(),
            structure: BodyPart {
                section: SectionPath(vec![1]),
                mime_type: "text/plain".to_string(),
                disposition: None,
                encoding: "7BIT".to_string(),
                size: 0,
                children: Vec::new(),
            },
        }
    }

    #[test]
    fn test_filter_unprocessed() {
        let messages = vec![message(7), message(8), message(9), message(10)];
        let result = filter_unprocessed(messages, &HashSet::from([7, 9]));

        let kept: Vec<u32> = result.messages.iter().map(|m| m.uid).collect();
        assert_eq!(kept, vec![8, 10]);
        assert_eq!(result.skipped, vec![7, 9]);
    }

    #[test]
    fn test_empty_skip_set_keeps_everything() {
        let result = filter_unprocessed(vec![message(1), message(2)], &HashSet::new());
        assert_eq!(result.messages.len(), 2);
        assert!(result.skipped.is_empty());
    }
}
