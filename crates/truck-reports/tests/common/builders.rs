//! Builders for test messages.

#![allow(dead_code)]

use std::collections::HashMap;

use base64::Engine;

use truck_reports::email::{BodyPart, Disposition, MailEnvelope, MailMessage, SectionPath};

/// Builds a `multipart/mixed` message: a text body at section 1 followed by
/// one base64 part per attachment at sections 2, 3, ...
pub struct MessageBuilder {
    uid: u32,
    subject: String,
    attachments: Vec<(Option<String>, Vec<u8>)>,
    inline: Vec<(String, Vec<u8>)>,
}

/// A built message plus the raw (still encoded) bytes of each part.
pub struct BuiltMessage {
    pub message: MailMessage,
    pub parts: HashMap<String, Vec<u8>>,
}

impl MessageBuilder {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            subject: format!("Report {}", uid),
            attachments: Vec::new(),
            inline: Vec::new(),
        }
    }

    pub fn attachment(mut self, filename: &str, data: &[u8]) -> Self {
        self.attachments
            .push((Some(filename.to_string()), data.to_vec()));
        self
    }

    /// An attachment part whose disposition carries no filename.
    pub fn unnamed_attachment(mut self, data: &[u8]) -> Self {
        self.attachments.push((None, data.to_vec()));
        self
    }

    /// An inline part, which is never extracted.
    pub fn inline(mut self, filename: &str, data: &[u8]) -> Self {
        self.inline.push((filename.to_string(), data.to_vec()));
        self
    }

    pub fn build(self) -> BuiltMessage {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut parts = HashMap::new();

        let body = b"See attached.".to_vec();
        parts.insert("1".to_string(), body.clone());
        let mut children = vec![BodyPart {
            section: SectionPath(vec![1]),
            mime_type: "text/plain".to_string(),
            disposition: None,
            encoding: "7BIT".to_string(),
            size: body.len() as u32,
            children: Vec::new(),
        }];

        let all = self
            .attachments
            .into_iter()
            .map(|(name, data)| ("attachment", name, data))
            .chain(
                self.inline
                    .into_iter()
                    .map(|(name, data)| ("inline", Some(name), data)),
            );

        for (index, (kind, filename, data)) in all.enumerate() {
            let section = SectionPath(vec![index as u32 + 2]);
            let encoded = engine.encode(&data).into_bytes();
            parts.insert(section.to_string(), encoded.clone());
            children.push(BodyPart {
                section,
                mime_type: "application/pdf".to_string(),
                disposition: Some(Disposition {
                    kind: kind.to_string(),
                    params: filename
                        .map(|f| vec![("filename".to_string(), f)])
                        .unwrap_or_default(),
                }),
                encoding: "base64".to_string(),
                size: encoded.len() as u32,
                children: Vec::new(),
            });
        }

        BuiltMessage {
            message: MailMessage {
                uid: self.uid,
                envelope: MailEnvelope {
                    from: Some("dispatch@fleet.example".to_string()),
                    to: Some("reports@fleet.example".to_string()),
                    subject: Some(self.subject),
                    date: Some("Mon, 12 Jan 2026 08:00:00 +0000".to_string()),
                },
                structure: BodyPart {
                    section: SectionPath::root(),
                    mime_type: "multipart/mixed".to_string(),
                    disposition: None,
                    encoding: "7BIT".to_string(),
                    size: 0,
                    children,
                },
            },
            parts,
        }
    }
}
