//! Attachment extraction from a message's body structure.

use log::debug;

use super::error::Result;
use super::message::{MailMessage, SectionPath};
use super::session::MailboxSession;
use super::transfer::TransferEncoding;

/// A part flagged `Content-Disposition: attachment`, bytes not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    pub uid: u32,
    pub section: SectionPath,
    pub filename: Option<String>,
    pub encoding: TransferEncoding,
}

/// An attachment with its decoded content.
#[derive(Debug, Clone)]
pub struct ExtractedAttachment {
    /// UID of the message this attachment came from.
    pub uid: u32,
    pub section: SectionPath,
    /// Filename exactly as the disposition reported it.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Lists the attachment parts of `message` in depth-first order.
pub fn attachment_parts(message: &MailMessage) -> Vec<AttachmentPart> {
    message
        .structure
        .flatten()
        .into_iter()
        .filter(|part| part.is_attachment())
        .map(|part| AttachmentPart {
            uid: message.uid,
            section: part.section.clone(),
            filename: part.filename().map(str::to_string),
            encoding: TransferEncoding::parse(&part.encoding),
        })
        .collect()
}

/// Fetches one part through the session and decodes it.
pub async fn fetch_attachment(
    session: &dyn MailboxSession,
    part: &AttachmentPart,
) -> Result<ExtractedAttachment> {
    let raw = session.fetch_part(part.uid, &part.section).await?;
    let data = part.encoding.decode(&raw)?;

    debug!(
        "Fetched uid {} part {} ({} bytes, {})",
        part.uid,
        part.section,
        data.len(),
        part.encoding
    );

    Ok(ExtractedAttachment {
        uid: part.uid,
        section: part.section.clone(),
        filename: part.filename.clone(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::error::EmailError;
    use crate::email::message::{BodyPart, Disposition, MailEnvelope};
    use crate::email::session::FolderInfo;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct StaticParts(HashMap<(u32, String), Vec<u8>>);

    #[async_trait]
    impl MailboxSession for StaticParts {
        async fn open_folder(&self, folder: &str) -> Result<FolderInfo> {
            Ok(FolderInfo {
                name: folder.to_string(),
                uid_validity: 1,
            })
        }

        async fn search_since(&self, _since: NaiveDate) -> Result<Vec<MailMessage>> {
            Ok(Vec::new())
        }

        async fn fetch_part(&self, uid: u32, section: &SectionPath) -> Result<Vec<u8>> {
            self.0
                .get(&(uid, section.to_string()))
                .cloned()
                .ok_or_else(|| EmailError::FetchFailed {
                    uid,
                    section: section.to_string(),
                    reason: "no such part".to_string(),
                })
        }

        async fn tag_message(&self, _uid: u32, _label: &str) -> Result<()> {
            Ok(())
        }

        async fn logout(&self) -> Result<()> {
            Ok(())
        }
    }

    fn part(section: &[u32], kind: Option<&str>, filename: Option<&str>, enc: &str) -> BodyPart {
        BodyPart {
            section: SectionPath(section.to_vec()),
            mime_type: "application/octet-stream".to_string(),
            disposition: kind.map(|k| Disposition {
                kind: k.to_string(),
                params: filename
                    .map(|f| vec![("filename".to_string(), f.to_string())])
                    .unwrap_or_default(),
            }),
            encoding: enc.to_string(),
            size: 0,
            children: Vec::new(),
        }
    }

    fn message() -> MailMessage {
        let mut nested = part(&[3], None, None, "7bit");
        nested.mime_type = "multipart/mixed".to_string();
        nested.children = vec![
            part(&[3, 1], Some("attachment"), Some("b_56_78.xls"), "quoted-printable"),
            part(&[3, 2], Some("inline"), Some("logo.png"), "base64"),
        ];

        let mut root = part(&[], None, None, "7bit");
        root.mime_type = "multipart/mixed".to_string();
        root.children = vec![
            part(&[1], None, None, "7bit"),
            part(&[2], Some("ATTACHMENT"), Some("a_12_34.pdf"), "Base64"),
            nested,
            part(&[4], Some("attachment"), None, "binary"),
        ];

        MailMessage {
            uid: 8,
            envelope: MailEnvelope::default(),
            structure: root,
        }
    }

    #[test]
    fn test_attachment_parts_in_depth_first_order() {
        let parts = attachment_parts(&message());
        let sections: Vec<String> = parts.iter().map(|p| p.section.to_string()).collect();
        assert_eq!(sections, vec!["2", "3.1", "4"]);

        assert_eq!(parts[0].encoding, TransferEncoding::Base64);
        assert_eq!(parts[0].filename.as_deref(), Some("a_12_34.pdf"));
        assert_eq!(parts[1].encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(parts[2].filename, None);
        assert!(parts.iter().all(|p| p.uid == 8));
    }

    #[test]
    fn test_message_without_attachments() {
        let msg = MailMessage {
            uid: 1,
            envelope: MailEnvelope::default(),
            structure: part(&[1], None, None, "7bit"),
        };
        assert!(attachment_parts(&msg).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_attachment_decodes_each_part() {
        let mut data = HashMap::new();
        data.insert((8, "2".to_string()), b"JVBERi0x\r\nLjQ=".to_vec());
        data.insert((8, "3.1".to_string()), b"caf=C3=A9".to_vec());
        data.insert((8, "4".to_string()), vec![0, 1, 2]);
        let session = StaticParts(data);

        let parts = attachment_parts(&message());
        let mut extracted = Vec::new();
        for part in &parts {
            extracted.push(fetch_attachment(&session, part).await.unwrap());
        }

        assert_eq!(extracted[0].data, b"%PDF-1.4");
        assert_eq!(extracted[0].section, SectionPath(vec![2]));
        assert_eq!(extracted[0].filename.as_deref(), Some("a_12_34.pdf"));
        assert_eq!(extracted[1].data, "café".as_bytes());
        assert_eq!(extracted[2].data, vec![0, 1, 2]);
        assert_eq!(extracted[2].filename, None);
    }

    #[tokio::test]
    async fn test_fetch_attachment_failure_propagates() {
        let session = StaticParts(HashMap::new());
        let parts = attachment_parts(&message());
        let err = fetch_attachment(&session, &parts[1]).await.unwrap_err();
        assert!(matches!(err, EmailError::FetchFailed { uid: 8, ref section, .. } if section == "3.1"));
    }

    #[tokio::test]
    async fn test_fetch_attachment_bad_base64() {
        let mut data = HashMap::new();
        data.insert((8, "2".to_string()), b"@@not base64@@".to_vec());
        let session = StaticParts(data);

        let parts = attachment_parts(&message());
        let err = fetch_attachment(&session, &parts[0]).await.unwrap_err();
        assert!(matches!(err, EmailError::DecodeFailed { .. }));
    }
}
