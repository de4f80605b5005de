//! Mailbox message model: envelope metadata and the body structure tree.

use std::fmt;

/// Header metadata fetched alongside the structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailEnvelope {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

/// One message returned by a mailbox search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub uid: u32,
    pub envelope: MailEnvelope,
    pub structure: BodyPart,
}

/// IMAP section path of a body part, e.g. `[2, 1]` for `BODY[2.1]`.
///
/// The root container of a multipart message has an empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SectionPath(pub Vec<u32>);

impl SectionPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: u32) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&joined)
    }
}

/// Content-Disposition of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub kind: String,
    pub params: Vec<(String, String)>,
}

impl Disposition {
    pub fn is_attachment(&self) -> bool {
        self.kind.eq_ignore_ascii_case("attachment")
    }

    /// The `filename` parameter, matched case-insensitively.
    pub fn filename(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("filename"))
            .map(|(_, value)| value.as_str())
    }
}

/// A node in a message's body structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    pub section: SectionPath,
    /// Lowercased `type/subtype`.
    pub mime_type: String,
    pub disposition: Option<Disposition>,
    /// Transfer encoding exactly as the server reported it.
    pub encoding: String,
    pub size: u32,
    pub children: Vec<BodyPart>,
}

impl BodyPart {
    /// Flattens the tree depth-first, parents before their children.
    pub fn flatten(&self) -> Vec<&BodyPart> {
        let mut parts = Vec::new();
        self.collect_into(&mut parts);
        parts
    }

    fn collect_into<'a>(&'a self, parts: &mut Vec<&'a BodyPart>) {
        parts.push(self);
        for child in &self.children {
            child.collect_into(parts);
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .map(Disposition::is_attachment)
            .unwrap_or(false)
    }

    pub fn filename(&self) -> Option<&str> {
        self.disposition.as_ref().and_then(Disposition::filename)
    }
}
