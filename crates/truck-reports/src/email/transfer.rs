//! Content-Transfer-Encoding normalization and decoding.

use std::fmt;

use base64::Engine;
use mail_parser::{MessageParser, PartType};

use super::error::{EmailError, Result};

/// A normalized transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    SevenBit,
    EightBit,
    Binary,
    /// Anything the server reported that we do not decode, uppercased.
    Other(String),
}

impl TransferEncoding {
    /// Normalizes a server-reported encoding name. Matching is
    /// case-insensitive, so `base64`, `Base64` and `BASE64` are all the same.
    pub fn parse(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        match upper.as_str() {
            "BASE64" => TransferEncoding::Base64,
            "QUOTED-PRINTABLE" => TransferEncoding::QuotedPrintable,
            "7BIT" | "" => TransferEncoding::SevenBit,
            "8BIT" => TransferEncoding::EightBit,
            "BINARY" => TransferEncoding::Binary,
            _ => TransferEncoding::Other(upper),
        }
    }

    /// Decodes part bytes as fetched from the server.
    ///
    /// Unknown encodings are passed through untouched.
    pub fn decode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            TransferEncoding::Base64 => decode_base64(raw),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(raw),
            TransferEncoding::SevenBit
            | TransferEncoding::EightBit
            | TransferEncoding::Binary
            | TransferEncoding::Other(_) => Ok(raw.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEncoding::Base64 => f.write_str("BASE64"),
            TransferEncoding::QuotedPrintable => f.write_str("QUOTED-PRINTABLE"),
            TransferEncoding::SevenBit => f.write_str("7BIT"),
            TransferEncoding::EightBit => f.write_str("8BIT"),
            TransferEncoding::Binary => f.write_str("BINARY"),
            TransferEncoding::Other(name) => f.write_str(name),
        }
    }
}

fn decode_base64(raw: &[u8]) -> Result<Vec<u8>> {
    // Servers return the encoded body with its original line breaks.
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD
        .decode(&compact)
        .map_err(|e| EmailError::DecodeFailed {
            encoding: TransferEncoding::Base64.to_string(),
            reason: e.to_string(),
        })
}

/// Decodes quoted-printable through mail-parser by presenting the bytes as
/// the body of a single binary MIME entity.
fn decode_quoted_printable(raw: &[u8]) -> Result<Vec<u8>> {
    let mut entity = Vec::with_capacity(raw.len() + 96);
    entity.extend_from_slice(
        b"Content-Type: application/octet-stream\r\n\
          Content-Transfer-Encoding: quoted-printable\r\n\r\n",
    );
    entity.extend_from_slice(raw);

    let message = MessageParser::default().parse(&entity).ok_or_else(|| {
        EmailError::DecodeFailed {
            encoding: TransferEncoding::QuotedPrintable.to_string(),
            reason: "not a parseable MIME entity".to_string(),
        }
    })?;

    match message.parts.first().map(|part| &part.body) {
        Some(PartType::Binary(data)) | Some(PartType::InlineBinary(data)) => Ok(data.to_vec()),
        Some(PartType::Text(text)) | Some(PartType::Html(text)) => Ok(text.as_bytes().to_vec()),
        _ => Ok(Vec::new()),
    }
}
