//! IMAP implementation of the mailbox session.

use std::net::SocketAddr;

use async_imap::error::Error as ImapError;
use async_imap::imap_proto::types::{
    Address, BodyContentCommon, BodyStructure, ContentEncoding, ContentType, Envelope,
    SectionPath as ImapSectionPath,
};
use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::Either;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::config::ImapConfig;

use super::error::{EmailError, Result};
use super::message::{BodyPart, Disposition, MailEnvelope, MailMessage, SectionPath};
use super::session::{FolderInfo, MailboxConnector, MailboxSession};

type AsyncTcpStream = async_io::Async<std::net::TcpStream>;
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Transport under the IMAP session: TLS unless the config opts out.
type MailStream = Either<TlsStream, AsyncTcpStream>;

/// Opens [`ImapClient`] sessions from an [`ImapConfig`].
pub struct ImapConnector {
    config: ImapConfig,
}

impl ImapConnector {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self) -> Result<Box<dyn MailboxSession>> {
        let client = ImapClient::connect(&self.config).await?;
        Ok(Box::new(client))
    }
}

/// Holds the connection and whether a command's response is still being
/// read off it.
///
/// A caller that is cancelled mid-response leaves `busy` set. The unread
/// remainder would be picked up by the next command, so the next caller
/// drops the connection instead of using it.
struct SessionSlot<S> {
    session: Option<S>,
    busy: bool,
}

impl<S> SessionSlot<S> {
    fn new(session: S) -> Self {
        Self {
            session: Some(session),
            busy: false,
        }
    }

    /// Marks a command as started and hands out the connection.
    fn begin(&mut self) -> Result<&mut S> {
        if self.busy {
            if self.session.take().is_some() {
                warn!("IMAP command was interrupted mid-response; discarding the connection");
            }
            return Err(EmailError::ConnectionFailed(
                "connection discarded after an interrupted command".to_string(),
            ));
        }
        if self.session.is_none() {
            return Err(not_connected());
        }
        self.busy = true;
        self.session.as_mut().ok_or_else(not_connected)
    }

    /// Marks the running command's response as fully read.
    fn finish(&mut self) {
        self.busy = false;
    }
}

/// An authenticated IMAP session.
///
/// IMAP allows one command in flight per connection, so concurrent callers
/// queue on the inner mutex.
pub struct ImapClient {
    slot: Mutex<SessionSlot<Session<MailStream>>>,
}

impl ImapClient {
    /// Connects and logs in. Name resolution, TCP connect, TLS handshake
    /// and LOGIN together are bounded by `authTimeoutSecs`.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let password = password_for(config)?;
        let limit = config.auth_timeout();

        let session = tokio::time::timeout(limit, establish(config, &password))
            .await
            .map_err(|_| {
                EmailError::ConnectionFailed(format!(
                    "timed out after {}s connecting to {}:{}",
                    limit.as_secs(),
                    config.host,
                    config.port
                ))
            })??;

        info!("Authenticated to IMAP server {} as {}", config.host, config.username);
        Ok(Self {
            slot: Mutex::new(SessionSlot::new(session)),
        })
    }
}

fn password_for(config: &ImapConfig) -> Result<SecretString> {
    if config.password_insecure.is_some() {
        warn!(
            "Using inline IMAP password from config. \
             Consider passwordEnvVar or passwordFile instead."
        );
    }
    crate::secrets::resolve_secret(
        config.password_insecure.as_deref(),
        config.password_file.as_deref(),
        config.password_env_var.as_deref(),
    )
    .map_err(|e| EmailError::CredentialsNotFound(e.to_string()))
}

async fn establish(config: &ImapConfig, password: &SecretString) -> Result<Session<MailStream>> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Connecting to IMAP server at {}", addr);

    let std_stream = connect_tcp(&addr)
        .await?
        .into_std()
        .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;
    let tcp_stream =
        async_io::Async::new(std_stream).map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

    let stream = if config.use_tls {
        let tls_stream = TlsConnector::new().connect(&config.host, tcp_stream).await?;
        Either::Left(tls_stream)
    } else {
        warn!("TLS disabled for {}; credentials are sent in clear text", addr);
        Either::Right(tcp_stream)
    };

    async_imap::Client::new(stream)
        .login(&config.username, password.expose_secret())
        .await
        .map_err(|(e, _)| EmailError::AuthenticationFailed(e.to_string()))
}

/// Tries each resolved address in turn. Resolution and connects are async,
/// so the caller's timeout bounds the whole attempt.
async fn connect_tcp(addr: &str) -> Result<tokio::net::TcpStream> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| EmailError::ConnectionFailed(format!("cannot resolve {}: {}", addr, e)))?
        .collect();

    let mut last_error = None;
    for candidate in candidates {
        match tokio::net::TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", candidate, e);
                last_error = Some(e);
            }
        }
    }

    Err(EmailError::ConnectionFailed(match last_error {
        Some(e) => e.to_string(),
        None => format!("{} resolved to no addresses", addr),
    }))
}

fn not_connected() -> EmailError {
    EmailError::ConnectionFailed("Not connected".to_string())
}

/// Maps a failed SELECT. A tagged NO means the server refused the mailbox.
fn select_error(folder: &str, error: ImapError) -> EmailError {
    match error {
        ImapError::No(_) => EmailError::FolderNotFound(folder.to_string()),
        other => EmailError::ProtocolError(other.to_string()),
    }
}

/// IMAP SEARCH date format, e.g. `15-Jan-2024`.
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

async fn select_folder(session: &mut Session<MailStream>, folder: &str) -> Result<FolderInfo> {
    info!("Selecting folder: {}", folder);
    let mailbox = session
        .select(folder)
        .await
        .map_err(|e| select_error(folder, e))?;

    debug!(
        "Folder '{}' holds {} messages, UIDVALIDITY {:?}",
        folder, mailbox.exists, mailbox.uid_validity
    );
    Ok(FolderInfo {
        name: folder.to_string(),
        uid_validity: mailbox.uid_validity.unwrap_or(0),
    })
}

async fn search_messages(
    session: &mut Session<MailStream>,
    since: NaiveDate,
) -> Result<Vec<MailMessage>> {
    let query = format!("SINCE {}", imap_date(since));
    debug!("Searching with query: {}", query);

    let uids = session
        .uid_search(&query)
        .await
        .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let mut sorted: Vec<u32> = uids.into_iter().collect();
    sorted.sort_unstable();
    let uid_set = sorted
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut messages = Vec::with_capacity(sorted.len());
    let mut fetches = session
        .uid_fetch(&uid_set, "(UID ENVELOPE BODYSTRUCTURE)")
        .await
        .map_err(|e| EmailError::ProtocolError(e.to_string()))?;

    while let Some(item) = fetches.next().await {
        let fetch = item.map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        let uid = fetch.uid.ok_or_else(|| {
            EmailError::ProtocolError("FETCH response without UID".to_string())
        })?;
        let structure = fetch.bodystructure().ok_or_else(|| {
            EmailError::ProtocolError(format!("No BODYSTRUCTURE for message {}", uid))
        })?;

        messages.push(MailMessage {
            uid,
            envelope: fetch.envelope().map(convert_envelope).unwrap_or_default(),
            structure: convert_structure(structure),
        });
    }
    drop(fetches);

    messages.sort_by_key(|m| m.uid);
    debug!("Found {} messages since {}", messages.len(), since);
    Ok(messages)
}

async fn fetch_section(
    session: &mut Session<MailStream>,
    uid: u32,
    section: &SectionPath,
) -> Result<Vec<u8>> {
    let fetch_failed = |reason: String| EmailError::FetchFailed {
        uid,
        section: section.to_string(),
        reason,
    };

    // PEEK keeps the \Seen flag untouched.
    let query = format!("(UID BODY.PEEK[{}])", section);
    let wanted = ImapSectionPath::Part(section.0.clone(), None);

    let mut fetches = session
        .uid_fetch(uid.to_string(), &query)
        .await
        .map_err(|e| fetch_failed(e.to_string()))?;

    let mut data = None;
    while let Some(item) = fetches.next().await {
        let fetch = item.map_err(|e| fetch_failed(e.to_string()))?;
        if !is_response_for(uid, fetch.uid) {
            warn!(
                "Ignoring FETCH response for uid {:?} while fetching uid {}",
                fetch.uid, uid
            );
            continue;
        }
        if data.is_none() {
            data = fetch.section(&wanted).map(|bytes| bytes.to_vec());
        }
    }
    drop(fetches);

    data.ok_or_else(|| fetch_failed("server returned no data for section".to_string()))
}

/// Only a response carrying the requested UID may supply its bytes.
fn is_response_for(requested: u32, response_uid: Option<u32>) -> bool {
    response_uid == Some(requested)
}

async fn store_label(session: &mut Session<MailStream>, uid: u32, label: &str) -> Result<()> {
    let command = format!("+X-GM-LABELS (\"{}\")", label.replace('"', ""));
    let mut updates = session
        .uid_store(uid.to_string(), &command)
        .await
        .map_err(|e| EmailError::ProtocolError(e.to_string()))?;
    while let Some(item) = updates.next().await {
        item.map_err(|e| EmailError::ProtocolError(e.to_string()))?;
    }
    Ok(())
}

#[async_trait]
impl MailboxSession for ImapClient {
    async fn open_folder(&self, folder: &str) -> Result<FolderInfo> {
        let mut slot = self.slot.lock().await;
        let result = select_folder(slot.begin()?, folder).await;
        slot.finish();
        result
    }

    async fn search_since(&self, since: NaiveDate) -> Result<Vec<MailMessage>> {
        let mut slot = self.slot.lock().await;
        let result = search_messages(slot.begin()?, since).await;
        slot.finish();
        result
    }

    async fn fetch_part(&self, uid: u32, section: &SectionPath) -> Result<Vec<u8>> {
        let mut slot = self.slot.lock().await;
        let result = fetch_section(slot.begin()?, uid, section).await;
        slot.finish();
        result
    }

    async fn tag_message(&self, uid: u32, label: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let result = store_label(slot.begin()?, uid, label).await;
        slot.finish();
        result
    }

    async fn logout(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let interrupted = slot.busy;
        let Some(mut session) = slot.session.take() else {
            return Ok(());
        };
        if interrupted {
            warn!("Closing IMAP connection without LOGOUT after an interrupted command");
            return Ok(());
        }

        info!("Disconnecting from IMAP server");
        session
            .logout()
            .await
            .map_err(|e| EmailError::ProtocolError(e.to_string()))
    }
}

impl Drop for ImapClient {
    fn drop(&mut self) {
        if self.slot.get_mut().session.is_some() {
            warn!("ImapClient dropped without explicit logout - session will be closed");
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn format_address(addr: &Address<'_>) -> String {
    let mailbox = addr.mailbox.as_deref().map(lossy).unwrap_or_default();
    let host = addr.host.as_deref().map(lossy).unwrap_or_default();
    let address = if host.is_empty() {
        mailbox
    } else {
        format!("{}@{}", mailbox, host)
    };
    match addr.name.as_deref().map(lossy) {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, address),
        _ => address,
    }
}

fn first_address(list: &Option<Vec<Address<'_>>>) -> Option<String> {
    list.as_ref()
        .and_then(|addrs| addrs.first())
        .map(format_address)
}

fn convert_envelope(envelope: &Envelope<'_>) -> MailEnvelope {
    MailEnvelope {
        from: first_address(&envelope.from),
        to: first_address(&envelope.to),
        subject: envelope.subject.as_deref().map(lossy),
        date: envelope.date.as_deref().map(lossy),
    }
}

/// Converts a server BODYSTRUCTURE into the owned part tree, assigning IMAP
/// section numbers on the way down.
pub(crate) fn convert_structure(structure: &BodyStructure<'_>) -> BodyPart {
    nested(structure, &SectionPath::root())
}

/// A body that sits directly under `prefix` (the message root or a
/// `message/rfc822` part). Multipart bodies share the prefix; single-part
/// bodies are addressed as `<prefix>.1`.
fn nested(structure: &BodyStructure<'_>, prefix: &SectionPath) -> BodyPart {
    match structure {
        BodyStructure::Multipart { .. } => convert(structure, prefix.clone()),
        _ => convert(structure, prefix.child(1)),
    }
}

fn convert(structure: &BodyStructure<'_>, section: SectionPath) -> BodyPart {
    match structure {
        BodyStructure::Multipart { common, bodies, .. } => {
            let children = bodies
                .iter()
                .zip(1u32..)
                .map(|(body, index)| convert(body, section.child(index)))
                .collect();
            BodyPart {
                mime_type: mime_type(&common.ty),
                disposition: disposition(common),
                encoding: "7BIT".to_string(),
                size: 0,
                children,
                section,
            }
        }
        BodyStructure::Basic { common, other, .. } | BodyStructure::Text { common, other, .. } => {
            BodyPart {
                mime_type: mime_type(&common.ty),
                disposition: disposition(common),
                encoding: encoding_name(&other.transfer_encoding),
                size: other.octets,
                children: Vec::new(),
                section,
            }
        }
        BodyStructure::Message {
            common,
            other,
            body,
            ..
        } => BodyPart {
            mime_type: mime_type(&common.ty),
            disposition: disposition(common),
            encoding: encoding_name(&other.transfer_encoding),
            size: other.octets,
            children: vec![nested(body, &section)],
            section,
        },
    }
}

fn mime_type(ty: &ContentType<'_>) -> String {
    format!("{}/{}", ty.ty, ty.subtype).to_ascii_lowercase()
}

fn disposition(common: &BodyContentCommon<'_>) -> Option<Disposition> {
    common.disposition.as_ref().map(|d| Disposition {
        kind: d.ty.to_string(),
        params: d
            .params
            .as_ref()
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn encoding_name(encoding: &ContentEncoding<'_>) -> String {
    match encoding {
        ContentEncoding::SevenBit => "7BIT".to_string(),
        ContentEncoding::EightBit => "8BIT".to_string(),
        ContentEncoding::Binary => "BINARY".to_string(),
        ContentEncoding::Base64 => "BASE64".to_string(),
        ContentEncoding::QuotedPrintable => "QUOTED-PRINTABLE".to_string(),
        ContentEncoding::Other(name) => name.to_string(),
    }
}
