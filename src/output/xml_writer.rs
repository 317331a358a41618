//! Titanium Backup XML writer.
//!
//! Serializes the canonical conversation model into the `threads` schema the
//! restore tool expects: one `<thread>` per phone-network conversation, one
//! `<sms>` or `<mms>` element per message. Element and attribute names are
//! fixed by the schema; the document must stay well-formed even when
//! individual messages or attachments are skipped.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::DateTime;
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, warn};

use crate::error::{BackupError, Result};
use crate::fetch::MediaSource;
use crate::model::{Conversation, GaiaId, Message, Participant};

const THREADS_XMLNS: &str = "http://www.titaniumtrack.com/ns/titanium-backup/messages";
const MMS_CONTENT_TYPE: &str = "application/vnd.wap.multipart.related";
/// Placeholder the restore tool replaces with the device's own number.
const SENT_ADDRESS_TOKEN: &str = "insert-address-token";

/// Counters for the summary printed after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupStats {
    /// `<thread>` elements emitted.
    pub threads: usize,
    /// `<sms>` elements emitted.
    pub sms: usize,
    /// `<mms>` elements emitted.
    pub mms: usize,
    /// Messages dropped for a missing/unresolvable sender or timestamp.
    pub skipped_messages: usize,
    /// Attachments dropped for an unknown media kind or a failed download.
    pub skipped_attachments: usize,
}

/// Writes the backup document to `path`, replacing any previous output.
pub fn write_backup_file(
    path: &Path,
    conversations: &[Conversation],
    self_id: Option<&GaiaId>,
    media: &dyn MediaSource,
) -> Result<BackupStats> {
    // The document is rebuilt from scratch on every run.
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    let file = fs::File::create(path)?;
    write_backup(io::BufWriter::new(file), conversations, self_id, media)
}

/// Streams the backup document to `out`.
pub fn write_backup<W: io::Write>(
    out: W,
    conversations: &[Conversation],
    self_id: Option<&GaiaId>,
    media: &dyn MediaSource,
) -> Result<BackupStats> {
    let mut writer = Writer::new(out);
    let mut stats = BackupStats::default();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    // The count attribute reflects every parsed conversation, eligible or
    // not; the restore tool tolerates the overcount.
    let count = conversations.len().to_string();
    writer
        .create_element("threads")
        .with_attribute(("count", count.as_str()))
        .with_attribute(("xmlns", THREADS_XMLNS))
        .write_inner_content(|writer| -> io::Result<()> {
            for conversation in conversations {
                if !conversation.has_phone_network() {
                    debug!("skipping conversation without a PHONE network type");
                    continue;
                }
                write_thread(writer, conversation, self_id, media, &mut stats)?;
            }
            Ok(())
        })?;
    writer.into_inner().flush()?;

    Ok(stats)
}

/// Renders the backup document as a string.
pub fn to_xml(
    conversations: &[Conversation],
    self_id: Option<&GaiaId>,
    media: &dyn MediaSource,
) -> Result<String> {
    let mut buffer = Vec::new();
    write_backup(&mut buffer, conversations, self_id, media)?;
    String::from_utf8(buffer).map_err(|source| BackupError::Utf8 {
        context: "backup document".to_string(),
        source,
    })
}

fn write_thread<W: io::Write>(
    writer: &mut Writer<W>,
    conversation: &Conversation,
    self_id: Option<&GaiaId>,
    media: &dyn MediaSource,
    stats: &mut BackupStats,
) -> io::Result<()> {
    let address = thread_address(conversation, self_id);
    let mut thread = writer.create_element("thread");
    if let Some(address) = &address {
        thread = thread.with_attribute(("address", address.as_str()));
    }
    stats.threads += 1;
    thread.write_inner_content(|writer| -> io::Result<()> {
        for message in &conversation.messages {
            write_message(writer, conversation, message, self_id, media, stats)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Semicolon-joined numbers of every non-owner participant, or `None` when
/// nothing resolves.
fn thread_address(conversation: &Conversation, self_id: Option<&GaiaId>) -> Option<String> {
    let numbers: Vec<&str> = conversation
        .participants
        .iter()
        .filter(|p| p.gaia_id.as_ref() != self_id)
        .filter_map(Participant::phone_number)
        .collect();
    if numbers.is_empty() {
        None
    } else {
        Some(numbers.join(";"))
    }
}

fn write_message<W: io::Write>(
    writer: &mut Writer<W>,
    conversation: &Conversation,
    message: &Message,
    self_id: Option<&GaiaId>,
    media: &dyn MediaSource,
    stats: &mut BackupStats,
) -> io::Result<()> {
    let Some(sender_id) = message.sender_gaia_id.as_ref() else {
        warn!("message has no sender gaia id; skipping message");
        stats.skipped_messages += 1;
        return Ok(());
    };
    let Some(sender) = conversation.participant(sender_id) else {
        warn!(sender = %sender_id, "could not match sender gaia id to a participant; skipping message");
        stats.skipped_messages += 1;
        return Ok(());
    };
    let Some(date) = message.timestamp.and_then(format_utc_millis) else {
        warn!(sender = %sender_id, "message has no usable timestamp; skipping message");
        stats.skipped_messages += 1;
        return Ok(());
    };

    let sent = Some(sender_id) == self_id;
    if message.is_sms(conversation.participants.len()) {
        write_sms(writer, conversation, message, self_id, &date, sent)?;
        stats.sms += 1;
    } else {
        write_mms(
            writer, conversation, message, self_id, sender, &date, sent, media, stats,
        )?;
        stats.mms += 1;
    }
    Ok(())
}

fn write_sms<W: io::Write>(
    writer: &mut Writer<W>,
    conversation: &Conversation,
    message: &Message,
    self_id: Option<&GaiaId>,
    date: &str,
    sent: bool,
) -> io::Result<()> {
    // The address of an SMS is always the number of the other person.
    let other = conversation
        .participants
        .iter()
        .find(|p| p.gaia_id.as_ref() != self_id);

    let mut sms = writer
        .create_element("sms")
        .with_attribute(("msgBox", if sent { "sent" } else { "inbox" }))
        .with_attribute(("date", date));
    // Sent messages carry only `date`; received ones also `dateSent`.
    if !sent {
        sms = sms.with_attribute(("dateSent", date));
    }
    sms = sms
        .with_attribute(("locked", "false"))
        .with_attribute(("seen", "false"))
        .with_attribute(("read", "true"));
    if let Some(address) = other.and_then(Participant::phone_number) {
        sms = sms.with_attribute(("address", address));
    }

    match &message.content {
        Some(content) => {
            let (encoding, body) = encode_body(content);
            sms.with_attribute(("encoding", encoding))
                .write_text_content(BytesText::new(&body))?;
        }
        None => {
            sms.write_empty()?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_mms<W: io::Write>(
    writer: &mut Writer<W>,
    conversation: &Conversation,
    message: &Message,
    self_id: Option<&GaiaId>,
    sender: &Participant,
    date: &str,
    sent: bool,
    media: &dyn MediaSource,
    stats: &mut BackupStats,
) -> io::Result<()> {
    let mut mms = writer
        .create_element("mms")
        .with_attribute(("msgBox", if sent { "sent" } else { "inbox" }))
        .with_attribute(("version", "1.2"))
        .with_attribute(("type", if sent { "sendReq" } else { "retrieveConf" }))
        .with_attribute(("contentType", MMS_CONTENT_TYPE))
        .with_attribute(("date", date));
    if !sent {
        mms = mms.with_attribute(("dateSent", date));
    }
    mms = mms
        .with_attribute(("locked", "false"))
        .with_attribute(("seen", "false"))
        .with_attribute(("read", "true"));

    mms.write_inner_content(|writer| -> io::Result<()> {
        write_addresses(writer, conversation, message, self_id, sender, sent)?;
        write_parts(writer, message, media, stats)?;
        Ok(())
    })?;
    Ok(())
}

fn write_addresses<W: io::Write>(
    writer: &mut Writer<W>,
    conversation: &Conversation,
    message: &Message,
    self_id: Option<&GaiaId>,
    sender: &Participant,
    sent: bool,
) -> io::Result<()> {
    writer
        .create_element("addresses")
        .write_inner_content(|writer| -> io::Result<()> {
            // The "from" address: a placeholder for sent messages (the device
            // substitutes its own number at restore time), the sender's
            // number otherwise.
            let from = if sent {
                Some(SENT_ADDRESS_TOKEN)
            } else {
                sender.phone_number()
            };
            match from {
                Some(from) => {
                    writer
                        .create_element("address")
                        .with_attribute(("type", "from"))
                        .write_text_content(BytesText::new(from))?;
                }
                None => {
                    debug!("sender has no resolvable number; omitting from address");
                }
            }

            for participant in &conversation.participants {
                if participant.gaia_id.as_ref() == self_id
                    || participant.gaia_id == message.sender_gaia_id
                {
                    continue;
                }
                if let Some(number) = participant.phone_number() {
                    writer
                        .create_element("address")
                        .with_attribute(("type", "to"))
                        .write_text_content(BytesText::new(number))?;
                }
            }
            Ok(())
        })?;
    Ok(())
}

fn write_parts<W: io::Write>(
    writer: &mut Writer<W>,
    message: &Message,
    media: &dyn MediaSource,
    stats: &mut BackupStats,
) -> io::Result<()> {
    // Parts are numbered from 0: text first, then attachments in list order.
    let mut order = 0;

    if let Some(content) = &message.content {
        let (encoding, body) = encode_body(content);
        write_part(writer, "text/plain", order, encoding, &body)?;
        order += 1;
    }

    for attachment in message.attachments.as_deref().unwrap_or_default() {
        let Some(kind) = attachment.media_kind.as_ref() else {
            warn!("attachment media kind is unspecified; skipping part");
            stats.skipped_attachments += 1;
            continue;
        };
        let Some(mime) = kind.mime_type() else {
            warn!(media_kind = %kind, "attachment media kind is unknown; skipping part");
            stats.skipped_attachments += 1;
            continue;
        };
        let Some(url) = attachment.original_content_url.as_deref() else {
            warn!("attachment has no content URL; skipping part");
            stats.skipped_attachments += 1;
            continue;
        };
        match media.fetch_base64(url) {
            Some(data) => {
                write_part(writer, mime, order, "base64", &data)?;
                order += 1;
            }
            None => {
                warn!(url, "unable to download attachment data; skipping part");
                stats.skipped_attachments += 1;
            }
        }
    }
    Ok(())
}

fn write_part<W: io::Write>(
    writer: &mut Writer<W>,
    content_type: &str,
    order: usize,
    encoding: &str,
    data: &str,
) -> io::Result<()> {
    let order = order.to_string();
    writer
        .create_element("part")
        .with_attribute(("contentType", content_type))
        .with_attribute(("order", order.as_str()))
        .with_attribute(("name", "part-0"))
        .with_attribute(("encoding", encoding))
        .write_text_content(BytesText::new(data))?;
    Ok(())
}

/// A body representable in single-byte ASCII goes out as escaped plain text;
/// anything else is base64 of the UTF-8 bytes.
fn encode_body(content: &str) -> (&'static str, Cow<'_, str>) {
    if content.is_ascii() {
        ("plain", Cow::Borrowed(content))
    } else {
        ("base64", Cow::Owned(STANDARD.encode(content.as_bytes())))
    }
}

/// Microsecond Unix timestamp → `YYYY-MM-DDTHH:MM:SS.mmmZ`, always UTC.
/// `None` for timestamps outside chrono's representable range.
fn format_utc_millis(micros: i64) -> Option<String> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attachment, MediaKind};

    /// Media source that serves fixed bytes without touching the network.
    struct StubMedia(Option<String>);

    impl MediaSource for StubMedia {
        fn fetch_base64(&self, _url: &str) -> Option<String> {
            self.0.clone()
        }
    }

    fn participant(id: i64, national: &str) -> Participant {
        Participant {
            gaia_id: Some(GaiaId::Num(id)),
            national_number: Some(national.to_string()),
            ..Participant::default()
        }
    }

    fn message(sender: i64, content: &str) -> Message {
        Message {
            sender_gaia_id: Some(GaiaId::Num(sender)),
            timestamp: Some(1_700_000_000_000_000),
            content: Some(content.to_string()),
            ..Message::default()
        }
    }

    fn phone_conversation(participants: Vec<Participant>, messages: Vec<Message>) -> Conversation {
        Conversation {
            network_types: vec!["PHONE".into()],
            participants,
            messages,
            ..Conversation::default()
        }
    }

    #[test]
    fn test_timestamp_rendering() {
        assert_eq!(
            format_utc_millis(1_700_000_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert_eq!(
            format_utc_millis(1_700_000_000_123_456).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
    }

    #[test]
    fn test_encode_body_ascii_vs_utf8() {
        assert_eq!(encode_body("hello"), ("plain", Cow::Borrowed("hello")));
        let (encoding, body) = encode_body("héllo");
        assert_eq!(encoding, "base64");
        assert_eq!(STANDARD.decode(body.as_bytes()).unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn test_non_phone_conversation_emits_no_thread() {
        let conversation = Conversation {
            network_types: vec!["BABEL".into()],
            ..Conversation::default()
        };
        let mut buffer = Vec::new();
        let stats = write_backup(&mut buffer, &[conversation], None, &StubMedia(None)).unwrap();
        let xml = String::from_utf8(buffer).unwrap();
        assert_eq!(stats.threads, 0);
        assert!(!xml.contains("<thread "));
        assert!(xml.contains(r#"<threads count="1""#));
    }

    #[test]
    fn test_sent_vs_received_date_attributes() {
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![message(1, "sent one"), message(2, "got one")],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();

        let sent = xml.split("<sms").nth(1).unwrap();
        let received = xml.split("<sms").nth(2).unwrap();
        assert!(sent.starts_with(r#" msgBox="sent""#));
        assert!(!sent.split('>').next().unwrap().contains("dateSent"));
        assert!(received.starts_with(r#" msgBox="inbox""#));
        assert!(received.contains(r#"dateSent="2023-11-14T22:13:20.000Z""#));
    }

    #[test]
    fn test_sms_address_is_other_participant() {
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![message(1, "hi")],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        assert!(xml.contains(r#"address="5552222""#));
        assert!(xml.contains(r#"<thread address="5552222">"#));
    }

    #[test]
    fn test_bodiless_sms_is_empty_without_encoding() {
        let bodiless = Message {
            sender_gaia_id: Some(GaiaId::Num(2)),
            timestamp: Some(1_700_000_000_000_000),
            ..Message::default()
        };
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![bodiless],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();

        assert!(xml.contains(r#"read="true" address="5552222"/>"#));
        assert!(!xml.contains("encoding"));
    }

    #[test]
    fn test_plain_body_escaped_verbatim() {
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![message(2, "a < b & c")],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        assert!(xml.contains(r#"encoding="plain""#));
        assert!(xml.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_non_ascii_body_base64_round_trips() {
        let body = "привет 😀";
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![message(2, body)],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        assert!(xml.contains(r#"encoding="base64""#));

        let encoded = xml
            .split(r#"encoding="base64">"#)
            .nth(1)
            .unwrap()
            .split('<')
            .next()
            .unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), body.as_bytes());
    }

    #[test]
    fn test_group_conversation_renders_mms() {
        let conversation = phone_conversation(
            vec![
                participant(1, "5551111"),
                participant(2, "5552222"),
                participant(3, "5553333"),
            ],
            vec![message(2, "group text")],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();

        assert!(xml.contains(r#"<mms msgBox="inbox" version="1.2" type="retrieveConf""#));
        assert!(xml.contains(r#"contentType="application/vnd.wap.multipart.related""#));
        assert!(xml.contains(r#"<address type="from">5552222</address>"#));
        assert!(xml.contains(r#"<address type="to">5553333</address>"#));
        // Owner never appears in the address list.
        assert!(!xml.contains(">5551111<"));
        assert!(xml.contains(
            r#"<part contentType="text/plain" order="0" name="part-0" encoding="plain">group text</part>"#
        ));
        assert!(xml.contains(r#"<thread address="5552222;5553333">"#));
    }

    #[test]
    fn test_sent_mms_uses_address_token() {
        let conversation = phone_conversation(
            vec![
                participant(1, "5551111"),
                participant(2, "5552222"),
                participant(3, "5553333"),
            ],
            vec![message(1, "from me")],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(&[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        assert!(xml.contains(r#"<mms msgBox="sent" version="1.2" type="sendReq""#));
        assert!(xml.contains(r#"<address type="from">insert-address-token</address>"#));
    }

    #[test]
    fn test_attachment_part_fetched_and_ordered() {
        let mut msg = message(2, "look");
        msg.attachments = Some(vec![Attachment {
            media_kind: Some(MediaKind::Photo),
            original_content_url: Some("https://example.com/a.jpg".into()),
            ..Attachment::default()
        }]);
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![msg],
        );
        let self_id = GaiaId::Num(1);
        let xml = to_xml(
            &[conversation],
            Some(&self_id),
            &StubMedia(Some("QUJD".into())),
        )
        .unwrap();
        assert!(xml.contains(
            r#"<part contentType="image/jpeg" order="1" name="part-0" encoding="base64">QUJD</part>"#
        ));
    }

    #[test]
    fn test_unknown_media_kind_yields_text_part_only() {
        let mut msg = message(2, "what is this");
        msg.attachments = Some(vec![Attachment {
            media_kind: Some(MediaKind::Unknown("STICKER".into())),
            original_content_url: Some("https://example.com/s".into()),
            ..Attachment::default()
        }]);
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![msg],
        );
        let self_id = GaiaId::Num(1);

        let mut buffer = Vec::new();
        let stats = write_backup(
            &mut buffer,
            &[conversation],
            Some(&self_id),
            &StubMedia(Some("QUJD".into())),
        )
        .unwrap();
        let xml = String::from_utf8(buffer).unwrap();

        // Emitted as MMS because an attachment list is present, but the only
        // part is the text part.
        assert!(xml.contains("<mms"));
        assert_eq!(xml.matches("<part").count(), 1);
        assert!(xml.contains(r#"contentType="text/plain""#));
        assert_eq!(stats.skipped_attachments, 1);
        assert_eq!(stats.mms, 1);
    }

    #[test]
    fn test_failed_fetch_skips_part_without_aborting() {
        let mut msg = message(2, "photo inbound");
        msg.attachments = Some(vec![Attachment {
            media_kind: Some(MediaKind::Photo),
            original_content_url: Some("https://example.com/gone.jpg".into()),
            ..Attachment::default()
        }]);
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![msg, message(2, "still here")],
        );
        let self_id = GaiaId::Num(1);

        let mut buffer = Vec::new();
        let stats =
            write_backup(&mut buffer, &[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        let xml = String::from_utf8(buffer).unwrap();

        assert_eq!(stats.skipped_attachments, 1);
        assert!(xml.contains("still here"));
        assert_eq!(xml.matches(r#"contentType="image/jpeg""#).count(), 0);
    }

    #[test]
    fn test_unresolvable_sender_skipped_with_stat() {
        let orphan = Message {
            sender_gaia_id: Some(GaiaId::Num(99)),
            timestamp: Some(1_700_000_000_000_000),
            content: Some("ghost".into()),
            ..Message::default()
        };
        let no_sender = Message {
            timestamp: Some(1_700_000_000_000_000),
            content: Some("anonymous".into()),
            ..Message::default()
        };
        let conversation = phone_conversation(
            vec![participant(1, "5551111"), participant(2, "5552222")],
            vec![orphan, no_sender, message(2, "kept")],
        );
        let self_id = GaiaId::Num(1);

        let mut buffer = Vec::new();
        let stats =
            write_backup(&mut buffer, &[conversation], Some(&self_id), &StubMedia(None)).unwrap();
        let xml = String::from_utf8(buffer).unwrap();

        assert_eq!(stats.skipped_messages, 2);
        assert_eq!(stats.sms, 1);
        assert!(!xml.contains("ghost"));
        assert!(!xml.contains("anonymous"));
        assert!(xml.contains("kept"));
    }

    #[test]
    fn test_document_framing() {
        let xml = to_xml(&[], None, &StubMedia(None)).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(xml.contains(
            r#"<threads count="0" xmlns="http://www.titaniumtrack.com/ns/titanium-backup/messages">"#
        ));
        assert!(xml.ends_with("</threads>"));
    }
}
