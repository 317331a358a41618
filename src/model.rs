//! Canonical conversation model.
//!
//! This module provides the normalized representation of a Hangouts export:
//! [`Conversation`], [`Participant`], [`Message`] and [`Attachment`], plus the
//! [`GaiaId`] join key and the closed tag enumerations [`MediaKind`] and
//! [`SegmentKind`].
//!
//! All records are built once by [`normalize`](crate::normalize), held
//! read-only while the XML writer runs, and discarded afterwards. Every field
//! that the export may omit is an `Option`.

use std::fmt;

/// A participant/sender identifier from the export.
///
/// Gaia ids are numeric in spirit but serialized inconsistently (sometimes a
/// JSON number, usually a decimal string, occasionally wider than 64 bits).
/// An id is coerced to an integer when possible; otherwise the original raw
/// text is retained. Both sides of every join — the participant map and each
/// message's sender — go through the same coercion, so lookups stay
/// consistent either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GaiaId {
    /// Id that fit in a signed 64-bit integer.
    Num(i64),
    /// Id retained verbatim because integer coercion failed.
    Raw(String),
}

impl GaiaId {
    /// Coerces raw id text, keeping it verbatim when it is not an integer.
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map_or_else(|_| GaiaId::Raw(raw.to_string()), GaiaId::Num)
    }
}

impl From<i64> for GaiaId {
    fn from(id: i64) -> Self {
        GaiaId::Num(id)
    }
}

impl fmt::Display for GaiaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaiaId::Num(id) => write!(f, "{id}"),
            GaiaId::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Media kind of an MMS attachment.
///
/// The export tags attachments with an upper-case string. Unknown tags are a
/// first-class case so the writer can report them instead of silently falling
/// through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    AnimatedPhoto,
    Video,
    /// Tag not recognized; the original value is kept for diagnostics.
    Unknown(String),
}

impl MediaKind {
    /// Parses the export's media type tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "PHOTO" => MediaKind::Photo,
            "ANIMATED_PHOTO" => MediaKind::AnimatedPhoto,
            "VIDEO" => MediaKind::Video,
            other => MediaKind::Unknown(other.to_string()),
        }
    }

    /// MIME type used for the MMS part, or `None` for unknown kinds.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            MediaKind::Photo => Some("image/jpeg"),
            MediaKind::AnimatedPhoto => Some("image/gif"),
            MediaKind::Video => Some("video/*"),
            MediaKind::Unknown(_) => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => f.write_str("PHOTO"),
            MediaKind::AnimatedPhoto => f.write_str("ANIMATED_PHOTO"),
            MediaKind::Video => f.write_str("VIDEO"),
            MediaKind::Unknown(tag) => f.write_str(tag),
        }
    }
}

/// Type tag of a message content segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    LineBreak,
    Link,
    /// Tag not recognized; the original value is kept for diagnostics.
    Unknown(String),
}

impl SegmentKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "TEXT" => SegmentKind::Text,
            "LINE_BREAK" => SegmentKind::LineBreak,
            "LINK" => SegmentKind::Link,
            other => SegmentKind::Unknown(other.to_string()),
        }
    }
}

/// A person in a conversation.
#[derive(Debug, Clone, Default)]
pub struct Participant {
    /// Stable user id; the join key used everywhere a sender or addressee
    /// must be resolved. Unique within a conversation.
    pub gaia_id: Option<GaiaId>,
    /// Secondary id, unused downstream.
    pub chat_id: Option<GaiaId>,
    /// Display name from the export's `fallback_name`.
    pub name: Option<String>,
    pub participant_type: Option<String>,
    /// Phone number in E.164 form.
    pub e164_number: Option<String>,
    pub international_number: Option<String>,
    pub national_number: Option<String>,
    pub country_code: Option<i64>,
    pub region_code: Option<String>,
    /// Last-read timestamp merged in from the conversation's read state.
    pub latest_read_timestamp: Option<i64>,
}

impl Participant {
    /// Best available phone number for rendering an address:
    /// national, else E.164, else international.
    pub fn phone_number(&self) -> Option<&str> {
        self.national_number
            .as_deref()
            .or(self.e164_number.as_deref())
            .or(self.international_number.as_deref())
    }

    /// Returns `true` if any of the three phone representations is present.
    pub fn has_phone_number(&self) -> bool {
        self.e164_number.is_some()
            || self.international_number.is_some()
            || self.national_number.is_some()
    }
}

/// An attachment to an MMS message.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// Google Photos album id, unused downstream.
    pub album_id: Option<String>,
    /// Google Photos photo id, unused downstream.
    pub photo_id: Option<String>,
    pub media_kind: Option<MediaKind>,
    /// Remote URL the attachment bytes are fetched from.
    pub original_content_url: Option<String>,
    pub download_url: Option<String>,
}

/// A single SMS or MMS message.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Sender identity. Required for output; messages lacking it are dropped
    /// with a diagnostic.
    pub sender_gaia_id: Option<GaiaId>,
    /// Secondary sender id, unused downstream.
    pub sender_chat_id: Option<GaiaId>,
    /// Microseconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub medium_type: Option<String>,
    pub event_type: Option<String>,
    /// Message body, concatenated from the event's text segments.
    pub content: Option<String>,
    /// `None` when the event carried no attachment list at all; `Some` (even
    /// if empty after filtering) when it did. The distinction drives SMS/MMS
    /// framing below.
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    /// A message renders as SMS iff the conversation has at most two
    /// participants and the message carries no attachment list; otherwise it
    /// renders as MMS.
    pub fn is_sms(&self, participant_count: usize) -> bool {
        participant_count <= 2 && self.attachments.is_none()
    }
}

/// A thread of SMS or MMS messages and its participants.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// Network type markers; only conversations including `PHONE` are
    /// eligible for output.
    pub network_types: Vec<String>,
    pub active_timestamp: Option<i64>,
    pub self_latest_read_timestamp: Option<i64>,
    /// Participants in export order. Gaia ids are unique within the list.
    pub participants: Vec<Participant>,
    /// Messages in export order; never re-sorted.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Returns `true` if this conversation carried SMS/MMS traffic.
    pub fn has_phone_network(&self) -> bool {
        self.network_types.iter().any(|n| n == "PHONE")
    }

    /// Looks up a participant by gaia id.
    pub fn participant(&self, id: &GaiaId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.gaia_id.as_ref() == Some(id))
    }

    /// Inserts a participant, replacing any existing entry with the same
    /// (possibly absent) gaia id.
    pub fn insert_participant(&mut self, participant: Participant) {
        if let Some(existing) = self
            .participants
            .iter_mut()
            .find(|p| p.gaia_id == participant.gaia_id)
        {
            *existing = participant;
        } else {
            self.participants.push(participant);
        }
    }
}
