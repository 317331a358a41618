//! Normalization of the raw Takeout tree into the canonical model.
//!
//! The walk is defensive throughout: any missing nested field yields an
//! absent value, and no single malformed conversation, event or segment can
//! abort the pass. The only fatal case is a document that cannot be read or
//! deserialized at all.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{BackupError, Result};
use crate::model::{Attachment, Conversation, GaiaId, MediaKind, Message, Participant, SegmentKind};
use crate::takeout::{
    RawAttachmentItem, RawEvent, RawParticipant, RawReadState, RawSegment, Scalar, TakeoutExport,
};

/// Result of a normalization pass.
#[derive(Debug)]
pub struct Export {
    /// Conversations in export order.
    pub conversations: Vec<Conversation>,
    /// The owner's identity, when any self-referential record named one.
    ///
    /// The last non-null value found across all conversations (in export
    /// order) wins.
    pub self_gaia_id: Option<GaiaId>,
}

/// Parses a Takeout JSON file.
///
/// `fallback_phone` is the owner's phone number, injected wherever the
/// export omitted the owner's own number.
pub fn parse_file(path: &Path, fallback_phone: &str) -> Result<Export> {
    let content = fs::read_to_string(path)?;
    parse_str(&content, fallback_phone).map_err(|err| match err {
        BackupError::Parse { source, .. } => BackupError::Parse {
            source,
            path: Some(path.to_path_buf()),
        },
        other => other,
    })
}

/// Parses Takeout JSON content from a string.
pub fn parse_str(content: &str, fallback_phone: &str) -> Result<Export> {
    let raw: TakeoutExport = serde_json::from_str(content)
        .map_err(|source| BackupError::Parse { source, path: None })?;

    let mut conversations = Vec::new();
    let mut self_gaia_id: Option<GaiaId> = None;

    for entry in raw.conversation_state {
        let Some(state) = entry.conversation_state else {
            continue;
        };
        let Some(raw_conversation) = state.conversation else {
            continue;
        };

        let mut conversation = Conversation {
            network_types: raw_conversation.network_type.unwrap_or_default(),
            ..Conversation::default()
        };

        // The self state must be examined before participants so the owner
        // backfill below sees the freshest identity.
        if let Some(self_state) = &raw_conversation.self_conversation_state {
            conversation.active_timestamp =
                self_state.active_timestamp.as_ref().and_then(Scalar::as_i64);
            if let Some(read_state) = &self_state.self_read_state {
                conversation.self_latest_read_timestamp = read_state
                    .latest_read_timestamp
                    .as_ref()
                    .and_then(Scalar::as_i64);
                if let Some(id) = read_state
                    .participant_id
                    .as_ref()
                    .and_then(|p| p.gaia_id.as_ref())
                {
                    self_gaia_id = Some(id.to_gaia_id());
                }
            }
        }

        if let Some(participant_data) = raw_conversation.participant_data {
            build_participants(
                &mut conversation,
                participant_data,
                raw_conversation.read_state.as_deref(),
                fallback_phone,
                self_gaia_id.as_ref(),
            );
        }

        if let Some(events) = state.event {
            conversation.messages = events.into_iter().map(build_message).collect();
        }

        conversations.push(conversation);
    }

    Ok(Export {
        conversations,
        self_gaia_id,
    })
}

fn build_participants(
    conversation: &mut Conversation,
    entries: Vec<RawParticipant>,
    read_state: Option<&[RawReadState]>,
    fallback_phone: &str,
    self_id: Option<&GaiaId>,
) {
    for raw in entries {
        let mut participant = Participant {
            name: raw.fallback_name,
            participant_type: raw.participant_type,
            ..Participant::default()
        };
        if let Some(id) = raw.id {
            participant.gaia_id = id.gaia_id.as_ref().map(Scalar::to_gaia_id);
            participant.chat_id = id.chat_id.as_ref().map(Scalar::to_gaia_id);
        }
        if let Some(phone) = raw.phone_number {
            participant.e164_number = phone.e164;
            if let Some(i18n) = phone.i18n_data {
                participant.country_code = i18n.country_code.as_ref().and_then(Scalar::as_i64);
                participant.international_number = i18n.international_number;
                participant.national_number = i18n.national_number;
                participant.region_code = i18n.region_code;
            }
        }

        // The export frequently omits the owner's own number; backfill it
        // from the externally supplied one. Applies only to the owner.
        if participant.gaia_id.is_some()
            && participant.gaia_id.as_ref() == self_id
            && !participant.has_phone_number()
        {
            participant.e164_number = Some(fallback_phone.to_string());
            participant.international_number = Some(fallback_phone.to_string());
        }

        conversation.insert_participant(participant);
    }

    // Merge the read-state list into the already-built participants by id;
    // unmatched ids are ignored.
    if let Some(read_state) = read_state {
        for entry in read_state {
            let id = entry
                .participant_id
                .as_ref()
                .and_then(|p| p.gaia_id.as_ref())
                .map(Scalar::to_gaia_id);
            if let Some(participant) = conversation
                .participants
                .iter_mut()
                .find(|p| p.gaia_id == id)
            {
                participant.latest_read_timestamp = entry
                    .latest_read_timestamp
                    .as_ref()
                    .and_then(Scalar::as_i64);
            }
        }
    }
}

fn build_message(event: RawEvent) -> Message {
    let mut message = Message::default();
    if let Some(sender) = event.sender_id {
        message.sender_gaia_id = sender.gaia_id.as_ref().map(Scalar::to_gaia_id);
        message.sender_chat_id = sender.chat_id.as_ref().map(Scalar::to_gaia_id);
    }
    message.timestamp = event.timestamp.as_ref().and_then(Scalar::as_i64);
    message.medium_type = event.delivery_medium.and_then(|m| m.medium_type);
    message.event_type = event.event_type;

    if let Some(content) = event.chat_message.and_then(|c| c.message_content) {
        if let Some(segments) = content.segment {
            message.content = Some(collect_segments(&segments));
        }
        if let Some(items) = content.attachment {
            message.attachments = Some(collect_attachments(items));
        }
    }

    message
}

/// Concatenates the text of all recognized segments.
fn collect_segments(segments: &[RawSegment]) -> String {
    let mut content = String::new();
    for segment in segments {
        let Some(tag) = segment.segment_type.as_deref() else {
            warn!("message content segment missing a type tag; skipping segment");
            continue;
        };
        match SegmentKind::from_tag(tag) {
            SegmentKind::Text | SegmentKind::LineBreak | SegmentKind::Link => {
                if let Some(text) = &segment.text {
                    content.push_str(text);
                }
            }
            SegmentKind::Unknown(other) => {
                warn!(segment_type = %other, "unknown message content segment type; skipping segment");
            }
        }
    }
    content
}

/// Keeps photo embeds; all other embed kinds are ignored.
fn collect_attachments(items: Vec<RawAttachmentItem>) -> Vec<Attachment> {
    let mut attachments = Vec::new();
    for item in items {
        let Some(plus_photo) = item.embed_item.and_then(|e| e.plus_photo) else {
            continue;
        };
        attachments.push(Attachment {
            album_id: plus_photo.album_id.as_ref().map(Scalar::to_text),
            photo_id: plus_photo.photo_id.as_ref().map(Scalar::to_text),
            media_kind: plus_photo.media_type.as_deref().map(MediaKind::from_tag),
            original_content_url: plus_photo.original_content_url,
            download_url: plus_photo.download_url,
        });
    }
    attachments
}
