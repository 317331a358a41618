//! Typed schema for the raw Takeout document.
//!
//! The export is deserialized once into these structures before normalization
//! begins. Every nested field is optional: a missing field at any level must
//! yield an absent value, never a parse failure. Only the top-level
//! `conversation_state` array is required — without it the document is not a
//! Hangouts export at all.

use serde::Deserialize;
use serde_json::Value;

use crate::model::GaiaId;

#[derive(Debug, Deserialize)]
pub(crate) struct TakeoutExport {
    pub conversation_state: Vec<StateEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateEntry {
    pub conversation_state: Option<ConversationState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationState {
    pub conversation: Option<RawConversation>,
    pub event: Option<Vec<RawEvent>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawConversation {
    pub network_type: Option<Vec<String>>,
    pub self_conversation_state: Option<SelfConversationState>,
    pub participant_data: Option<Vec<RawParticipant>>,
    pub read_state: Option<Vec<RawReadState>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelfConversationState {
    pub active_timestamp: Option<Scalar>,
    pub self_read_state: Option<RawReadState>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReadState {
    pub participant_id: Option<RawParticipantId>,
    pub latest_read_timestamp: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawParticipantId {
    pub gaia_id: Option<Scalar>,
    pub chat_id: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawParticipant {
    pub id: Option<RawParticipantId>,
    pub fallback_name: Option<String>,
    pub participant_type: Option<String>,
    pub phone_number: Option<RawPhoneNumber>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPhoneNumber {
    pub e164: Option<String>,
    pub i18n_data: Option<RawI18nData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawI18nData {
    pub country_code: Option<Scalar>,
    pub international_number: Option<String>,
    pub national_number: Option<String>,
    pub region_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEvent {
    pub sender_id: Option<RawParticipantId>,
    pub timestamp: Option<Scalar>,
    pub delivery_medium: Option<RawDeliveryMedium>,
    pub event_type: Option<String>,
    pub chat_message: Option<RawChatMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDeliveryMedium {
    pub medium_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChatMessage {
    pub message_content: Option<RawMessageContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMessageContent {
    pub segment: Option<Vec<RawSegment>>,
    pub attachment: Option<Vec<RawAttachmentItem>>,
}

/// One segment of a message body. `formatting` and `link_data` also appear in
/// exports but carry nothing the backup format can represent.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSegment {
    #[serde(rename = "type")]
    pub segment_type: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttachmentItem {
    pub embed_item: Option<RawEmbedItem>,
}

/// Only photo embeds are recognized; other embed kinds (maps, voting, ...)
/// have no MMS representation and are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEmbedItem {
    #[serde(rename = "embeds.PlusPhoto.plus_photo")]
    pub plus_photo: Option<RawPlusPhoto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPlusPhoto {
    pub album_id: Option<Scalar>,
    pub photo_id: Option<Scalar>,
    pub media_type: Option<String>,
    pub original_content_url: Option<String>,
    pub download_url: Option<String>,
}

/// A field that is numeric in spirit but exported as either a JSON number or
/// a decimal string — and, with enough schema drift, anything else.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Num(i64),
    Str(String),
    Other(Value),
}

impl Scalar {
    /// Integer coercion; `None` when the value has no integer reading.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Num(n) => Some(*n),
            Scalar::Str(s) => s.trim().parse().ok(),
            Scalar::Other(v) => v.as_i64(),
        }
    }

    /// Id coercion: integer when possible, raw text otherwise.
    pub fn to_gaia_id(&self) -> GaiaId {
        match self {
            Scalar::Num(n) => GaiaId::Num(*n),
            Scalar::Str(s) => GaiaId::parse(s),
            Scalar::Other(v) => match v.as_i64() {
                Some(n) => GaiaId::Num(n),
                None => GaiaId::Raw(v.to_string()),
            },
        }
    }

    /// The value as text, for fields kept verbatim.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Num(n) => n.to_string(),
            Scalar::Str(s) => s.clone(),
            Scalar::Other(v) => v.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_from_number() {
        let s: Scalar = serde_json::from_str("1700000000000000").unwrap();
        assert_eq!(s.as_i64(), Some(1_700_000_000_000_000));
    }

    #[test]
    fn test_scalar_from_string() {
        let s: Scalar = serde_json::from_str("\"1700000000000000\"").unwrap();
        assert_eq!(s.as_i64(), Some(1_700_000_000_000_000));
        assert_eq!(s.to_gaia_id(), GaiaId::Num(1_700_000_000_000_000));
    }

    #[test]
    fn test_scalar_non_numeric_string() {
        let s: Scalar = serde_json::from_str("\"not-a-number\"").unwrap();
        assert_eq!(s.as_i64(), None);
        assert_eq!(s.to_gaia_id(), GaiaId::Raw("not-a-number".into()));
    }

    #[test]
    fn test_scalar_other_value_survives() {
        // A float is neither i64 nor string; it must still deserialize.
        let s: Scalar = serde_json::from_str("1.5").unwrap();
        assert_eq!(s.as_i64(), None);
        assert_eq!(s.to_text(), "1.5");
    }
}
