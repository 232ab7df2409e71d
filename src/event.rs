//! Domain event model: the closed union of content lifecycle events.
//!
//! Events arrive from the feed as an `eventType` tag plus a serialized
//! payload string. [`decode_event`] reconstructs the tagged JSON object and
//! deserializes it once at the boundary; everything downstream matches on
//! the [`ContentEvent`] enum exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::feed::ProposedEvent;

/// Derive the dedicated stream name for a content entity.
///
/// The convention is a lower-cased, prefixed key: entity `"X-9"` lives in
/// stream `"content-x-9"`. The same entity always maps to the same stream
/// regardless of which process performs the mapping.
///
/// # Examples
///
/// ```
/// use journal_atom::content_stream_id;
/// assert_eq!(content_stream_id("ABC-123"), "content-abc-123");
/// ```
pub fn content_stream_id(entity_id: &str) -> String {
    format!("content-{}", entity_id.to_lowercase())
}

/// The content document embedded in publish/create/update events.
///
/// Only `id` and `status` are interpreted by this client; every other field
/// of the publisher-supplied document is carried opaquely in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDoc {
    /// Entity identifier; also determines the dedicated stream name.
    pub id: String,
    /// Publisher-supplied content status (e.g. `"live"`).
    #[serde(default)]
    pub status: String,
    /// All remaining document fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A binary asset referenced by a content package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset file name as supplied by the ingest source.
    pub filename: String,
    /// Storage location, if already resolved.
    #[serde(default)]
    pub location: String,
}

/// The unmodified source document an event was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalPayload {
    /// Source format tag (e.g. `"newsgate+xml"`, `"json"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw source content.
    pub content: String,
}

/// Payload shared by `ContentPublished`, `ContentCreated`, and
/// `ContentUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBody {
    /// Ingest source name (e.g. `"Newsgate"`).
    pub source: String,
    /// Free-form classification tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The content document itself.
    pub content: ContentDoc,
    /// Assets delivered alongside the content.
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// The original source document, when retained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalPayload>,
}

/// The closed union of known content lifecycle events.
///
/// Serialized adjacently tagged: `{"eventType": ..., "data": ...}`, which is
/// exactly the shape [`decode_event`] reconstructs from a feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data")]
pub enum ContentEvent {
    /// Legacy ingest event: content arrived from an external source.
    ContentPublished(ContentBody),
    /// First publication of an entity.
    ContentCreated(ContentBody),
    /// Re-publication of an existing entity.
    ContentUpdated(ContentBody),
    /// The entity was taken down.
    #[serde(rename_all = "camelCase")]
    ContentKilled {
        /// Entity the kill applies to.
        content_id: String,
        /// Operator-supplied justification.
        reason: String,
    },
    /// A previously killed entity was restored.
    #[serde(rename_all = "camelCase")]
    ContentRevived {
        /// Entity the revival applies to.
        content_id: String,
        /// Operator-supplied justification.
        reason: String,
    },
}

impl ContentEvent {
    /// The wire event-type tag for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ContentEvent::ContentPublished(_) => "ContentPublished",
            ContentEvent::ContentCreated(_) => "ContentCreated",
            ContentEvent::ContentUpdated(_) => "ContentUpdated",
            ContentEvent::ContentKilled { .. } => "ContentKilled",
            ContentEvent::ContentRevived { .. } => "ContentRevived",
        }
    }

    /// Convert into a [`ProposedEvent`] ready for publishing.
    ///
    /// Splits the adjacently tagged serialization into its type tag and
    /// payload so the publisher can build the write body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the event cannot be serialized, which
    /// only happens for payloads containing non-JSON-representable values.
    pub fn to_proposed(&self) -> Result<ProposedEvent<Value>, Error> {
        let value = serde_json::to_value(self).map_err(Error::Decode)?;
        let obj = value
            .as_object()
            .expect("adjacently tagged enum must serialize to a JSON object");
        let data = obj.get("data").cloned().unwrap_or(Value::Null);
        Ok(ProposedEvent::new(self.event_type(), data))
    }
}

/// Decode a feed entry's `(eventType, data)` pair into a [`ContentEvent`].
///
/// Reconstructs the adjacently tagged object `{"eventType": .., "data": ..}`
/// and deserializes it, so the enum's serde derive is the single source of
/// truth for payload shapes.
///
/// # Arguments
///
/// * `event_type` - The entry's event type tag.
/// * `data` - The entry's serialized payload.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not valid JSON or the pair
/// does not match any known event kind.
pub fn decode_event(event_type: &str, data: &str) -> Result<ContentEvent, Error> {
    let payload: Value = serde_json::from_str(data)?;
    let tagged = serde_json::json!({
        "eventType": event_type,
        "data": payload,
    });
    Ok(serde_json::from_value(tagged)?)
}
