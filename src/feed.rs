//! Atom feed wire model and codec.
//!
//! Types in this module mirror the JSON documents the journal returns for
//! stream reads (`application/vnd.eventstore.atom+json`). No network I/O
//! occurs here; the [`crate::navigator`] and [`crate::subscription`] modules
//! fetch documents and hand their bodies to [`decode_page`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::event::ContentEvent;

/// A named navigation edge carried by a feed page.
///
/// `previous` and `next` are absent at the respective stream boundary.
/// Relations the client does not know about deserialize as
/// [`Unknown`](Relation::Unknown) instead of failing the whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    /// The page itself; refetching it re-reads the same window.
    #[serde(rename = "self")]
    SelfRel,
    /// The newest page of the feed.
    First,
    /// The oldest page of the feed.
    Last,
    /// The adjacent page in the direction the feed is being read.
    Previous,
    /// The adjacent page in the opposite direction.
    Next,
    /// The stream's metadata resource.
    Metadata,
    /// Edit link for the resource.
    Edit,
    /// Alternate representation of the resource.
    Alternate,
    /// Any relation this client does not recognize.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relation::SelfRel => "self",
            Relation::First => "first",
            Relation::Last => "last",
            Relation::Previous => "previous",
            Relation::Next => "next",
            Relation::Metadata => "metadata",
            Relation::Edit => "edit",
            Relation::Alternate => "alternate",
            Relation::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single navigation link: relation name plus target URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    /// Target URI, absolute as returned by the journal.
    pub uri: String,
    /// The relation this link represents.
    pub relation: Relation,
}

/// Feed author block. Carried for completeness; the client never acts on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name of the feed author.
    #[serde(default)]
    pub name: String,
}

/// A persisted, immutable event record as it appears in a feed page.
///
/// `event_number` is assigned by the journal, never by this client, and is
/// strictly increasing within a stream. The serialized payload stays in
/// [`data`](StreamEntry::data) until [`event`](StreamEntry::event) decodes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamEntry {
    /// Entry title in the form `"N@streamId"`. The numeric prefix is the
    /// authoritative sort key for entries within a page.
    pub title: String,
    /// Entry resource URI.
    pub id: String,
    /// Journal-assigned event ID.
    pub event_id: String,
    /// Zero-based position within the stream.
    pub event_number: u64,
    /// Event type tag (e.g. `"ContentCreated"`).
    pub event_type: String,
    /// Serialized event payload. `None` when the journal did not embed it.
    pub data: Option<String>,
    /// Name of the stream this entry belongs to.
    pub stream_id: String,
    /// Whether the payload is JSON.
    pub is_json: bool,
    /// Human-readable summary line.
    pub summary: String,
    /// Entry timestamp as an ISO string.
    pub updated: String,
    /// Author block.
    pub author: Author,
    /// Entry-level links (edit, alternate).
    pub links: Vec<NavLink>,
}

impl StreamEntry {
    /// Decode this entry's payload into a typed [`ContentEvent`].
    ///
    /// Decoding is on demand and scoped to this entry: a malformed payload
    /// fails here with [`Error::Decode`] without invalidating the page the
    /// entry came from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is missing, is not valid
    /// JSON, or does not match any known event kind.
    pub fn event(&self) -> Result<ContentEvent, Error> {
        let raw = self.data.as_deref().unwrap_or("null");
        crate::event::decode_event(&self.event_type, raw)
    }
}

/// One fetched window of a stream: ordered entries plus navigation links.
///
/// Entries are sorted ascending by [`sort_entries`] before the page is
/// exposed to callers, regardless of the order the feed returned them in
/// (the journal returns newest-first).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Page {
    /// Feed title.
    pub title: String,
    /// Feed resource URI.
    pub id: String,
    /// Name of the stream this page was read from.
    pub stream_id: String,
    /// `true` when this page contains the newest entry of the stream.
    pub head_of_stream: bool,
    /// Entity tag for conditional requests.
    pub e_tag: String,
    /// Feed timestamp as an ISO string.
    pub updated: String,
    /// Author block.
    pub author: Author,
    /// Navigation edges of this page.
    pub links: Vec<NavLink>,
    /// Entries in ascending event-number order.
    pub entries: Vec<StreamEntry>,
}

impl Page {
    /// Look up the URI of a navigation edge on this page.
    pub fn link(&self, relation: Relation) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.relation == relation)
            .map(|link| link.uri.as_str())
    }

    /// `true` when the page carries no entries.
    ///
    /// An empty page reached through a valid edge is the end-of-stream
    /// signal for catch-up loops.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a raw feed body into a [`Page`] with entries sorted ascending.
///
/// # Arguments
///
/// * `body` - The raw JSON document returned by a stream read.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body is not a valid feed document.
pub fn decode_page(body: &str) -> Result<Page, Error> {
    let mut page: Page = serde_json::from_str(body)?;
    sort_entries(&mut page.entries);
    Ok(page)
}

/// Sort entries ascending by the numeric prefix of `title` before `@`.
///
/// The title prefix is the authoritative ordering because raw feed order is
/// not guaranteed by the protocol. Entries whose title does not parse fall
/// back to their `event_number`.
pub fn sort_entries(entries: &mut [StreamEntry]) {
    entries.sort_by_key(entry_order);
}

fn entry_order(entry: &StreamEntry) -> u64 {
    entry
        .title
        .split('@')
        .next()
        .and_then(|prefix| prefix.parse().ok())
        .unwrap_or(entry.event_number)
}

/// A position within a stream: a zero-based offset or the head sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// The newest end of the stream.
    Head,
    /// An absolute zero-based offset.
    At(u64),
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPosition::Head => f.write_str("head"),
            StreamPosition::At(offset) => write!(f, "{offset}"),
        }
    }
}

impl From<u64> for StreamPosition {
    fn from(offset: u64) -> Self {
        StreamPosition::At(offset)
    }
}

/// An event to append: type tag plus serializable payload.
///
/// The journal assigns the event number; the publisher assigns a fresh
/// UUID v4 event ID at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEvent<T> {
    /// Event type tag. Must be non-empty.
    pub event_type: String,
    /// The payload to serialize into the write body.
    pub data: T,
}

impl<T> ProposedEvent<T> {
    /// Build a proposed event from a type tag and payload.
    pub fn new(event_type: impl Into<String>, data: T) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}
