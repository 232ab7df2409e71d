//! Competing-consumer subscription client.
//!
//! A subscription group is a named cursor over a stream shared by multiple
//! readers; the journal delivers each message to at most one group member
//! at a time. This module covers the group lifecycle (create, read a batch,
//! acknowledge or reject individual messages or whole batches, replay
//! parked messages) and the catch-up drain loop built on top of it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::{JournalClient, COMPETING_ATOM_JSON};
use crate::error::Error;
use crate::event::ContentEvent;

/// Disposition directive for a negatively-acknowledged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackAction {
    /// Remove the message from the live queue into the durable parked
    /// holding area; [`SubscriptionClient::replay_parked`] brings it back.
    Park,
    /// Return the message to the live queue for redelivery.
    Retry,
    /// Discard the message.
    Skip,
    /// Stop the subscription.
    Stop,
}

impl NackAction {
    /// Wire name used in the `?action=` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            NackAction::Park => "Park",
            NackAction::Retry => "Retry",
            NackAction::Skip => "Skip",
            NackAction::Stop => "Stop",
        }
    }
}

impl fmt::Display for NackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a drain loop disposes of each batch it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge the whole batch.
    Ack,
    /// Negatively acknowledge the whole batch with the given action.
    Nack(NackAction),
}

/// Strategy the journal uses to distribute messages among group members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerStrategy {
    /// Rotate deliveries across members.
    RoundRobin,
    /// Prefer delivering a stream's messages to the same member.
    Pinned,
    /// Deliver everything to a single member.
    DispatchToSingle,
}

/// Full option set sent when creating a subscription group.
///
/// [`Default`] carries the journal's recommended values; override fields
/// with struct-update syntax:
///
/// ```
/// use journal_atom::SubscriptionSettings;
///
/// let settings = SubscriptionSettings {
///     max_retry_count: 3,
///     ..SubscriptionSettings::default()
/// };
/// assert_eq!(settings.max_retry_count, 3);
/// assert_eq!(settings.buffer_size, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSettings {
    /// Number of messages the server buffers for the group.
    pub buffer_size: u32,
    /// Checkpoint flush interval in milliseconds.
    pub check_point_after_milliseconds: u64,
    /// Whether the server tracks extra latency statistics.
    pub extra_statistics: bool,
    /// Buffer size while the group is live (caught up).
    pub live_buffer_size: u32,
    /// Maximum deliveries between checkpoints.
    pub max_check_point_count: u32,
    /// Deliveries before a message is parked automatically.
    pub max_retry_count: u32,
    /// Maximum concurrent group members.
    pub max_subscriber_count: u32,
    /// Redelivery timeout in milliseconds.
    pub message_timeout_milliseconds: u64,
    /// Minimum deliveries between checkpoints.
    pub min_check_point_count: u32,
    /// Message distribution strategy.
    pub named_consume_strategy: ConsumerStrategy,
    /// Page size for server-side stream reads.
    pub read_batch_size: u32,
    /// Whether link events are resolved to their targets.
    pub resolve_linktos: bool,
    /// Event number the group starts consuming from.
    pub start_from: u64,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            buffer_size: 500,
            check_point_after_milliseconds: 1000,
            extra_statistics: false,
            live_buffer_size: 500,
            max_check_point_count: 500,
            max_retry_count: 10,
            max_subscriber_count: 10,
            message_timeout_milliseconds: 10_000,
            min_check_point_count: 10,
            named_consume_strategy: ConsumerStrategy::RoundRobin,
            read_batch_size: 20,
            resolve_linktos: false,
            start_from: 0,
        }
    }
}

/// A link on a competing-consumer document.
///
/// Unlike stream feed links, the relation here is a free-form string: the
/// journal uses `ack`/`nack` on entries and `ackAll`/`nackAll`/`previous`/
/// `self`/`replayParked` on the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomLink {
    /// Target URI.
    pub uri: String,
    /// Relation name.
    pub relation: String,
}

fn find_link<'a>(links: &'a [AtomLink], relation: &str) -> Option<&'a str> {
    links
        .iter()
        .find(|link| link.relation == relation)
        .map(|link| link.uri.as_str())
}

/// Wire shape of a competing-consumer document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawBatch {
    title: String,
    links: Vec<AtomLink>,
    entries: Vec<RawEntry>,
}

/// Wire shape of one delivered message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEntry {
    title: String,
    event_id: String,
    event_number: u64,
    event_type: String,
    data: Option<String>,
    stream_id: String,
    summary: String,
    links: Vec<AtomLink>,
}

/// One message delivered to this group member.
///
/// Each entry owns the disposition links the journal bound to it, so
/// [`ack`](BatchEntry::ack) and [`nack`](BatchEntry::nack) act on exactly
/// this delivery.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    client: JournalClient,
    /// Entry title in the form `"N@streamId"`.
    pub title: String,
    /// Journal-assigned event ID.
    pub event_id: String,
    /// Zero-based position within the stream.
    pub event_number: u64,
    /// Event type tag.
    pub event_type: String,
    /// Serialized event payload.
    pub data: Option<String>,
    /// Stream the message came from.
    pub stream_id: String,
    /// Human-readable summary line.
    pub summary: String,
    /// Entry-level links, including `ack` and `nack`.
    pub links: Vec<AtomLink>,
}

impl BatchEntry {
    /// Decode this message's payload into a typed [`ContentEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is missing or malformed.
    pub fn event(&self) -> Result<ContentEvent, Error> {
        let raw = self.data.as_deref().unwrap_or("null");
        crate::event::decode_event(&self.event_type, raw)
    }

    /// Acknowledge this message.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchRelation`] if the entry carries no `ack` link;
    /// [`Error::Subscription`] on a non-2xx disposition response.
    pub async fn ack(&self) -> Result<(), Error> {
        self.dispose("ack", None).await
    }

    /// Negatively acknowledge this message with the given action.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchRelation`] if the entry carries no `nack` link;
    /// [`Error::Subscription`] on a non-2xx disposition response.
    pub async fn nack(&self, action: NackAction) -> Result<(), Error> {
        self.dispose("nack", Some(action.as_str())).await
    }

    async fn dispose(&self, relation: &str, action: Option<&str>) -> Result<(), Error> {
        let uri = find_link(&self.links, relation)
            .ok_or_else(|| Error::NoSuchRelation(relation.to_string()))?;
        let status = self.client.post_disposition(uri, action).await?;
        if !(200..300).contains(&status) {
            return Err(Error::Subscription { status });
        }
        Ok(())
    }
}

/// One competing-consumer batch, with its disposition links bound.
///
/// Entries are sorted ascending by event number regardless of the order the
/// journal returned them in.
#[derive(Debug, Clone)]
pub struct Batch {
    client: JournalClient,
    stream: String,
    group: String,
    /// Document title.
    pub title: String,
    /// Batch-level links (`ackAll`, `nackAll`, `previous`, `self`).
    pub links: Vec<AtomLink>,
    /// Delivered messages in ascending event-number order.
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    /// `true` when the batch carries no messages.
    ///
    /// An empty batch is the caught-up signal for drain loops.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acknowledge every message in this batch in one request.
    pub async fn ack_all(&self) -> Result<(), Error> {
        self.dispose_all("ackAll", None).await
    }

    /// Negatively acknowledge every message in this batch in one request.
    pub async fn nack_all(&self, action: NackAction) -> Result<(), Error> {
        self.dispose_all("nackAll", Some(action.as_str())).await
    }

    async fn dispose_all(&self, relation: &str, action: Option<&str>) -> Result<(), Error> {
        let uri = find_link(&self.links, relation)
            .ok_or_else(|| Error::NoSuchRelation(relation.to_string()))?;
        let status = self.client.post_disposition(uri, action).await?;
        if !(200..300).contains(&status) {
            return Err(Error::Subscription { status });
        }
        tracing::debug!(
            stream = %self.stream,
            group = %self.group,
            relation,
            count = self.entries.len(),
            "disposed batch"
        );
        Ok(())
    }

    /// Fetch the next batch via this batch's `previous` link.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchRelation`] if the document carries no `previous`
    /// link; otherwise the same errors as [`SubscriptionClient::read`].
    pub async fn previous(&self) -> Result<Batch, Error> {
        let uri = find_link(&self.links, "previous")
            .ok_or_else(|| Error::NoSuchRelation("previous".to_string()))?
            .to_string();
        fetch_batch(&self.client, &self.stream, &self.group, &uri).await
    }

    /// Requeue all parked messages for this batch's group.
    pub async fn replay_parked(&self) -> Result<(), Error> {
        replay_parked(&self.client, &self.stream, &self.group).await
    }
}

async fn fetch_batch(
    client: &JournalClient,
    stream: &str,
    group: &str,
    uri: &str,
) -> Result<Batch, Error> {
    let (status, body) = client.get_raw(uri, COMPETING_ATOM_JSON).await?;
    if status >= 400 {
        return Err(Error::Subscription { status });
    }
    decode_batch(client, stream, group, &body)
}

fn decode_batch(
    client: &JournalClient,
    stream: &str,
    group: &str,
    body: &str,
) -> Result<Batch, Error> {
    let raw: RawBatch = serde_json::from_str(body)?;

    let mut entries: Vec<BatchEntry> = raw
        .entries
        .into_iter()
        .map(|entry| BatchEntry {
            client: client.clone(),
            title: entry.title,
            event_id: entry.event_id,
            event_number: entry.event_number,
            event_type: entry.event_type,
            data: entry.data,
            stream_id: entry.stream_id,
            summary: entry.summary,
            links: entry.links,
        })
        .collect();
    entries.sort_by_key(|entry| entry.event_number);

    Ok(Batch {
        client: client.clone(),
        stream: stream.to_string(),
        group: group.to_string(),
        title: raw.title,
        links: raw.links,
        entries,
    })
}

async fn replay_parked(client: &JournalClient, stream: &str, group: &str) -> Result<(), Error> {
    let uri = client.url(&format!("subscriptions/{stream}/{group}/replayParked"));
    let status = client.post_disposition(&uri, None).await?;
    if !(200..300).contains(&status) {
        return Err(Error::Subscription { status });
    }
    tracing::info!(stream, group, "replaying parked messages");
    Ok(())
}

/// Client for one named subscription group on one stream.
#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    client: JournalClient,
    stream: String,
    group: String,
}

impl SubscriptionClient {
    /// Create a client for `group` competing over `stream`.
    pub fn new(
        client: JournalClient,
        stream: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            client,
            stream: stream.into(),
            group: group.into(),
        }
    }

    fn base_path(&self) -> String {
        format!("subscriptions/{}/{}", self.stream, self.group)
    }

    /// Create the subscription group with the given option set.
    ///
    /// Only a 201 response is success. An existing group is a failure here;
    /// the [`read_or_create`](SubscriptionClient::read_or_create) ordering
    /// is what makes bootstrap idempotent overall.
    ///
    /// # Errors
    ///
    /// [`Error::Subscription`] with the offending status on anything but
    /// 201; [`Error::Transport`] on network failure.
    pub async fn create(&self, settings: &SubscriptionSettings) -> Result<(), Error> {
        let uri = self.client.url(&self.base_path());
        let status = self.client.put_json(&uri, settings).await?;
        if status != 201 {
            tracing::warn!(
                stream = %self.stream,
                group = %self.group,
                status,
                "failed to create subscription"
            );
            return Err(Error::Subscription { status });
        }
        tracing::info!(stream = %self.stream, group = %self.group, "created subscription");
        Ok(())
    }

    /// Read a batch of at most `count` messages.
    ///
    /// Omitting `count` leaves the batch size to the journal. Entries come
    /// back sorted ascending with their `ack`/`nack` links bound.
    ///
    /// # Errors
    ///
    /// [`Error::Subscription`] on a 4xx/5xx response (including a group
    /// that does not exist yet); [`Error::Decode`] on a malformed document;
    /// [`Error::Transport`] on network failure.
    pub async fn read(&self, count: Option<u64>) -> Result<Batch, Error> {
        let path = match count {
            Some(count) => format!("{}/{count}", self.base_path()),
            None => self.base_path(),
        };
        let uri = self.client.url(&path);
        fetch_batch(&self.client, &self.stream, &self.group, &uri).await
    }

    /// Read a batch, creating the group on first use.
    ///
    /// Optimistic-create ordering: try [`read`](SubscriptionClient::read)
    /// first; on failure, [`create`](SubscriptionClient::create) then retry
    /// the read once. This avoids a separate existence check at the cost of
    /// one wasted request on first use.
    ///
    /// # Errors
    ///
    /// The create error if creation fails, otherwise whatever the retried
    /// read returns.
    pub async fn read_or_create(
        &self,
        count: Option<u64>,
        settings: &SubscriptionSettings,
    ) -> Result<Batch, Error> {
        match self.read(count).await {
            Ok(batch) => Ok(batch),
            Err(read_err) => {
                tracing::debug!(
                    stream = %self.stream,
                    group = %self.group,
                    error = %read_err,
                    "read failed, attempting to create subscription"
                );
                self.create(settings).await?;
                self.read(count).await
            }
        }
    }

    /// Requeue all parked messages for this group.
    ///
    /// Messages that are not parked are unaffected.
    pub async fn replay_parked(&self) -> Result<(), Error> {
        replay_parked(&self.client, &self.stream, &self.group).await
    }

    /// Catch-up drain: read and dispose batches until the group is empty.
    ///
    /// Bootstraps the group if needed, then loops: stop on an empty batch,
    /// otherwise dispose the whole batch per `disposition` and follow the
    /// `previous` link. Returns the number of messages disposed.
    ///
    /// Termination is by emptiness, never by link absence: an empty batch
    /// read through a valid edge means the group is drained.
    ///
    /// # Errors
    ///
    /// Any error from bootstrap, disposition, or batch navigation; the
    /// drain stops at the first failure, leaving undisposed messages for
    /// redelivery.
    pub async fn drain(
        &self,
        count: Option<u64>,
        disposition: Disposition,
        settings: &SubscriptionSettings,
    ) -> Result<usize, Error> {
        let mut batch = self.read_or_create(count, settings).await?;
        let mut disposed = 0;

        loop {
            if batch.is_empty() {
                tracing::debug!(
                    stream = %self.stream,
                    group = %self.group,
                    disposed,
                    "drain caught up"
                );
                break;
            }

            match disposition {
                Disposition::Ack => batch.ack_all().await?,
                Disposition::Nack(action) => batch.nack_all(action).await?,
            }
            disposed += batch.entries.len();

            batch = batch.previous().await?;
        }

        Ok(disposed)
    }
}
