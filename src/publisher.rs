//! Appending events to streams.

use serde::Serialize;
use uuid::Uuid;

use crate::client::{JournalClient, EVENTS_JSON};
use crate::error::Error;
use crate::feed::ProposedEvent;

/// Wire form of one event inside a write body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteEvent<'a, T> {
    event_id: Uuid,
    event_type: &'a str,
    data: &'a T,
}

/// Serialize a batch of proposed events into a write body.
///
/// Each event receives a freshly generated UUID v4 `eventId`; input order
/// is preserved, and the whole batch is one JSON array so the journal
/// applies it atomically.
pub(crate) fn encode_batch<T: Serialize>(events: &[ProposedEvent<T>]) -> Result<String, Error> {
    let wire: Vec<WriteEvent<'_, T>> = events
        .iter()
        .map(|event| WriteEvent {
            event_id: Uuid::new_v4(),
            event_type: &event.event_type,
            data: &event.data,
        })
        .collect();
    Ok(serde_json::to_string(&wire)?)
}

/// Read-role ACLs written as stream metadata by
/// [`ensure_stream`](Publisher::ensure_stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAcl {
    /// Role allowed to read the stream.
    pub read_role: String,
    /// Role allowed to read the stream's metadata.
    pub meta_read_role: String,
}

impl StreamAcl {
    /// ACL granting read access to everyone (`$all`).
    pub fn public() -> Self {
        Self {
            read_role: "$all".to_string(),
            meta_read_role: "$all".to_string(),
        }
    }
}

/// Appends events to named streams.
///
/// One [`publish`](Publisher::publish) call is one durable write: the
/// journal either records every event of the batch with strictly
/// consecutive event numbers or records none of them. No retry happens at
/// this layer; a caller that wants at-least-once delivery repeats the call
/// on [`Error::Publish`] or [`Error::Transport`].
#[derive(Debug, Clone)]
pub struct Publisher {
    client: JournalClient,
}

impl Publisher {
    /// Create a publisher over the given client.
    pub fn new(client: JournalClient) -> Self {
        Self { client }
    }

    /// Append `events` to `stream` as a single ordered batch.
    ///
    /// An empty batch is a no-op and never touches the network.
    ///
    /// # Errors
    ///
    /// [`Error::Publish`] with the offending status on any non-2xx
    /// response; [`Error::Transport`] on network failure. Either way no
    /// partial write is observable.
    pub async fn publish<T: Serialize>(
        &self,
        stream: &str,
        events: &[ProposedEvent<T>],
    ) -> Result<(), Error> {
        if events.is_empty() {
            return Ok(());
        }

        let body = encode_batch(events)?;
        let uri = self.client.url(&format!("streams/{stream}"));
        let status = self.client.post_body(&uri, EVENTS_JSON, body).await?;

        if !(200..300).contains(&status) {
            tracing::warn!(stream, status, count = events.len(), "publish rejected");
            return Err(Error::Publish { status });
        }

        tracing::debug!(stream, count = events.len(), "published batch");
        Ok(())
    }

    /// Create the stream's metadata if the stream does not exist yet.
    ///
    /// Checks existence first; a stream that already exists is success, not
    /// an error, so calling this repeatedly is safe. On a miss, writes a
    /// `$user-updated` metadata event carrying the read-role ACLs.
    ///
    /// # Errors
    ///
    /// [`Error::Publish`] if the metadata write is rejected;
    /// [`Error::Transport`] on network failure.
    pub async fn ensure_stream(&self, stream: &str, acl: &StreamAcl) -> Result<(), Error> {
        let stream_uri = self.client.url(&format!("streams/{stream}"));
        let status = self.client.probe(&stream_uri).await?;
        if (200..300).contains(&status) {
            tracing::debug!(stream, "stream already exists");
            return Ok(());
        }

        let event = WriteEvent {
            event_id: Uuid::new_v4(),
            event_type: "$user-updated",
            data: acl,
        };
        let body = serde_json::to_string(&[event])?;
        let metadata_uri = self.client.url(&format!("streams/{stream}/metadata"));
        let status = self.client.post_body(&metadata_uri, EVENTS_JSON, body).await?;

        if !(200..300).contains(&status) {
            return Err(Error::Publish { status });
        }

        tracing::info!(stream, "created stream metadata");
        Ok(())
    }
}
