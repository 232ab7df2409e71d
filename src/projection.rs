//! Rebuilding an entity's read model from its full event history.
//!
//! A [`ContentProjection`] is derived and ephemeral: recomputed by walking
//! the entity's dedicated stream backward and folding every recorded event
//! in ascending event-number order. Nothing is persisted by this client.

use serde::{Deserialize, Serialize};

use crate::client::JournalClient;
use crate::error::Error;
use crate::event::{content_stream_id, ContentEvent};
use crate::feed::{sort_entries, Relation, StreamEntry, StreamPosition};
use crate::navigator::{NavigationState, StreamNavigator};

/// Terminal status of a killed entity.
const STATUS_DEAD: &str = "dead";
/// Terminal status of a revived entity.
const STATUS_LIVE: &str = "live";

/// The derived state of one content entity.
///
/// `status` is `""` for an entity that does not exist yet (or whose stream
/// could not be read -- see [`Rebuilder::rebuild`]); otherwise it is the
/// last status the fold observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProjection {
    /// Entity identifier.
    pub id: String,
    /// Derived content status: `""`, `"live"`, `"dead"`, or any
    /// publisher-supplied status string.
    pub status: String,
}

impl ContentProjection {
    /// A projection for an entity with no recorded history.
    pub fn absent(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: String::new(),
        }
    }

    /// `true` when the entity has any recorded history.
    pub fn exists(&self) -> bool {
        !self.status.is_empty()
    }
}

/// Fold an ascending event history down to a terminal status.
///
/// Must be called with entries already in ascending event-number order; the
/// last event observed in that order wins. `ContentPublished` and entries
/// whose payload does not decode are skipped.
pub(crate) fn fold_status(entries: &[StreamEntry]) -> String {
    let mut status = String::new();
    for entry in entries {
        match entry.event() {
            Ok(ContentEvent::ContentCreated(body)) | Ok(ContentEvent::ContentUpdated(body)) => {
                status = body.content.status;
            }
            Ok(ContentEvent::ContentKilled { .. }) => status = STATUS_DEAD.to_string(),
            Ok(ContentEvent::ContentRevived { .. }) => status = STATUS_LIVE.to_string(),
            Ok(ContentEvent::ContentPublished(_)) => {
                // Ingest notification, not a lifecycle transition.
            }
            Err(error) => {
                tracing::warn!(
                    title = %entry.title,
                    error = %error,
                    "skipping undecodable entry during fold"
                );
            }
        }
    }
    status
}

/// Rebuilds [`ContentProjection`]s by replaying stream history.
#[derive(Debug, Clone)]
pub struct Rebuilder {
    client: JournalClient,
    page_size: u64,
}

/// Page size used when walking history.
const DEFAULT_PAGE_SIZE: u64 = 20;

impl Rebuilder {
    /// Create a rebuilder over the given client.
    pub fn new(client: JournalClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size used for history reads.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Rebuild the projection for `entity_id` from its full history.
    ///
    /// Walks the entity's dedicated stream backward from the head,
    /// accumulating every page's entries and terminating on the first page
    /// with zero entries; a missing `previous` edge at the stream boundary
    /// ends the walk the same way. The accumulated history is sorted
    /// ascending and folded; the last event in event-number order wins.
    ///
    /// This method never fails: a read failure of any kind (stream not
    /// found, transport error) yields `status: ""`, the same value as an
    /// entity with no history. "Entity does not exist yet" is an expected
    /// outcome and callers cannot tell the two apart from the return value
    /// alone -- the failure is logged at `warn` so the cases remain
    /// distinguishable in logs.
    pub async fn rebuild(&self, entity_id: &str) -> ContentProjection {
        match self.read_history(entity_id).await {
            Ok(mut history) => {
                sort_entries(&mut history);
                let status = fold_status(&history);
                tracing::debug!(
                    entity = entity_id,
                    events = history.len(),
                    %status,
                    "rebuilt projection"
                );
                ContentProjection {
                    id: entity_id.to_string(),
                    status,
                }
            }
            Err(error) => {
                tracing::warn!(
                    entity = entity_id,
                    error = %error,
                    "projection read failed, treating entity as nonexistent"
                );
                ContentProjection::absent(entity_id)
            }
        }
    }

    async fn read_history(&self, entity_id: &str) -> Result<Vec<StreamEntry>, Error> {
        let stream = content_stream_id(entity_id);
        let navigator = StreamNavigator::new(self.client.clone(), stream);

        let mut page = navigator
            .backward_from(StreamPosition::Head, self.page_size)
            .await?;
        let mut history = Vec::new();

        loop {
            if page.is_empty() {
                break;
            }
            history.extend(page.entries.iter().cloned());

            let state = NavigationState::from_page(&page);
            if !state.has(Relation::Previous) {
                break;
            }
            page = navigator.previous(&state).await?;
        }

        Ok(history)
    }
}
