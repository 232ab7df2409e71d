//! Direction-relative traversal of a stream's paginated feed.
//!
//! Every fetch returns a [`Page`]; the page's link set, captured as a
//! [`NavigationState`], is the complete navigation context for the next
//! step. Constructing a fresh state from each fetched page is what rebinds
//! all five edges: navigation is always relative to the most recently
//! fetched page, never to the stream's absolute head.

use std::collections::HashMap;

use crate::client::JournalClient;
use crate::error::Error;
use crate::feed::{Page, Relation, StreamPosition};

/// The navigation edges captured from one fetched page.
///
/// A value type threaded explicitly by the caller: each traversal owns its
/// own state, so one [`StreamNavigator`] can serve any number of concurrent
/// traversals without shared mutable position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    edges: HashMap<Relation, String>,
}

/// The edges a page contributes to navigation state.
const NAV_EDGES: [Relation; 5] = [
    Relation::SelfRel,
    Relation::First,
    Relation::Last,
    Relation::Previous,
    Relation::Next,
];

impl NavigationState {
    /// Capture the navigation edges of a freshly fetched page.
    ///
    /// Only `self`, `first`, `last`, `previous`, and `next` participate in
    /// navigation; other link relations on the page are ignored.
    pub fn from_page(page: &Page) -> Self {
        let mut edges = HashMap::new();
        for relation in NAV_EDGES {
            if let Some(uri) = page.link(relation) {
                edges.insert(relation, uri.to_string());
            }
        }
        Self { edges }
    }

    /// The captured URI for an edge, if the page carried it.
    pub fn uri(&self, relation: Relation) -> Option<&str> {
        self.edges.get(&relation).map(String::as_str)
    }

    /// Whether the page carried the given edge.
    pub fn has(&self, relation: Relation) -> bool {
        self.edges.contains_key(&relation)
    }
}

impl From<&Page> for NavigationState {
    fn from(page: &Page) -> Self {
        NavigationState::from_page(page)
    }
}

/// Read direction for absolute range reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// Host-relative path for an absolute range read.
pub(crate) fn read_path(
    stream: &str,
    position: StreamPosition,
    direction: &str,
    count: u64,
) -> String {
    format!("streams/{stream}/{position}/{direction}/{count}")
}

/// Walks a single stream's feed.
///
/// Absolute jumps ([`open`](StreamNavigator::open),
/// [`forward_from`](StreamNavigator::forward_from),
/// [`backward_from`](StreamNavigator::backward_from)) are independent of any
/// prior state. Relative steps ([`follow`](StreamNavigator::follow) and its
/// conveniences) take the [`NavigationState`] of the page they move from.
///
/// Invoking an edge the state does not carry fails with
/// [`Error::NoSuchRelation`]. Callers that walk until exhaustion must treat
/// an empty-entries page, not a missing link, as the termination signal: an
/// empty page reached through a valid edge means end-of-stream, a missing
/// edge means the stream has no such page at all.
#[derive(Debug, Clone)]
pub struct StreamNavigator {
    client: JournalClient,
    stream: String,
}

impl StreamNavigator {
    /// Create a navigator for one named stream.
    pub fn new(client: JournalClient, stream: impl Into<String>) -> Self {
        Self {
            client,
            stream: stream.into(),
        }
    }

    /// The stream this navigator reads.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Fetch the stream's root resource.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on network failure or a non-success status
    /// (including a stream that does not exist); [`Error::Decode`] on a
    /// malformed feed body.
    pub async fn open(&self) -> Result<Page, Error> {
        let uri = self.client.url(&format!("streams/{}", self.stream));
        tracing::debug!(stream = %self.stream, "opening stream feed");
        self.client.get_page(&uri).await
    }

    /// Absolute jump: read `count` entries forward from `position`.
    ///
    /// The returned page's links are the new navigation context; derive a
    /// fresh [`NavigationState`] from it to continue relative traversal.
    pub async fn forward_from(
        &self,
        position: impl Into<StreamPosition>,
        count: u64,
    ) -> Result<Page, Error> {
        self.read_from(position.into(), Direction::Forward, count)
            .await
    }

    /// Absolute jump: read `count` entries backward from `position`.
    pub async fn backward_from(
        &self,
        position: impl Into<StreamPosition>,
        count: u64,
    ) -> Result<Page, Error> {
        self.read_from(position.into(), Direction::Backward, count)
            .await
    }

    async fn read_from(
        &self,
        position: StreamPosition,
        direction: Direction,
        count: u64,
    ) -> Result<Page, Error> {
        let path = read_path(&self.stream, position, direction.as_str(), count);
        let uri = self.client.url(&path);
        tracing::debug!(
            stream = %self.stream,
            %position,
            direction = direction.as_str(),
            count,
            "absolute range read"
        );
        self.client.get_page(&uri).await
    }

    /// Follow a captured navigation edge.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchRelation`] if `state` does not carry the edge;
    /// otherwise the same errors as [`open`](StreamNavigator::open).
    pub async fn follow(
        &self,
        state: &NavigationState,
        relation: Relation,
    ) -> Result<Page, Error> {
        let uri = state
            .uri(relation)
            .ok_or_else(|| Error::NoSuchRelation(relation.to_string()))?;
        tracing::debug!(stream = %self.stream, %relation, "following edge");
        self.client.get_page(uri).await
    }

    /// Follow the `previous` edge of `state`.
    pub async fn previous(&self, state: &NavigationState) -> Result<Page, Error> {
        self.follow(state, Relation::Previous).await
    }

    /// Follow the `next` edge of `state`.
    pub async fn next(&self, state: &NavigationState) -> Result<Page, Error> {
        self.follow(state, Relation::Next).await
    }

    /// Follow the `first` edge of `state`.
    pub async fn first(&self, state: &NavigationState) -> Result<Page, Error> {
        self.follow(state, Relation::First).await
    }

    /// Follow the `last` edge of `state`.
    pub async fn last(&self, state: &NavigationState) -> Result<Page, Error> {
        self.follow(state, Relation::Last).await
    }

    /// Refetch the page `state` was captured from.
    pub async fn current(&self, state: &NavigationState) -> Result<Page, Error> {
        self.follow(state, Relation::SelfRel).await
    }
}
