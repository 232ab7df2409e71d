//! Crate-level error types for feed navigation, publishing, and subscriptions.

/// Error returned by journal client operations.
///
/// The variants partition failures by which layer produced them and who is
/// expected to handle them:
///
/// - [`Transport`](Error::Transport) is retryable by the caller.
/// - [`Decode`](Error::Decode) is fatal for the entry whose payload was
///   malformed, never for the whole page.
/// - [`NoSuchRelation`](Error::NoSuchRelation) signals a feed boundary;
///   callers walking a stream must distinguish it from an empty page,
///   which is the normal end-of-stream signal.
/// - [`Publish`](Error::Publish) and [`Subscription`](Error::Subscription)
///   carry the offending HTTP status; retry policy is the caller's.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure, or a non-success status on a read path.
    ///
    /// Retryable: the request may be repeated safely, since no client-side
    /// state changes until a response has been decoded.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An entry payload was not valid serialized data.
    ///
    /// Scoped to the single entry being decoded; the page containing it
    /// remains usable.
    #[error("failed to decode entry payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A link relation was requested that the current page does not carry.
    ///
    /// `previous`/`next` are absent at the respective stream boundary, so
    /// catch-up loops must terminate on an empty page rather than on this
    /// error. Also raised for a batch entry missing its disposition link.
    #[error("page has no relation '{0}'")]
    NoSuchRelation(String),

    /// A write was rejected with a non-2xx status.
    #[error("publish failed with status {status}")]
    Publish {
        /// HTTP status code returned by the journal.
        status: u16,
    },

    /// Creating or reading a subscription failed.
    #[error("subscription request failed with status {status}")]
    Subscription {
        /// HTTP status code returned by the journal.
        status: u16,
    },
}
