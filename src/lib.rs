//! Client for an Atom-feed event journal: stream navigation, publishing,
//! and competing-consumer subscriptions over HTTP.

mod client;
pub use client::{Credentials, JournalClient};
mod command;
pub use command::{decide, Command, CommandProcessor, Decision, Outcome};
mod error;
pub use error::Error;
mod event;
pub use event::{
    content_stream_id, Asset, ContentBody, ContentDoc, ContentEvent, OriginalPayload,
};
mod feed;
pub use feed::{
    decode_page, sort_entries, Author, NavLink, Page, ProposedEvent, Relation, StreamEntry,
    StreamPosition,
};
mod navigator;
pub use navigator::{NavigationState, StreamNavigator};
mod projection;
pub use projection::{ContentProjection, Rebuilder};
mod publisher;
pub use publisher::{Publisher, StreamAcl};
mod subscription;
pub use subscription::{
    AtomLink, Batch, BatchEntry, ConsumerStrategy, Disposition, NackAction, SubscriptionClient,
    SubscriptionSettings,
};
