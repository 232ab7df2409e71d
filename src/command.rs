//! Command decisions and processing.
//!
//! [`decide`] is a pure state machine over `(projection, command)`: no I/O,
//! no side effects. [`CommandProcessor`] wraps it with the read-modify-write
//! cycle (rebuild projection, decide, publish) against the journal.

use serde::{Deserialize, Serialize};

use crate::client::JournalClient;
use crate::error::Error;
use crate::event::{content_stream_id, ContentBody, ContentEvent};
use crate::projection::{ContentProjection, Rebuilder};
use crate::publisher::Publisher;

/// A business command targeting one content entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Publish (or re-publish) content.
    PublishContent(ContentBody),
    /// Take an entity down.
    #[serde(rename_all = "camelCase")]
    KillContent {
        /// Entity to kill.
        content_id: String,
        /// Operator-supplied justification.
        reason: String,
    },
    /// Restore a previously killed entity.
    #[serde(rename_all = "camelCase")]
    ReviveContent {
        /// Entity to revive.
        content_id: String,
        /// Operator-supplied justification.
        reason: String,
    },
}

impl Command {
    /// The entity this command targets.
    pub fn entity_id(&self) -> &str {
        match self {
            Command::PublishContent(body) => &body.content.id,
            Command::KillContent { content_id, .. } => content_id,
            Command::ReviveContent { content_id, .. } => content_id,
        }
    }
}

/// The outcome of deciding one command against one projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Accept: emit this event.
    Emit(ContentEvent),
    /// Reject: do not publish anything.
    Reject(&'static str),
}

/// Decide a command against the current projection.
///
/// Pure decision function over the entity lifecycle
/// `Nonexistent -> Live <-> Dead` (dead entities can be revived):
///
/// | Command        | Precondition   | Effect                  |
/// |----------------|----------------|-------------------------|
/// | PublishContent | status == `""` | emit `ContentCreated`   |
/// | PublishContent | status != `""` | emit `ContentUpdated`   |
/// | KillContent    | status != `""` | emit `ContentKilled`    |
/// | KillContent    | status == `""` | reject                  |
/// | ReviveContent  | status != `""` | emit `ContentRevived`   |
/// | ReviveContent  | status == `""` | reject                  |
pub fn decide(projection: &ContentProjection, command: &Command) -> Decision {
    match command {
        Command::PublishContent(body) => {
            if projection.exists() {
                Decision::Emit(ContentEvent::ContentUpdated(body.clone()))
            } else {
                Decision::Emit(ContentEvent::ContentCreated(body.clone()))
            }
        }
        Command::KillContent { content_id, reason } => {
            if projection.exists() {
                Decision::Emit(ContentEvent::ContentKilled {
                    content_id: content_id.clone(),
                    reason: reason.clone(),
                })
            } else {
                Decision::Reject("cannot kill nonexistent content")
            }
        }
        Command::ReviveContent { content_id, reason } => {
            if projection.exists() {
                Decision::Emit(ContentEvent::ContentRevived {
                    content_id: content_id.clone(),
                    reason: reason.clone(),
                })
            } else {
                Decision::Reject("cannot revive nonexistent content")
            }
        }
    }
}

/// What happened to one processed command.
///
/// Rejection is a normal outcome, not an error: the processor returns
/// without publishing and the caller's batch continues.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The command was accepted and its event published.
    Published {
        /// Stream the event was appended to.
        stream: String,
        /// The event that was published.
        event: ContentEvent,
    },
    /// The command violated a lifecycle precondition; nothing was published.
    Rejected {
        /// Why the command was rejected.
        reason: &'static str,
    },
}

/// Translates commands into published events.
///
/// Each command runs one full read-modify-write cycle: rebuild the target
/// entity's projection, [`decide`], and publish the emitted event to the
/// entity's dedicated stream.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    rebuilder: Rebuilder,
    publisher: Publisher,
}

impl CommandProcessor {
    /// Create a processor over the given client.
    pub fn new(client: JournalClient) -> Self {
        Self {
            rebuilder: Rebuilder::new(client.clone()),
            publisher: Publisher::new(client),
        }
    }

    /// Process a single command.
    ///
    /// # Errors
    ///
    /// Publish failures ([`Error::Publish`], [`Error::Transport`])
    /// propagate so the caller can route the original input to its
    /// error-handling path. A rejected command is `Ok(Outcome::Rejected)`,
    /// never an error.
    pub async fn process(&self, command: &Command) -> Result<Outcome, Error> {
        let entity_id = command.entity_id();
        let projection = self.rebuilder.rebuild(entity_id).await;

        match decide(&projection, command) {
            Decision::Emit(event) => {
                let stream = content_stream_id(entity_id);
                let proposed = event.to_proposed()?;
                self.publisher.publish(&stream, &[proposed]).await?;
                tracing::info!(
                    entity = entity_id,
                    event_type = event.event_type(),
                    "accepted command"
                );
                Ok(Outcome::Published { stream, event })
            }
            Decision::Reject(reason) => {
                tracing::warn!(entity = entity_id, reason, "rejected command");
                Ok(Outcome::Rejected { reason })
            }
        }
    }

    /// Process commands strictly sequentially.
    ///
    /// One full read-modify-write cycle per command, never batched: each
    /// command's outcome depends on a projection that the previous command
    /// in the same batch may have changed.
    ///
    /// # Errors
    ///
    /// Stops at the first publish failure, returning it; rejections do not
    /// stop the batch.
    pub async fn process_many(&self, commands: &[Command]) -> Result<Vec<Outcome>, Error> {
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            outcomes.push(self.process(command).await?);
        }
        Ok(outcomes)
    }
}
