//! Time-bounded waits for a user's next message or component press.
//!
//! Every wait subscribes to the gateway's event stream before it posts its seed
//! message, resolves at most once and reports why it stopped through
//! [`Outcome`]. Failures while talking to the platform never escape: a seed
//! that can't be sent yields [`Outcome::Unstarted`], failed cleanups are logged.

use std::{future::Future, sync::Arc, time::Duration};

use serenity::model::id::{ChannelId, MessageId, UserId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::platform::{
    ComponentPress, Gateway, GatewayEvent, IncomingMessage, MessageRef, OutgoingMessage,
};

pub mod rows;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Matched(T),
    /// The author sent the cancel token.
    Cancelled,
    TimedOut,
    /// The seed message couldn't be sent, nothing was collected.
    Unstarted,
}

impl<T> Outcome<T> {
    pub fn matched(self) -> Option<T> {
        match self {
            Outcome::Matched(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Matched(value) => Outcome::Matched(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::TimedOut => Outcome::TimedOut,
            Outcome::Unstarted => Outcome::Unstarted,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Matched(_) => "matched",
            Outcome::Cancelled => "cancelled",
            Outcome::TimedOut => "timed out",
            Outcome::Unstarted => "unstarted",
        }
    }
}

/// Which branch of a combined wait produced the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<T> {
    Text(T),
    Component(ComponentPress),
}

/// The bot message a wait is attached to.
#[derive(Debug, Clone)]
pub enum Seed {
    Send(OutgoingMessage),
    Reuse(MessageRef),
}

/// What happens to the seed message once the wait is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedCleanup {
    #[default]
    Keep,
    Delete,
    ClearComponents,
}

/// Wait for a text message from one author.
#[derive(Debug, Clone)]
pub struct TextWait {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub duration: Duration,
    pub seed: Option<Seed>,
    /// Compared case-insensitively, ignoring surrounding whitespace.
    pub cancel_token: Option<String>,
    /// Delete every message from the author while waiting, matched or not.
    pub delete_replies: bool,
    pub delete_seed_after: bool,
}

/// Wait for a press on any component whose custom id starts with `namespace`.
#[derive(Debug, Clone)]
pub struct ComponentWait {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub duration: Duration,
    pub namespace: String,
    pub acknowledge: bool,
}

/// Wait for a press on one of the seed message's components.
#[derive(Debug, Clone)]
pub struct OwnedComponentWait {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub duration: Duration,
    pub seed: Seed,
    pub acknowledge: bool,
    pub cleanup: SeedCleanup,
}

#[derive(Debug, Clone)]
pub enum EitherTarget {
    /// Presses must land on the seed message.
    Seeded { seed: Seed, cleanup: SeedCleanup },
    /// No bot message, presses are scoped by custom id prefix.
    Namespaced(String),
}

/// Race a text reply against a component press.
#[derive(Debug, Clone)]
pub struct EitherWait {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub duration: Duration,
    pub target: EitherTarget,
    pub cancel_token: Option<String>,
    pub delete_replies: bool,
    pub acknowledge: bool,
}

pub fn is_cancel(token: &str, content: &str) -> bool {
    content.trim().to_lowercase() == token.trim().to_lowercase()
}

struct ReplyFilter<'a> {
    channel_id: ChannelId,
    author_id: UserId,
    cancel_token: Option<&'a str>,
    delete_replies: bool,
}

enum Scope {
    Message(MessageId),
    Namespace(String),
}

struct PressFilter {
    channel_id: ChannelId,
    author_id: UserId,
    scope: Scope,
    acknowledge: bool,
}

impl PressFilter {
    fn accepts(&self, press: &ComponentPress) -> bool {
        if press.channel_id != self.channel_id || press.author_id != self.author_id {
            return false;
        }

        match &self.scope {
            Scope::Message(id) => press.message_id == *id,
            Scope::Namespace(namespace) => press.custom_id.starts_with(namespace.as_str()),
        }
    }
}

/// Applies the seed cleanup when a wait resolves. `finish` takes `self`, so the
/// cleanup can't run twice.
struct Finisher<'a> {
    gateway: &'a dyn Gateway,
    seed: Option<MessageRef>,
    cleanup: SeedCleanup,
}

impl<'a> Finisher<'a> {
    fn new(gateway: &'a dyn Gateway, seed: Option<MessageRef>, cleanup: SeedCleanup) -> Self {
        Self {
            gateway,
            seed,
            cleanup,
        }
    }

    async fn finish<T: Send>(self, outcome: Outcome<T>) -> Outcome<T> {
        if let Some(seed) = self.seed {
            let result = match self.cleanup {
                SeedCleanup::Keep => Ok(()),
                SeedCleanup::Delete => self.gateway.delete(seed).await,
                SeedCleanup::ClearComponents => self.gateway.clear_components(seed).await,
            };

            if let Err(err) = result {
                warn!(message = %seed.id, "couldn't clean up collector message: {}", err);
            }
        }

        debug!(outcome = outcome.label(), "collector finished");
        outcome
    }
}

async fn within<T>(duration: Duration, wait: impl Future<Output = Outcome<T>>) -> Outcome<T> {
    tokio::time::timeout(duration, wait)
        .await
        .unwrap_or(Outcome::TimedOut)
}

async fn next_event(events: &mut broadcast::Receiver<GatewayEvent>) -> Option<GatewayEvent> {
    match events.recv().await {
        Ok(event) => Some(event),
        Err(RecvError::Lagged(skipped)) => {
            debug!(skipped, "collector fell behind the event stream");
            None
        }
        // nothing will ever arrive, let the deadline decide
        Err(RecvError::Closed) => std::future::pending().await,
    }
}

#[derive(Clone)]
pub struct Collector {
    gateway: Arc<dyn Gateway>,
}

impl Collector {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Waits for a message the extractor accepts.
    pub async fn text<T, F>(&self, wait: TextWait, mut extract: F) -> Outcome<T>
    where
        T: Send,
        F: FnMut(&IncomingMessage) -> Option<T> + Send,
    {
        let mut events = self.gateway.subscribe();

        let seed = match wait.seed {
            Some(seed) => {
                let Some(sent) = self.start(wait.channel_id, seed).await else {
                    return Outcome::Unstarted;
                };
                Some(sent)
            }
            None => None,
        };
        let cleanup = if wait.delete_seed_after {
            SeedCleanup::Delete
        } else {
            SeedCleanup::Keep
        };
        let finisher = Finisher::new(self.gateway.as_ref(), seed, cleanup);

        let filter = ReplyFilter {
            channel_id: wait.channel_id,
            author_id: wait.author_id,
            cancel_token: wait.cancel_token.as_deref(),
            delete_replies: wait.delete_replies,
        };
        let outcome = within(
            wait.duration,
            self.next_reply(&mut events, &filter, &mut extract),
        )
        .await;

        finisher.finish(outcome).await
    }

    /// Waits for a namespaced component press without owning any message.
    pub async fn component(&self, wait: ComponentWait) -> Outcome<ComponentPress> {
        let mut events = self.gateway.subscribe();
        let filter = PressFilter {
            channel_id: wait.channel_id,
            author_id: wait.author_id,
            scope: Scope::Namespace(wait.namespace),
            acknowledge: wait.acknowledge,
        };

        within(wait.duration, async {
            Outcome::Matched(self.next_press(&mut events, &filter).await)
        })
        .await
    }

    /// Waits for a press on the seed message's components.
    pub async fn owned_component(&self, wait: OwnedComponentWait) -> Outcome<ComponentPress> {
        let mut events = self.gateway.subscribe();

        let Some(seed) = self.start(wait.channel_id, wait.seed).await else {
            return Outcome::Unstarted;
        };
        let finisher = Finisher::new(self.gateway.as_ref(), Some(seed), wait.cleanup);

        let filter = PressFilter {
            channel_id: seed.channel_id,
            author_id: wait.author_id,
            scope: Scope::Message(seed.id),
            acknowledge: wait.acknowledge,
        };
        let outcome = within(wait.duration, async {
            Outcome::Matched(self.next_press(&mut events, &filter).await)
        })
        .await;

        finisher.finish(outcome).await
    }

    /// Waits for whichever comes first, an accepted text reply or a component
    /// press. The losing branch is dropped.
    pub async fn either<T, F>(&self, wait: EitherWait, mut extract: F) -> Outcome<Either<T>>
    where
        T: Send,
        F: FnMut(&IncomingMessage) -> Option<T> + Send,
    {
        let mut messages = self.gateway.subscribe();
        let mut presses = self.gateway.subscribe();

        let (seed, cleanup, scope) = match wait.target {
            EitherTarget::Seeded { seed, cleanup } => {
                let Some(sent) = self.start(wait.channel_id, seed).await else {
                    return Outcome::Unstarted;
                };
                (Some(sent), cleanup, Scope::Message(sent.id))
            }
            EitherTarget::Namespaced(namespace) => {
                (None, SeedCleanup::Keep, Scope::Namespace(namespace))
            }
        };
        let finisher = Finisher::new(self.gateway.as_ref(), seed, cleanup);

        let replies = ReplyFilter {
            channel_id: wait.channel_id,
            author_id: wait.author_id,
            cancel_token: wait.cancel_token.as_deref(),
            delete_replies: wait.delete_replies,
        };
        let filter = PressFilter {
            channel_id: seed.map_or(wait.channel_id, |seed| seed.channel_id),
            author_id: wait.author_id,
            scope,
            acknowledge: wait.acknowledge,
        };

        let race = async {
            tokio::select! {
                outcome = self.next_reply(&mut messages, &replies, &mut extract) => {
                    outcome.map(Either::Text)
                }
                press = self.next_press(&mut presses, &filter) => {
                    Outcome::Matched(Either::Component(press))
                }
            }
        };
        let outcome = within(wait.duration, race).await;

        finisher.finish(outcome).await
    }

    async fn start(&self, channel_id: ChannelId, seed: Seed) -> Option<MessageRef> {
        match seed {
            Seed::Reuse(message) => Some(message),
            Seed::Send(message) => match self.gateway.send(channel_id, &message).await {
                Ok(sent) => Some(sent),
                Err(err) => {
                    warn!(channel = %channel_id, "couldn't send collector message: {}", err);
                    None
                }
            },
        }
    }

    /// Deletes a collected reply in the background. The delete outlives the
    /// wait, even when the other branch of a race wins while it is in flight.
    fn discard(&self, message: MessageRef) {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.delete(message).await {
                debug!(message = %message.id, "couldn't delete collected reply: {}", err);
            }
        });
    }

    /// Resolves to `Matched` or `Cancelled`, never anything else.
    async fn next_reply<T, F>(
        &self,
        events: &mut broadcast::Receiver<GatewayEvent>,
        filter: &ReplyFilter<'_>,
        extract: &mut F,
    ) -> Outcome<T>
    where
        F: FnMut(&IncomingMessage) -> Option<T>,
    {
        loop {
            let Some(GatewayEvent::Message(message)) = next_event(events).await else {
                continue;
            };
            if message.channel_id != filter.channel_id || message.author_id != filter.author_id {
                continue;
            }

            if filter.delete_replies {
                self.discard(message.message_ref());
            }

            if filter
                .cancel_token
                .is_some_and(|token| is_cancel(token, &message.content))
            {
                return Outcome::Cancelled;
            }

            if let Some(value) = extract(&message) {
                return Outcome::Matched(value);
            }
        }
    }

    async fn next_press(
        &self,
        events: &mut broadcast::Receiver<GatewayEvent>,
        filter: &PressFilter,
    ) -> ComponentPress {
        loop {
            let Some(GatewayEvent::Component(press)) = next_event(events).await else {
                continue;
            };
            if !filter.accepts(&press) {
                continue;
            }

            if filter.acknowledge {
                if let Err(err) = self.gateway.acknowledge(&press).await {
                    warn!(custom_id = %press.custom_id, "couldn't acknowledge press: {}", err);
                }
            }

            return press;
        }
    }
}
