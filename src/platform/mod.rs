//! The seam between bot logic and the chat platform.
//!
//! Commands and collectors only ever talk to a [`Gateway`] (channel-level
//! operations and the inbound event stream) and a [`Responder`] (replies to one
//! invocation). The serenity-backed implementations live in [`discord`].

use serenity::{
    async_trait,
    model::id::{ChannelId, InteractionId, MessageId, UserId},
};
use tokio::sync::broadcast;

use crate::{collector::rows::pack_rows, embed::Embed};

pub mod discord;

/// How many gateway events a slow subscriber may fall behind before it starts
/// skipping them.
const HUB_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Discord(#[from] serenity::Error),
    #[error("{0}")]
    Rejected(String),
}

/// A message that has been posted and can be edited or deleted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            id: self.id,
        }
    }
}

/// A click on a button or a choice in a select menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPress {
    pub interaction_id: InteractionId,
    pub token: String,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author_id: UserId,
    pub custom_id: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Message(IncomingMessage),
    Component(ComponentPress),
}

/// Fan-out of gateway events to every collector currently waiting.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: GatewayEvent) {
        // no receivers just means nobody is collecting right now
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSpec {
    Button(Button),
    Select(SelectMenu),
}

/// A new message posted by the bot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub rows: Vec<Vec<ComponentSpec>>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Lays the components out into action rows, dropping whatever doesn't fit.
    pub fn components(mut self, components: Vec<ComponentSpec>) -> Self {
        self.rows = pack_rows(components);
        self
    }
}

/// A response to a command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub rows: Vec<Vec<ComponentSpec>>,
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn components(mut self, components: Vec<ComponentSpec>) -> Self {
        self.rows = pack_rows(components);
        self
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent>;

    async fn send(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, PlatformError>;

    async fn delete(&self, message: MessageRef) -> Result<(), PlatformError>;

    async fn clear_components(&self, message: MessageRef) -> Result<(), PlatformError>;

    /// Acknowledges a component press without changing the message it sits on.
    async fn acknowledge(&self, press: &ComponentPress) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// The first call answers the invocation, later calls post follow-ups.
    async fn reply(&self, reply: Reply) -> Result<(), PlatformError>;

    /// The message created by the first reply.
    async fn original(&self) -> Result<MessageRef, PlatformError>;
}
