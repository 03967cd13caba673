//! In-memory stand-ins for the chat platform and the snapshot store.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use serenity::{
    async_trait,
    model::id::{ChannelId, InteractionId, MessageId, UserId},
};
use tokio::sync::broadcast;

use crate::{
    cache::{CourseRecord, CourseStore, FetchClassError},
    course::{Query, SectionRecord},
    platform::{
        ComponentPress, EventHub, Gateway, GatewayEvent, IncomingMessage, MessageRef,
        OutgoingMessage, PlatformError, Reply, Responder,
    },
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1_000);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lets spawned collectors subscribe and park before the test publishes.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn message(channel_id: ChannelId, author_id: UserId, content: &str) -> GatewayEvent {
    GatewayEvent::Message(IncomingMessage {
        id: MessageId(next_id()),
        channel_id,
        author_id,
        content: content.to_owned(),
    })
}

pub fn press(
    channel_id: ChannelId,
    message_id: MessageId,
    author_id: UserId,
    custom_id: &str,
) -> GatewayEvent {
    GatewayEvent::Component(ComponentPress {
        interaction_id: InteractionId(next_id()),
        token: "token".to_owned(),
        channel_id,
        message_id,
        author_id,
        custom_id: custom_id.to_owned(),
        values: Vec::new(),
    })
}

/// A select menu press with one picked value.
pub fn select(
    channel_id: ChannelId,
    message_id: MessageId,
    author_id: UserId,
    custom_id: &str,
    value: &str,
) -> GatewayEvent {
    let mut event = press(channel_id, message_id, author_id, custom_id);
    if let GatewayEvent::Component(press) = &mut event {
        press.values.push(value.to_owned());
    }
    event
}

pub fn section(name: &str) -> SectionRecord {
    SectionRecord {
        class_id: None,
        section: Some(name.to_owned()),
        class_type: Some("LEC".to_owned()),
        instructor: None,
        room: None,
        days_of_week: None,
        start_time: None,
        end_time: None,
        is_open: Some(true),
        open_seats: Some(3),
        total_seats: Some(40),
    }
}

#[derive(Default)]
pub struct FakeGateway {
    hub: EventHub,
    fail_sends: AtomicBool,
    delete_delay: Duration,
    sent: Mutex<Vec<(MessageRef, OutgoingMessage)>>,
    deleted: Mutex<Vec<MessageRef>>,
    cleared: Mutex<Vec<MessageRef>>,
    acknowledged: Mutex<Vec<InteractionId>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let gateway = Self::default();
        gateway.fail_sends.store(true, Ordering::SeqCst);
        Arc::new(gateway)
    }

    /// Deletes take `delay` before they are recorded.
    pub fn slow_deletes(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delete_delay: delay,
            ..Self::default()
        })
    }

    pub fn publish(&self, event: GatewayEvent) {
        self.hub.publish(event);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        let sent = self.sent.lock().unwrap();
        sent.iter().map(|(_, message)| message.clone()).collect()
    }

    pub fn sent_refs(&self) -> Vec<MessageRef> {
        let sent = self.sent.lock().unwrap();
        sent.iter().map(|(message, _)| *message).collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<MessageRef> {
        self.cleared.lock().unwrap().clone()
    }

    pub fn acknowledged(&self) -> Vec<InteractionId> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.hub.subscribe()
    }

    async fn send(
        &self,
        channel_id: ChannelId,
        message: &OutgoingMessage,
    ) -> Result<MessageRef, PlatformError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("missing access".to_owned()));
        }

        let sent = MessageRef {
            channel_id,
            id: MessageId(next_id()),
        };
        self.sent.lock().unwrap().push((sent, message.clone()));
        Ok(sent)
    }

    async fn delete(&self, message: MessageRef) -> Result<(), PlatformError> {
        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }
        self.deleted.lock().unwrap().push(message);
        Ok(())
    }

    async fn clear_components(&self, message: MessageRef) -> Result<(), PlatformError> {
        self.cleared.lock().unwrap().push(message);
        Ok(())
    }

    async fn acknowledge(&self, press: &ComponentPress) -> Result<(), PlatformError> {
        self.acknowledged.lock().unwrap().push(press.interaction_id);
        Ok(())
    }
}

/// Records replies; the first one becomes the "original" message.
pub struct FakeResponder {
    channel_id: ChannelId,
    original: MessageId,
    replies: Mutex<Vec<Reply>>,
}

impl FakeResponder {
    pub fn new(channel_id: ChannelId) -> Arc<Self> {
        Arc::new(Self {
            channel_id,
            original: MessageId(next_id()),
            replies: Mutex::new(Vec::new()),
        })
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }

    pub fn contents(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .filter_map(|reply| reply.content)
            .collect()
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn reply(&self, reply: Reply) -> Result<(), PlatformError> {
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }

    async fn original(&self) -> Result<MessageRef, PlatformError> {
        if self.replies.lock().unwrap().is_empty() {
            return Err(PlatformError::Rejected("no response yet".to_owned()));
        }

        Ok(MessageRef {
            channel_id: self.channel_id,
            id: self.original,
        })
    }
}

/// Serves one course from memory. `update` hands out the same sections again.
#[derive(Default)]
pub struct FakeStore {
    sections: Vec<SectionRecord>,
    latest: Mutex<Option<CourseRecord>>,
    updates: AtomicU64,
    purged: Mutex<Vec<Duration>>,
}

impl FakeStore {
    /// A store with a fresh snapshot of `sections`.
    pub fn with_sections(sections: Vec<SectionRecord>) -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(Some(CourseRecord {
                timestamp: Utc::now(),
                sections: sections.clone(),
            })),
            sections,
            ..Self::default()
        })
    }

    /// A store whose source knows no course at all.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn purged(&self) -> Vec<Duration> {
        self.purged.lock().unwrap().clone()
    }
}

#[async_trait]
impl CourseStore for FakeStore {
    async fn get(&self, _query: &Query) -> Result<Option<CourseRecord>, FetchClassError> {
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn update(&self, query: &Query) -> Result<CourseRecord, FetchClassError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.sections.is_empty() {
            return Err(FetchClassError::CourseNotFound(query.course.clone()));
        }

        let record = CourseRecord {
            timestamp: Utc::now(),
            sections: self.sections.clone(),
        };
        *self.latest.lock().unwrap() = Some(record.clone());
        Ok(record)
    }

    async fn purge(&self, max_age: Duration) -> Result<u64, FetchClassError> {
        self.purged.lock().unwrap().push(max_age);
        Ok(3)
    }
}
