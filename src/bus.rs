use crate::chat::ChatMessage;
use crate::concierge::visits::Visit;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// The intake chat on the chat tab
    Intake,
    /// The per-listing chat overlay
    Property,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A bot or user message was appended to a transcript
    ChatMessage {
        session: String,
        channel: Channel,
        message: ChatMessage,
    },

    /// The typing indicator of a transcript changed
    Typing {
        session: String,
        channel: Channel,
        typing: bool,
    },

    /// Intake finished and the match list is populated
    MatchesReady { session: String, count: usize },

    /// A visit was created or its status changed
    VisitUpdated { session: String, visit: Visit },

    /// A session-level notice (e.g. session ended)
    SessionNotification {
        level: NotificationLevel,
        message: String,
        target: Option<String>, // If None, broadcast to everyone
    },
}

impl Event {
    /// Session this event belongs to; `None` for broadcast notices.
    pub fn session(&self) -> Option<&str> {
        match self {
            Event::ChatMessage { session, .. }
            | Event::Typing { session, .. }
            | Event::MatchesReady { session, .. }
            | Event::VisitUpdated { session, .. } => Some(session),
            Event::SessionNotification { target, .. } => target.as_deref(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::ChatMessage { .. } => "chat_message",
            Event::Typing { .. } => "typing",
            Event::MatchesReady { .. } => "matches_ready",
            Event::VisitUpdated { .. } => "visit_updated",
            Event::SessionNotification { .. } => "session_notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // We ignore the error if there are no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(Event::MatchesReady {
            session: "ses_a".into(),
            count: 3,
        });

        let mut rx = bus.subscribe();
        bus.publish(Event::Typing {
            session: "ses_a".into(),
            channel: Channel::Intake,
            typing: true,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session(), Some("ses_a"));
        assert_eq!(event.name(), "typing");
    }

    #[test]
    fn events_serialize_with_type_and_data() {
        let event = Event::MatchesReady {
            session: "ses_a".into(),
            count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MatchesReady");
        assert_eq!(json["data"]["count"], 3);
    }
}
