use crate::domain::message::MessageType;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationType {
    Direct,
    /// Declared for group threads; nothing creates one yet.
    Group,
}

impl ConversationType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl FromStr for ConversationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "group" => Ok(Self::Group),
            other => Err(format!("unknown conversation type '{other}'")),
        }
    }
}

/// Order-independent identity of a direct conversation between two users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String);

impl PairKey {
    #[must_use]
    pub fn direct(user_a: &str, user_b: &str) -> Self {
        let (low, high) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
        Self(format!("{low}:{high}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Denormalized copy of the newest message, kept on the conversation for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    pub timestamp: OffsetDateTime,
    pub message_type: MessageType,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub conversation_type: ConversationType,
    pub participants: Vec<String>,
    pub pair_key: Option<String>,
    pub last_message: Option<LastMessage>,
    pub unread_counts: BTreeMap<String, i64>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Conversation {
    #[must_use]
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Unread count for `user_id`; a missing entry means nothing is unread.
    #[must_use]
    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }

    pub fn other_participants<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.participants.iter().map(String::as_str).filter(move |p| *p != user_id)
    }

    /// Applies a freshly appended message to the summary fields.
    ///
    /// The snapshot only moves forward in time, the receiver's counter always increments.
    pub fn apply_message(&mut self, snapshot: &LastMessage, receiver_id: &str) {
        let newer = self.last_message.as_ref().is_none_or(|current| current.timestamp <= snapshot.timestamp);
        if newer {
            self.last_message = Some(snapshot.clone());
        }
        *self.unread_counts.entry(receiver_id.to_string()).or_insert(0) += 1;
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// Input for creating the direct conversation of a pair.
#[derive(Debug, Clone)]
pub struct NewDirectConversation {
    pub id: Uuid,
    pub pair_key: PairKey,
    pub participants: [String; 2],
    pub created_by: String,
}

impl NewDirectConversation {
    #[must_use]
    pub fn new(initiator: &str, counterpart: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            pair_key: PairKey::direct(initiator, counterpart),
            participants: [initiator.to_string(), counterpart.to_string()],
            created_by: initiator.to_string(),
        }
    }

    #[must_use]
    pub fn into_conversation(self, now: OffsetDateTime) -> Conversation {
        let unread_counts = self.participants.iter().map(|p| (p.clone(), 0)).collect();
        Conversation {
            id: self.id,
            conversation_type: ConversationType::Direct,
            participants: self.participants.to_vec(),
            pair_key: Some(self.pair_key.as_str().to_string()),
            last_message: None,
            unread_counts,
            is_active: true,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn snapshot(content: &str, at: OffsetDateTime) -> LastMessage {
        LastMessage {
            content: content.to_string(),
            sender_id: "alice".to_string(),
            timestamp: at,
            message_type: MessageType::Text,
        }
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(PairKey::direct("alice", "bob"), PairKey::direct("bob", "alice"));
        assert_eq!(PairKey::direct("bob", "alice").as_str(), "alice:bob");
        assert_ne!(PairKey::direct("alice", "bob"), PairKey::direct("alice", "carol"));
    }

    #[test]
    fn test_new_direct_conversation_starts_with_zero_counters() {
        let conversation = NewDirectConversation::new("bob", "alice").into_conversation(OffsetDateTime::now_utc());

        assert_eq!(conversation.participants, vec!["bob".to_string(), "alice".to_string()]);
        assert_eq!(conversation.created_by, "bob");
        assert_eq!(conversation.pair_key.as_deref(), Some("alice:bob"));
        assert_eq!(conversation.unread_for("alice"), 0);
        assert_eq!(conversation.unread_for("bob"), 0);
        assert!(conversation.last_message.is_none());
        assert!(conversation.is_active);
    }

    #[test]
    fn test_apply_message_increments_receiver_only() {
        let mut conversation = NewDirectConversation::new("alice", "bob").into_conversation(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();

        conversation.apply_message(&snapshot("hello", now), "bob");
        conversation.apply_message(&snapshot("again", now + Duration::seconds(1)), "bob");

        assert_eq!(conversation.unread_for("bob"), 2);
        assert_eq!(conversation.unread_for("alice"), 0);
        assert_eq!(conversation.last_message.as_ref().map(|m| m.content.as_str()), Some("again"));
    }

    #[test]
    fn test_apply_message_keeps_newer_snapshot() {
        let mut conversation = NewDirectConversation::new("alice", "bob").into_conversation(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();

        conversation.apply_message(&snapshot("newer", now), "bob");
        conversation.apply_message(&snapshot("older", now - Duration::seconds(5)), "bob");

        assert_eq!(conversation.last_message.as_ref().map(|m| m.content.as_str()), Some("newer"));
        assert_eq!(conversation.unread_for("bob"), 2);
    }

    #[test]
    fn test_apply_message_creates_missing_counter() {
        let mut conversation = NewDirectConversation::new("alice", "bob").into_conversation(OffsetDateTime::now_utc());
        conversation.unread_counts.clear();

        conversation.apply_message(&snapshot("hi", OffsetDateTime::now_utc()), "bob");

        assert_eq!(conversation.unread_counts.get("bob"), Some(&1));
    }

    #[test]
    fn test_other_participants() {
        let conversation = NewDirectConversation::new("alice", "bob").into_conversation(OffsetDateTime::now_utc());
        let others: Vec<&str> = conversation.other_participants("alice").collect();
        assert_eq!(others, vec!["bob"]);
        assert!(conversation.is_participant("bob"));
        assert!(!conversation.is_participant("mallory"));
    }
}
