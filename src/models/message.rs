use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub trip_id: i64,
}

/// A chat message together with its author's name.
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_name: String,
}

impl ChatMessage {
    pub fn timestamp(&self) -> String {
        self.created_at.format("%b %d, %Y at %H:%M").to_string()
    }
}

/// Wire shape of one entry in `{"messages": [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageJson {
    pub id: i64,
    pub text: String,
    pub author_name: String,
    pub author_id: i64,
    pub timestamp: String,
}

impl From<ChatMessage> for MessageJson {
    fn from(message: ChatMessage) -> Self {
        let timestamp = message.timestamp();
        Self {
            id: message.id,
            text: message.text,
            author_name: message.author_name,
            author_id: message.author_id,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageList {
    pub messages: Vec<MessageJson>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_use_the_chat_format() {
        let message = ChatMessage {
            id: 4,
            text: "See you at the bridge".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 9, 18, 5, 0).unwrap(),
            author_id: 2,
            author_name: "Bea".into(),
        };
        let json = serde_json::to_value(MessageJson::from(message)).unwrap();
        assert_eq!(json["timestamp"], "Mar 09, 2026 at 18:05");
        assert_eq!(json["author_name"], "Bea");
    }
}
