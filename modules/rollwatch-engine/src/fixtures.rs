//! Shared test fixtures: canned embeds, messages, and a mock messenger.

use std::sync::Mutex;

use async_trait::async_trait;

use rollwatch_common::{ChatEmbed, GatewayMessage};

use crate::notify::{AlertPayload, DirectMessenger, NotifyError};

/// A single-character embed with an author line and description.
pub fn embed(author: &str, description: &str) -> ChatEmbed {
    ChatEmbed {
        author_line: Some(author.to_string()),
        description: Some(description.to_string()),
        ..Default::default()
    }
}

/// A message from the game bot carrying one embed.
pub fn game_message(embed: ChatEmbed) -> GatewayMessage {
    GatewayMessage {
        author_id: 999,
        author_name: "Mudae".to_string(),
        is_bot: true,
        content: String::new(),
        embeds: vec![embed],
    }
}

/// A plain text message from a user.
pub fn user_message(author_id: i64, author_name: &str, content: &str) -> GatewayMessage {
    GatewayMessage {
        author_id,
        author_name: author_name.to_string(),
        is_bot: false,
        content: content.to_string(),
        embeds: Vec::new(),
    }
}

/// Records recipients; optionally fails for one of them.
#[derive(Default)]
pub struct MockMessenger {
    sent: Mutex<Vec<i64>>,
    fail_for: Option<i64>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(user_id: i64) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(user_id),
        }
    }

    pub fn sent_to(&self) -> Vec<i64> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectMessenger for MockMessenger {
    async fn send_direct_message(
        &self,
        user_id: i64,
        _payload: &AlertPayload,
    ) -> Result<(), NotifyError> {
        if self.fail_for == Some(user_id) {
            return Err(NotifyError::Forbidden(user_id));
        }
        self.sent.lock().unwrap().push(user_id);
        Ok(())
    }
}
