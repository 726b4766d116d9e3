//! In-process chat history

use crate::error::Result;
use crate::model::{ChatMetadata, ChatTurn};
use crate::providers::ChatHistory;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Maximum number of turns kept per user
const MAX_HISTORY_SIZE: usize = 50;

/// Chat history held in memory, newest turn first per user
#[derive(Debug)]
pub struct InMemoryChatHistory {
    turns: RwLock<HashMap<String, VecDeque<ChatTurn>>>,
    max_history: usize,
}

impl Default for InMemoryChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::with_max_history(MAX_HISTORY_SIZE)
    }

    /// Create with custom history size
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Number of turns stored for a user
    pub async fn len(&self, user_id: &str) -> usize {
        self.turns.read().await.get(user_id).map_or(0, VecDeque::len)
    }

    pub async fn clear(&self, user_id: &str) {
        self.turns.write().await.remove(user_id);
    }
}

#[async_trait]
impl ChatHistory for InMemoryChatHistory {
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        let turns = self.turns.read().await;
        Ok(turns
            .get(user_id)
            .map(|history| history.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn append(
        &self,
        user_id: &str,
        query: &str,
        response: &str,
        metadata: ChatMetadata,
    ) -> Result<()> {
        let mut turns = self.turns.write().await;
        let history = turns
            .entry(user_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.max_history));

        history.push_front(ChatTurn {
            query: query.to_string(),
            response: response.to_string(),
            metadata,
        });
        history.truncate(self.max_history);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metadata(symbol: &str) -> ChatMetadata {
        ChatMetadata {
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            analysis_type: "followup".to_string(),
        }
    }

    #[tokio::test]
    async fn test_newest_first() {
        let history = InMemoryChatHistory::new();
        history.append("u1", "first", "a", metadata("AAPL")).await.unwrap();
        history.append("u1", "second", "b", metadata("AAPL")).await.unwrap();

        let turns = history.recent("u1", 10).await.unwrap();
        assert_eq!(turns[0].query, "second");
        assert_eq!(turns[1].query, "first");
        assert!(history.recent("u2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let history = InMemoryChatHistory::with_max_history(3);
        for i in 0..5 {
            history
                .append("u1", &format!("q{i}"), "r", metadata("AAPL"))
                .await
                .unwrap();
        }

        assert_eq!(history.len("u1").await, 3);
        let turns = history.recent("u1", 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].query, "q4");

        history.clear("u1").await;
        assert_eq!(history.len("u1").await, 0);
    }
}
