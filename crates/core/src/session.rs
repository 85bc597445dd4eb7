use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One completed query-answer exchange.
#[derive(Debug, Clone)]
struct Exchange {
    query: String,
    answer: String,
}

/// Bounded recent-turn history per session, rendered into the model's
/// system prompt. Sessions are created on first use and hold at most
/// `max_exchanges` entries, oldest dropped first.
pub struct SessionTracker {
    max_exchanges: usize,
    sessions: Mutex<HashMap<String, VecDeque<Exchange>>>,
}

impl SessionTracker {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            max_exchanges,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Renders prior exchanges as alternating `User:`/`Assistant:` lines.
    /// Empty string for an unknown or fresh session.
    pub async fn history(&self, session_id: &str) -> String {
        let sessions = self.sessions.lock().await;
        let Some(exchanges) = sessions.get(session_id) else {
            return String::new();
        };

        exchanges
            .iter()
            .map(|exchange| format!("User: {}\nAssistant: {}", exchange.query, exchange.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn record(&self, session_id: &str, query: &str, answer: &str) {
        let mut sessions = self.sessions.lock().await;
        let exchanges = sessions.entry(session_id.to_string()).or_default();
        exchanges.push_back(Exchange {
            query: query.to_string(),
            answer: answer.to_string(),
        });
        while exchanges.len() > self.max_exchanges {
            exchanges.pop_front();
        }
    }

    pub async fn clear(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}
