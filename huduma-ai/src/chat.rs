//! Chat session lifecycle - streaming conversational state per client.
//!
//! Sessions live in a process-wide table keyed by an opaque identifier and
//! hold the accumulated turn history between a client's `init` and `close`
//! calls. Nothing is persisted: all sessions are lost on process restart.
//!
//! Concurrent `send_turn` calls against the *same* session are not
//! coordinated here; the remote conversational context is assumed
//! single-writer and serializing turns per session is the caller's
//! responsibility.

use crate::error::AiError;
use crate::provider::{FragmentStream, GenerateRequest, GenerativeBackend, Turn};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use huduma_common::config::{AiConfig, ChatConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// One live conversational context.
struct ChatSession {
    owner: String,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

/// Process-wide manager for chat sessions.
///
/// Lifecycle per session: `Absent -> Active -> Closed`, where `Closed`
/// sessions are removed from the table, not archived.
pub struct ChatSessionManager {
    backend: Arc<dyn GenerativeBackend>,
    ai: AiConfig,
    chat: ChatConfig,
    sessions: Arc<DashMap<String, ChatSession>>,
}

impl ChatSessionManager {
    pub fn new(backend: Arc<dyn GenerativeBackend>, ai: AiConfig, chat: ChatConfig) -> Self {
        Self {
            backend,
            ai,
            chat,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Create a session for `owner` and return its identifier.
    ///
    /// The identifier is unique for the process lifetime. A non-empty
    /// `opening_message` seeds the conversational context as the first
    /// user turn.
    pub fn init(&self, owner: &str, opening_message: &str) -> String {
        let session_id = format!("{}-{}", owner, Uuid::new_v4());

        let mut turns = Vec::new();
        if !opening_message.trim().is_empty() {
            turns.push(Turn::user(opening_message));
        }

        self.sessions.insert(
            session_id.clone(),
            ChatSession {
                owner: owner.to_string(),
                turns,
                created_at: Utc::now(),
                last_activity: Instant::now(),
            },
        );

        tracing::info!(session_id = %session_id, owner, "chat session created");
        session_id
    }

    /// Send the next user turn and stream the model's reply.
    ///
    /// Returns a finite, in-order, consume-once sequence of text
    /// fragments. When the stream completes, the user turn and the full
    /// reply are appended to the session history. Fails with
    /// [`AiError::SessionNotFound`] if the session is absent or already
    /// closed.
    pub async fn send_turn(&self, session_id: &str, text: &str) -> Result<FragmentStream, AiError> {
        let turns = {
            let mut session = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| AiError::SessionNotFound(session_id.to_string()))?;
            session.last_activity = Instant::now();
            let mut turns = session.turns.clone();
            turns.push(Turn::user(text));
            turns
        };

        let request = GenerateRequest {
            model: self.ai.model.clone(),
            system: Some(self.chat.system_instruction.clone()),
            turns,
            response_schema: None,
            grounding: false,
            temperature: Some(self.ai.temperature),
            max_output_tokens: Some(self.ai.max_output_tokens),
        };

        let mut backend_rx = self.backend.generate_stream(request).await?;
        let (tx, rx) = mpsc::channel(32);
        let sessions = Arc::clone(&self.sessions);
        let session_id = session_id.to_string();
        let user_text = text.to_string();

        tokio::spawn(async move {
            let mut reply = String::new();
            let mut receiver_gone = false;

            while let Some(fragment) = backend_rx.recv().await {
                if let Ok(piece) = &fragment {
                    reply.push_str(piece);
                }
                if !receiver_gone && tx.send(fragment).await.is_err() {
                    // Keep draining so the exchange still lands in history
                    receiver_gone = true;
                    tracing::debug!(session_id = %session_id, "chat fragment receiver dropped");
                }
            }

            if reply.is_empty() {
                return;
            }
            match sessions.get_mut(&session_id) {
                Some(mut session) => {
                    session.turns.push(Turn::user(user_text));
                    session.turns.push(Turn::model(reply));
                    session.last_activity = Instant::now();
                }
                None => {
                    tracing::debug!(
                        session_id = %session_id,
                        "session closed mid-stream, exchange not recorded"
                    );
                }
            }
        });

        Ok(rx)
    }

    /// Close a session, removing it from the live table.
    ///
    /// Idempotent at the observable level: closing an absent or already
    /// closed session is a warn-logged no-op returning `false`, never an
    /// error, since the caller cannot distinguish the two cases.
    pub fn close(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                tracing::info!(
                    session_id,
                    owner = %session.owner,
                    opened_at = %session.created_at,
                    turns = session.turns.len(),
                    "chat session closed"
                );
                true
            }
            None => {
                tracing::warn!(
                    session_id,
                    "close for unknown or already closed session, treating as no-op"
                );
                false
            }
        }
    }

    /// Reclaim sessions idle longer than the configured timeout.
    ///
    /// A no-op unless `chat.idle_timeout_secs` is set; disabled by
    /// default. Returns the number of sessions removed.
    pub fn sweep_idle(&self) -> usize {
        let Some(secs) = self.chat.idle_timeout_secs else {
            return 0;
        };
        let timeout = Duration::from_secs(secs);

        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_activity.elapsed() < timeout);
        let removed = before - self.sessions.len();

        if removed > 0 {
            tracing::info!(removed, "idle chat sessions reclaimed");
        }
        removed
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of recorded turns in a session, if it exists.
    pub fn turn_count(&self, session_id: &str) -> Option<usize> {
        self.sessions.get(session_id).map(|s| s.turns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerateResponse;
    use async_trait::async_trait;

    /// Streams a fixed fragment script for every turn.
    struct ScriptedBackend {
        fragments: Vec<&'static str>,
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, AiError> {
            Err(AiError::remote("streaming only"))
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> Result<FragmentStream, AiError> {
            let (tx, rx) = mpsc::channel(8);
            let fragments = self.fragments.clone();
            tokio::spawn(async move {
                for fragment in fragments {
                    if tx.send(Ok(fragment.to_string())).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn manager(fragments: Vec<&'static str>) -> ChatSessionManager {
        ChatSessionManager::new(
            Arc::new(ScriptedBackend { fragments }),
            AiConfig::default(),
            ChatConfig::default(),
        )
    }

    async fn drain(mut rx: FragmentStream) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment.unwrap());
        }
        fragments
    }

    #[tokio::test]
    async fn init_creates_an_active_session() {
        let chats = manager(vec![]);
        let id = chats.init("customer-7", "I need a plumber in Kilimani");
        assert!(id.starts_with("customer-7-"));
        assert_eq!(chats.session_count(), 1);
        assert_eq!(chats.turn_count(&id), Some(1));
    }

    #[tokio::test]
    async fn session_ids_are_unique() {
        let chats = manager(vec![]);
        let a = chats.init("customer-7", "");
        let b = chats.init("customer-7", "");
        assert_ne!(a, b);
        assert_eq!(chats.session_count(), 2);
    }

    #[tokio::test]
    async fn send_turn_streams_in_order_and_records_history() {
        let chats = manager(vec!["We have ", "three plumbers ", "nearby."]);
        let id = chats.init("customer-7", "");
        assert_eq!(chats.turn_count(&id), Some(0));

        let rx = chats.send_turn(&id, "Find me a plumber").await.unwrap();
        let fragments = drain(rx).await;
        assert_eq!(fragments, vec!["We have ", "three plumbers ", "nearby."]);

        // The drained channel closes only after the exchange is recorded
        assert_eq!(chats.turn_count(&id), Some(2));
    }

    #[tokio::test]
    async fn send_turn_to_unknown_session_fails() {
        let chats = manager(vec!["hi"]);
        let err = chats.send_turn("nope", "hello").await.unwrap_err();
        assert!(matches!(err, AiError::SessionNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn send_turn_after_close_fails() {
        let chats = manager(vec!["hi"]);
        let id = chats.init("customer-7", "");
        assert!(chats.close(&id));

        let err = chats.send_turn(&id, "still there?").await.unwrap_err();
        assert!(err.is_session_not_found());
    }

    #[tokio::test]
    async fn double_close_is_a_benign_no_op() {
        let chats = manager(vec![]);
        let id = chats.init("customer-7", "hello");

        assert!(chats.close(&id));
        assert!(!chats.close(&id));
        assert_eq!(chats.session_count(), 0);
    }

    #[tokio::test]
    async fn sweep_is_disabled_by_default() {
        let chats = manager(vec![]);
        chats.init("a", "");
        chats.init("b", "");
        assert_eq!(chats.sweep_idle(), 0);
        assert_eq!(chats.session_count(), 2);
    }

    #[tokio::test]
    async fn sweep_reclaims_idle_sessions_when_enabled() {
        let chats = ChatSessionManager::new(
            Arc::new(ScriptedBackend { fragments: vec![] }),
            AiConfig::default(),
            ChatConfig {
                idle_timeout_secs: Some(0),
                ..ChatConfig::default()
            },
        );
        chats.init("a", "");
        chats.init("b", "");
        assert_eq!(chats.sweep_idle(), 2);
        assert_eq!(chats.session_count(), 0);
    }
}
