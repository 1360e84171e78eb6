//! Owns the recommendation chat transcript.
//!
//! A turn appends exactly one user message synchronously, then exactly one
//! assistant message (real reply or apology) once the backend call settles.
//! The full transcript is persisted after every mutation.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::gateway::{ConverseReply, HistoryEntry, RecommendBackend};
use crate::model::{ChatMessage, MessageIdGen};
use crate::store::{PersistentStore, CHAT_HISTORY_KEY};

/// Seeded as the first assistant message when no usable history is stored.
pub const WELCOME: &str = "Hi! I'm LIA, your book-recommendation assistant. \
Tell me what kind of book you're looking for, your favorite genre, or \
describe the story you'd like to read.";

pub struct ConversationController {
    gateway: Arc<dyn RecommendBackend>,
    store: PersistentStore,
    messages: Vec<ChatMessage>,
    ids: MessageIdGen,
    /// Current composing text and cursor (in chars) for the input line.
    pub draft: String,
    pub cursor: usize,
    waiting: bool,
    queued: VecDeque<String>,
    pending: Option<JoinHandle<ConverseReply>>,
}

impl ConversationController {
    pub fn new(gateway: Arc<dyn RecommendBackend>, store: PersistentStore) -> Self {
        let mut ids = MessageIdGen::default();
        let messages = store
            .load::<Vec<ChatMessage>>(CHAT_HISTORY_KEY)
            .unwrap_or_else(|| vec![ChatMessage::assistant(ids.next_id(), WELCOME.to_string())]);
        Self {
            gateway,
            store,
            messages,
            ids,
            draft: String::new(),
            cursor: 0,
            waiting: false,
            queued: VecDeque::new(),
            pending: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Blank submissions are silently ignored. While a reply is pending, a
    /// new submission is queued and dispatched once the pending call
    /// settles, so turns never interleave.
    pub fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.draft.clear();
        self.cursor = 0;
        if self.waiting {
            debug!(queued = self.queued.len() + 1, "reply pending, queueing submission");
            self.queued.push_back(text.to_string());
            return;
        }
        self.dispatch(text.to_string());
    }

    fn dispatch(&mut self, text: String) {
        // Snapshot before the append: the backend sees the prior turns only.
        let history: Vec<HistoryEntry> = self.messages.iter().map(HistoryEntry::from).collect();
        self.messages
            .push(ChatMessage::user(self.ids.next_id(), text.clone()));
        self.waiting = true;
        self.persist();

        let gateway = Arc::clone(&self.gateway);
        self.pending = Some(tokio::spawn(async move {
            gateway.converse(text, history).await
        }));
    }

    /// Tick-driven, non-blocking: folds a settled reply into the transcript.
    /// Returns true when a message was appended.
    pub async fn poll_reply(&mut self) -> bool {
        if self.pending.as_ref().is_some_and(|task| task.is_finished()) {
            self.finish_pending().await;
            return true;
        }
        false
    }

    /// Awaits the in-flight call, appends the assistant message, and starts
    /// the next queued submission if there is one.
    pub async fn finish_pending(&mut self) {
        let Some(task) = self.pending.take() else {
            return;
        };
        let reply = match task.await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "reply task panicked or was cancelled");
                ConverseReply::apology()
            }
        };
        debug!(confidence = reply.confidence, "assistant reply received");
        self.messages
            .push(ChatMessage::assistant(self.ids.next_id(), reply.text));
        self.waiting = false;
        self.persist();

        if let Some(next) = self.queued.pop_front() {
            self.dispatch(next);
        }
    }

    fn persist(&self) {
        self.store.save(CHAT_HISTORY_KEY, &self.messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BackendStats, IndexOutcome, APOLOGY};
    use crate::model::BookRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeBackend {
        reply: ConverseReply,
        history_lens: Mutex<Vec<usize>>,
    }

    impl FakeBackend {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: ConverseReply {
                    text: text.to_string(),
                    confidence: 0.9,
                },
                history_lens: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: ConverseReply::apology(),
                history_lens: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecommendBackend for FakeBackend {
        async fn converse(&self, _message: String, history: Vec<HistoryEntry>) -> ConverseReply {
            self.history_lens.lock().unwrap().push(history.len());
            self.reply.clone()
        }

        async fn index_book(&self, _book: BookRecord) -> IndexOutcome {
            IndexOutcome::default()
        }

        async fn check_health(&self) -> bool {
            true
        }

        async fn fetch_stats(&self) -> Option<BackendStats> {
            None
        }
    }

    fn controller(backend: Arc<FakeBackend>) -> (ConversationController, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::new(dir.path().to_path_buf());
        (ConversationController::new(backend, store), dir)
    }

    #[tokio::test]
    async fn starts_with_the_welcome_message() {
        let (conversation, _dir) = controller(FakeBackend::replying("hi"));
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].text, WELCOME);
        assert!(!conversation.messages()[0].is_user);
    }

    #[tokio::test]
    async fn submit_appends_user_then_assistant_message() {
        let backend = FakeBackend::replying("Try 'Gone Girl'.");
        let (mut conversation, _dir) = controller(Arc::clone(&backend));

        conversation.submit("recommend a mystery novel");
        assert_eq!(conversation.messages().len(), 2);
        assert!(conversation.messages()[1].is_user);
        assert!(conversation.is_waiting());

        conversation.finish_pending().await;
        assert_eq!(conversation.messages().len(), 3);
        assert_eq!(conversation.messages()[2].text, "Try 'Gone Girl'.");
        assert!(!conversation.messages()[2].is_user);
        assert!(!conversation.is_waiting());
    }

    #[tokio::test]
    async fn blank_submissions_change_nothing() {
        let (mut conversation, _dir) = controller(FakeBackend::replying("hi"));
        conversation.submit("");
        conversation.submit("   ");
        assert_eq!(conversation.messages().len(), 1);
        assert!(!conversation.is_waiting());
    }

    #[tokio::test]
    async fn history_snapshot_excludes_the_new_message() {
        let backend = FakeBackend::replying("ok");
        let (mut conversation, _dir) = controller(Arc::clone(&backend));

        // Transcript holds only the welcome message when this is dispatched.
        conversation.submit("first");
        conversation.finish_pending().await;

        let lens = backend.history_lens.lock().unwrap();
        assert_eq!(*lens, vec![1]);
    }

    #[tokio::test]
    async fn submissions_while_waiting_are_queued_in_order() {
        let backend = FakeBackend::replying("ok");
        let (mut conversation, _dir) = controller(Arc::clone(&backend));

        conversation.submit("first");
        conversation.submit("second");
        assert_eq!(conversation.queued_len(), 1);
        // Still exactly one user message until the first reply settles.
        assert_eq!(conversation.messages().len(), 2);

        conversation.finish_pending().await;
        // First reply landed and "second" was dispatched.
        assert_eq!(conversation.messages().len(), 4);
        assert!(conversation.is_waiting());

        conversation.finish_pending().await;
        assert_eq!(conversation.messages().len(), 5);
        let texts: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec![WELCOME, "first", "ok", "second", "ok"]);
    }

    #[tokio::test]
    async fn failed_replies_land_as_apology_messages() {
        let (mut conversation, _dir) = controller(FakeBackend::failing());
        conversation.submit("anything there?");
        conversation.finish_pending().await;

        let last = conversation.messages().last().unwrap();
        assert_eq!(last.text, APOLOGY);
        assert!(!last.is_user);
        assert!(!conversation.is_waiting());
    }

    #[tokio::test]
    async fn transcript_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::new(dir.path().to_path_buf());

        let mut conversation =
            ConversationController::new(FakeBackend::replying("noted"), store.clone());
        conversation.submit("remember this");
        conversation.finish_pending().await;
        let saved = conversation.messages().to_vec();
        drop(conversation);

        let reopened = ConversationController::new(FakeBackend::replying("x"), store);
        assert_eq!(reopened.messages(), saved.as_slice());
    }
}
