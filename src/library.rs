//! Owns the book library: validation, identity assignment, local-first
//! persistence, and best-effort backend indexing.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CritiqueMode;
use crate::gateway::{IndexOutcome, RecommendBackend};
use crate::model::{new_book_id, BookRecord, Critique, IndexStatus};
use crate::store::{PersistentStore, LIBRARY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Author,
    Description,
    Review,
    Rating,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Description => "description",
            Field::Review => "review",
            Field::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

/// The add-book form as typed. `critique` holds review text or the rating's
/// textual form, depending on the deployment's critique mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub description: String,
    pub critique: String,
}

/// Checks every rule and reports all violated fields at once, not just the
/// first.
pub fn validate(draft: &BookDraft, mode: CritiqueMode) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if draft.title.trim().is_empty() {
        errors.push(FieldError::new(Field::Title, "Title is required"));
    }
    if draft.author.trim().is_empty() {
        errors.push(FieldError::new(Field::Author, "Author is required"));
    }

    let description = draft.description.trim();
    if description.is_empty() {
        errors.push(FieldError::new(Field::Description, "Description is required"));
    } else if description.chars().count() < 20 {
        errors.push(FieldError::new(
            Field::Description,
            "Description must be at least 20 characters",
        ));
    }

    let critique = draft.critique.trim();
    match mode {
        CritiqueMode::Review => {
            if critique.is_empty() {
                errors.push(FieldError::new(Field::Review, "A review is required"));
            } else if critique.chars().count() < 10 {
                errors.push(FieldError::new(
                    Field::Review,
                    "The review must be at least 10 characters",
                ));
            }
        }
        CritiqueMode::Rating => {
            if critique.is_empty() {
                errors.push(FieldError::new(Field::Rating, "A rating is required"));
            } else {
                match critique.parse::<f64>() {
                    Ok(rating) if (0.0..=5.0).contains(&rating) => {}
                    Ok(_) => errors.push(FieldError::new(
                        Field::Rating,
                        "Rating must be between 0 and 5",
                    )),
                    Err(_) => {
                        errors.push(FieldError::new(Field::Rating, "Rating must be a number"))
                    }
                }
            }
        }
    }

    errors
}

pub struct LibraryController {
    gateway: Arc<dyn RecommendBackend>,
    store: PersistentStore,
    mode: CritiqueMode,
    books: Vec<BookRecord>,
    index_tasks: Vec<(String, JoinHandle<IndexOutcome>)>,
}

impl LibraryController {
    pub fn new(
        gateway: Arc<dyn RecommendBackend>,
        store: PersistentStore,
        mode: CritiqueMode,
    ) -> Self {
        let books = store.load(LIBRARY_KEY).unwrap_or_default();
        Self {
            gateway,
            store,
            mode,
            books,
            index_tasks: Vec::new(),
        }
    }

    pub fn books(&self) -> &[BookRecord] {
        &self.books
    }

    pub fn mode(&self) -> CritiqueMode {
        self.mode
    }

    /// Local-first: on success the record is appended and persisted before
    /// indexing is attempted, and an indexing failure never rolls it back.
    pub fn add_book(&mut self, draft: &BookDraft) -> Result<&BookRecord, Vec<FieldError>> {
        let errors = validate(draft, self.mode);
        if !errors.is_empty() {
            return Err(errors);
        }

        let critique = match self.mode {
            CritiqueMode::Review => Critique::Review(draft.critique.trim().to_string()),
            // validate() guarantees this parses and is in range
            CritiqueMode::Rating => Critique::Rating(draft.critique.trim().parse().unwrap_or(0.0)),
        };
        let record = BookRecord {
            id: new_book_id(),
            title: draft.title.trim().to_string(),
            author: draft.author.trim().to_string(),
            description: draft.description.trim().to_string(),
            critique,
            date_added: Utc::now(),
            index_status: IndexStatus::Pending,
        };
        info!(book_id = %record.id, title = %record.title, "book added to the library");

        self.books.push(record);
        self.persist();

        let idx = self.books.len() - 1;
        let book = self.books[idx].clone();
        let gateway = Arc::clone(&self.gateway);
        self.index_tasks.push((
            book.id.clone(),
            tokio::spawn(async move { gateway.index_book(book).await }),
        ));

        Ok(&self.books[idx])
    }

    /// Tick-driven, non-blocking: records settled indexing outcomes on
    /// their books.
    pub async fn poll_index(&mut self) {
        let mut settled = Vec::new();
        let mut in_flight = Vec::new();
        for (id, task) in self.index_tasks.drain(..) {
            if task.is_finished() {
                settled.push((id, task));
            } else {
                in_flight.push((id, task));
            }
        }
        self.index_tasks = in_flight;

        let mut changed = false;
        for (id, task) in settled {
            changed |= self.record_outcome(id, task).await;
        }
        if changed {
            self.persist();
        }
    }

    /// Awaits every in-flight indexing task; used by tests to settle the
    /// best-effort path deterministically.
    #[cfg(test)]
    pub async fn finish_indexing(&mut self) {
        let tasks: Vec<_> = self.index_tasks.drain(..).collect();
        let mut changed = false;
        for (id, task) in tasks {
            changed |= self.record_outcome(id, task).await;
        }
        if changed {
            self.persist();
        }
    }

    async fn record_outcome(&mut self, id: String, task: JoinHandle<IndexOutcome>) -> bool {
        let status = match task.await {
            Ok(outcome) if outcome.success => {
                debug!(book_id = %id, message = ?outcome.message, "book indexed by the backend");
                IndexStatus::Indexed
            }
            Ok(outcome) => {
                warn!(book_id = %id, error = ?outcome.error, "backend indexing failed, keeping local copy");
                IndexStatus::Failed
            }
            Err(err) => {
                warn!(book_id = %id, %err, "indexing task panicked or was cancelled");
                IndexStatus::Failed
            }
        };
        match self.books.iter_mut().find(|book| book.id == id) {
            Some(book) => {
                book.index_status = status;
                true
            }
            None => false,
        }
    }

    fn persist(&self) {
        self.store.save(LIBRARY_KEY, &self.books);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BackendStats, ConverseReply, HistoryEntry};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FakeIndexer {
        success: bool,
    }

    #[async_trait]
    impl RecommendBackend for FakeIndexer {
        async fn converse(&self, _message: String, _history: Vec<HistoryEntry>) -> ConverseReply {
            ConverseReply::apology()
        }

        async fn index_book(&self, _book: BookRecord) -> IndexOutcome {
            if self.success {
                IndexOutcome {
                    success: true,
                    message: Some("indexed".to_string()),
                    error: None,
                }
            } else {
                IndexOutcome {
                    success: false,
                    message: None,
                    error: Some("backend offline".to_string()),
                }
            }
        }

        async fn check_health(&self) -> bool {
            self.success
        }

        async fn fetch_stats(&self) -> Option<BackendStats> {
            None
        }
    }

    fn controller(mode: CritiqueMode, success: bool) -> (LibraryController, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::new(dir.path().to_path_buf());
        let gateway = Arc::new(FakeIndexer { success });
        (LibraryController::new(gateway, store, mode), dir)
    }

    fn valid_draft() -> BookDraft {
        BookDraft {
            title: "Gone Girl".to_string(),
            author: "Gillian Flynn".to_string(),
            description: "A thriller about a marriage gone very wrong.".to_string(),
            critique: "Twisty and sharp, kept me up all night.".to_string(),
        }
    }

    #[test]
    fn empty_draft_reports_every_field_at_once() {
        let errors = validate(&BookDraft::default(), CritiqueMode::Review);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "author", "description", "review"]);
    }

    #[test]
    fn description_boundary_is_twenty_trimmed_chars() {
        let mut draft = valid_draft();
        draft.description = format!("  {}  ", "x".repeat(19));
        let errors = validate(&draft, CritiqueMode::Review);
        assert!(errors.iter().any(|e| e.field == Field::Description));

        draft.description = format!("  {}  ", "x".repeat(20));
        let errors = validate(&draft, CritiqueMode::Review);
        assert!(errors.iter().all(|e| e.field != Field::Description));
    }

    #[test]
    fn review_boundary_is_ten_trimmed_chars() {
        let mut draft = valid_draft();
        draft.critique = "x".repeat(9);
        let errors = validate(&draft, CritiqueMode::Review);
        assert!(errors.iter().any(|e| e.field == Field::Review));

        draft.critique = "x".repeat(10);
        assert!(validate(&draft, CritiqueMode::Review).is_empty());
    }

    #[test]
    fn rating_must_be_numeric_and_within_range() {
        let mut draft = valid_draft();

        draft.critique = "5.1".to_string();
        let errors = validate(&draft, CritiqueMode::Rating);
        assert!(errors.iter().any(|e| e.field == Field::Rating));

        draft.critique = "five".to_string();
        let errors = validate(&draft, CritiqueMode::Rating);
        assert!(errors.iter().any(|e| e.field == Field::Rating));

        for ok in ["5", "0", "3.5"] {
            draft.critique = ok.to_string();
            assert!(validate(&draft, CritiqueMode::Rating).is_empty(), "{ok}");
        }
    }

    #[tokio::test]
    async fn add_book_assigns_identity_and_timestamp() {
        let (mut library, _dir) = controller(CritiqueMode::Review, true);
        let before = Utc::now();

        let first_id = library.add_book(&valid_draft()).unwrap().id.clone();
        let second = library.add_book(&valid_draft()).unwrap();

        assert!(!first_id.is_empty());
        assert_ne!(first_id, second.id);
        assert!(second.date_added >= before);
        assert_eq!(second.index_status, IndexStatus::Pending);
    }

    #[tokio::test]
    async fn invalid_draft_leaves_state_untouched() {
        let (mut library, _dir) = controller(CritiqueMode::Review, true);
        let errors = library.add_book(&BookDraft::default()).unwrap_err();
        assert!(!errors.is_empty());
        assert!(library.books().is_empty());
    }

    #[tokio::test]
    async fn indexing_outcome_is_recorded_on_the_book() {
        let (mut library, _dir) = controller(CritiqueMode::Review, true);
        library.add_book(&valid_draft()).unwrap();
        library.finish_indexing().await;
        assert_eq!(library.books()[0].index_status, IndexStatus::Indexed);
    }

    #[tokio::test]
    async fn indexing_failure_keeps_the_local_record() {
        let (mut library, _dir) = controller(CritiqueMode::Review, false);
        library.add_book(&valid_draft()).unwrap();
        library.finish_indexing().await;
        assert_eq!(library.books().len(), 1);
        assert_eq!(library.books()[0].index_status, IndexStatus::Failed);
    }

    #[tokio::test]
    async fn library_survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::new(dir.path().to_path_buf());

        let mut library = LibraryController::new(
            Arc::new(FakeIndexer { success: true }),
            store.clone(),
            CritiqueMode::Rating,
        );
        let mut draft = valid_draft();
        draft.critique = "4.5".to_string();
        library.add_book(&draft).unwrap();
        let saved = library.books().to_vec();
        drop(library);

        let reopened = LibraryController::new(
            Arc::new(FakeIndexer { success: true }),
            store,
            CritiqueMode::Rating,
        );
        assert_eq!(reopened.books(), saved.as_slice());
    }
}
