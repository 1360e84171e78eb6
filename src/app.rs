use std::sync::Arc;

use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::config::{Config, CritiqueMode};
use crate::conversation::ConversationController;
use crate::gateway::{BackendStats, RecommendBackend};
use crate::library::{BookDraft, Field, FieldError, LibraryController};
use crate::store::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    AddBook,
    Library,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Chat => "Chat",
            Screen::AddBook => "Add Book",
            Screen::Library => "Library",
        }
    }

    pub fn all() -> [Screen; 3] {
        [Screen::Chat, Screen::AddBook, Screen::Library]
    }

    pub fn next(&self) -> Screen {
        match self {
            Screen::Chat => Screen::AddBook,
            Screen::AddBook => Screen::Library,
            Screen::Library => Screen::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Form focus on the Add Book screen. `Critique` is the review or rating
/// field depending on the deployment's critique mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Author,
    Description,
    Critique,
}

impl FormField {
    pub fn all() -> [FormField; 4] {
        [
            FormField::Title,
            FormField::Author,
            FormField::Description,
            FormField::Critique,
        ]
    }

    pub fn next(&self) -> FormField {
        match self {
            FormField::Title => FormField::Author,
            FormField::Author => FormField::Description,
            FormField::Description => FormField::Critique,
            FormField::Critique => FormField::Title,
        }
    }

    pub fn prev(&self) -> FormField {
        match self {
            FormField::Title => FormField::Critique,
            FormField::Author => FormField::Title,
            FormField::Description => FormField::Author,
            FormField::Critique => FormField::Description,
        }
    }
}

/// Backend reachability as shown in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Unknown,
    Online,
    Offline,
}

// Success banner lifetime: 10 ticks at 300ms ≈ 3 seconds.
const SUCCESS_BANNER_TICKS: u8 = 10;

/// Rows one transcript line occupies at the given wrap width. Counts
/// characters, not bytes; an empty line still takes one row.
fn wrapped_rows(line: &str, wrap_width: usize) -> u16 {
    let char_count = line.chars().count();
    if char_count == 0 {
        1
    } else {
        char_count.div_ceil(wrap_width) as u16
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Chat state
    pub conversation: ConversationController,
    pub chat_scroll: u16,
    pub chat_height: u16, // Inner chat area size, updated during render
    pub chat_width: u16,

    // Add Book form state
    pub library: LibraryController,
    pub form: BookDraft,
    pub form_focus: FormField,
    pub form_cursor: usize, // cursor position (chars) in the focused field
    pub form_errors: Vec<FieldError>,
    pub success_ticks: u8,

    // Library list state
    pub library_state: ListState,

    // Backend status probe, resolved once at startup
    pub backend_status: BackendStatus,
    pub backend_stats: Option<BackendStats>,
    status_task: Option<JoinHandle<(bool, Option<BackendStats>)>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config, store: PersistentStore, gateway: Arc<dyn RecommendBackend>) -> Self {
        let conversation = ConversationController::new(Arc::clone(&gateway), store.clone());
        let library = LibraryController::new(Arc::clone(&gateway), store, config.critique_mode());

        let status_task = {
            let gateway = Arc::clone(&gateway);
            Some(tokio::spawn(async move {
                (gateway.check_health().await, gateway.fetch_stats().await)
            }))
        };

        let mut library_state = ListState::default();
        if !library.books().is_empty() {
            library_state.select(Some(0));
        }

        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,

            conversation,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            library,
            form: BookDraft::default(),
            form_focus: FormField::Title,
            form_cursor: 0,
            form_errors: Vec::new(),
            success_ticks: 0,

            library_state,

            backend_status: BackendStatus::Unknown,
            backend_stats: None,
            status_task,

            animation_frame: 0,
        }
    }

    /// One 300ms tick: advance animations, expire the success banner, and
    /// fold settled background tasks into state.
    pub async fn on_tick(&mut self) {
        if self.conversation.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.success_ticks = self.success_ticks.saturating_sub(1);

        if self.conversation.poll_reply().await {
            self.scroll_chat_to_bottom();
        }
        self.library.poll_index().await;
        self.poll_status().await;
    }

    async fn poll_status(&mut self) {
        if !self.status_task.as_ref().is_some_and(|task| task.is_finished()) {
            return;
        }
        let Some(task) = self.status_task.take() else {
            return;
        };
        if let Ok((healthy, stats)) = task.await {
            self.backend_status = if healthy {
                BackendStatus::Online
            } else {
                BackendStatus::Offline
            };
            self.backend_stats = stats;
        }
    }

    pub fn chat_nav_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn chat_nav_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll the transcript so the newest message (or the thinking
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversation.messages() {
            total_lines += 1; // Role line ("You:" or "LIA:")
            for line in msg.text.lines() {
                total_lines += wrapped_rows(line, wrap_width);
            }
            total_lines += 1; // Blank line after message
        }
        if self.conversation.is_waiting() {
            total_lines += 2; // "LIA:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    // Add Book form helpers

    pub fn form_value(&self, field: FormField) -> &str {
        match field {
            FormField::Title => &self.form.title,
            FormField::Author => &self.form.author,
            FormField::Description => &self.form.description,
            FormField::Critique => &self.form.critique,
        }
    }

    pub fn form_value_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Title => &mut self.form.title,
            FormField::Author => &mut self.form.author,
            FormField::Description => &mut self.form.description,
            FormField::Critique => &mut self.form.critique,
        }
    }

    /// The validation field a form slot reports errors under.
    pub fn validation_field(&self, field: FormField) -> Field {
        match field {
            FormField::Title => Field::Title,
            FormField::Author => Field::Author,
            FormField::Description => Field::Description,
            FormField::Critique => match self.library.mode() {
                CritiqueMode::Review => Field::Review,
                CritiqueMode::Rating => Field::Rating,
            },
        }
    }

    pub fn error_for(&self, field: Field) -> Option<&str> {
        self.form_errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Editing a field dismisses its inline error, matching form behavior
    /// where the message clears as soon as the user starts fixing it.
    pub fn clear_focused_error(&mut self) {
        let field = self.validation_field(self.form_focus);
        self.form_errors.retain(|e| e.field != field);
    }

    pub fn focus_form_field(&mut self, field: FormField) {
        self.form_focus = field;
        self.form_cursor = self.form_value(field).chars().count();
    }

    pub fn submit_book(&mut self) {
        match self.library.add_book(&self.form) {
            Ok(record) => {
                tracing::debug!(book_id = %record.id, "form accepted");
                let select = self.library.books().len().saturating_sub(1);
                self.form = BookDraft::default();
                self.form_errors.clear();
                self.form_cursor = 0;
                self.form_focus = FormField::Title;
                self.success_ticks = SUCCESS_BANNER_TICKS;
                self.library_state.select(Some(select));
            }
            Err(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                tracing::debug!(?fields, "form rejected");
                self.form_errors = errors;
            }
        }
    }

    // Library list navigation

    pub fn library_nav_down(&mut self) {
        let len = self.library.books().len();
        if len > 0 {
            let i = self.library_state.selected().unwrap_or(0);
            self.library_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn library_nav_up(&mut self) {
        let i = self.library_state.selected().unwrap_or(0);
        self.library_state.select(Some(i.saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_rows_counts_exactly_full_lines_once() {
        assert_eq!(wrapped_rows(&"x".repeat(49), 50), 1);
        assert_eq!(wrapped_rows(&"x".repeat(50), 50), 1);
        assert_eq!(wrapped_rows(&"x".repeat(51), 50), 2);
        assert_eq!(wrapped_rows(&"x".repeat(100), 50), 2);
    }

    #[test]
    fn wrapped_rows_handles_short_and_empty_lines() {
        assert_eq!(wrapped_rows("", 50), 1);
        assert_eq!(wrapped_rows("hi", 50), 1);
    }
}
