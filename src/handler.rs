use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, FormField, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.on_tick().await,
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('1') => {
            app.screen = Screen::Chat;
            return;
        }
        KeyCode::Char('2') => {
            app.screen = Screen::AddBook;
            return;
        }
        KeyCode::Char('3') => {
            app.screen = Screen::Library;
            return;
        }
        KeyCode::Tab => {
            app.screen = app.screen.next();
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Chat => handle_chat_normal(app, key),
        Screen::AddBook => handle_form_normal(app, key),
        Screen::Library => handle_library_normal(app, key),
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Down | KeyCode::Char('j') => app.chat_nav_down(),
        KeyCode::Up | KeyCode::Char('k') => app.chat_nav_up(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),
        _ => {}
    }
}

fn handle_form_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            let next = app.form_focus.next();
            app.focus_form_field(next);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let prev = app.form_focus.prev();
            app.focus_form_field(prev);
        }
        KeyCode::Char('i') | KeyCode::Enter => {
            app.form_cursor = app.form_value(app.form_focus).chars().count();
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('s') => app.submit_book(),
        _ => {}
    }
}

fn handle_library_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.library_nav_down(),
        KeyCode::Up | KeyCode::Char('k') => app.library_nav_up(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.screen {
        Screen::Chat => handle_chat_editing(app, key),
        Screen::AddBook => handle_form_editing(app, key),
        Screen::Library => app.input_mode = InputMode::Normal,
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            let text = app.conversation.draft.clone();
            app.conversation.submit(&text);
            app.scroll_chat_to_bottom();
        }
        KeyCode::Backspace => {
            if app.conversation.cursor > 0 {
                app.conversation.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.conversation.draft, app.conversation.cursor);
                app.conversation.draft.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.conversation.draft.chars().count();
            if app.conversation.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.conversation.draft, app.conversation.cursor);
                app.conversation.draft.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.conversation.cursor = app.conversation.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.conversation.draft.chars().count();
            app.conversation.cursor = (app.conversation.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.conversation.cursor = 0;
        }
        KeyCode::End => {
            app.conversation.cursor = app.conversation.draft.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.conversation.draft, app.conversation.cursor);
            app.conversation.draft.insert(byte_pos, c);
            app.conversation.cursor += 1;
        }
        _ => {}
    }
}

fn handle_form_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Enter advances through the form; on the last field it submits.
        KeyCode::Enter => {
            if app.form_focus == FormField::Critique {
                app.submit_book();
                app.input_mode = InputMode::Normal;
            } else {
                let next = app.form_focus.next();
                app.focus_form_field(next);
            }
        }
        KeyCode::Tab => {
            let next = app.form_focus.next();
            app.focus_form_field(next);
        }
        KeyCode::BackTab => {
            let prev = app.form_focus.prev();
            app.focus_form_field(prev);
        }
        KeyCode::Backspace => {
            if app.form_cursor > 0 {
                app.form_cursor -= 1;
                let cursor = app.form_cursor;
                let value = app.form_value_mut(app.form_focus);
                let byte_pos = char_to_byte_index(value, cursor);
                value.remove(byte_pos);
                app.clear_focused_error();
            }
        }
        KeyCode::Delete => {
            let cursor = app.form_cursor;
            let value = app.form_value_mut(app.form_focus);
            if cursor < value.chars().count() {
                let byte_pos = char_to_byte_index(value, cursor);
                value.remove(byte_pos);
                app.clear_focused_error();
            }
        }
        KeyCode::Left => {
            app.form_cursor = app.form_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.form_value(app.form_focus).chars().count();
            app.form_cursor = (app.form_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.form_cursor = 0;
        }
        KeyCode::End => {
            app.form_cursor = app.form_value(app.form_focus).chars().count();
        }
        KeyCode::Char(c) => {
            let cursor = app.form_cursor;
            let value = app.form_value_mut(app.form_focus);
            let byte_pos = char_to_byte_index(value, cursor);
            value.insert(byte_pos, c);
            app.form_cursor += 1;
            app.clear_focused_error();
        }
        _ => {}
    }
}
