use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};

use crate::app::{App, BackendStatus, FormField, InputMode, Screen};
use crate::config::CritiqueMode;
use crate::model::{Critique, IndexStatus};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::AddBook => render_add_book_screen(app, frame, body_area),
        Screen::Library => render_library_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" LIA: Intelligent Library Assistant ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let status = backend_status_line(app);
    let status_width = status.width() as u16;
    let [tabs_area, status_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(status_width + 1)])
            .areas(inner);

    let titles: Vec<Line> = Screen::all()
        .iter()
        .enumerate()
        .map(|(i, screen)| Line::from(format!(" {} {} ", i + 1, screen.title())))
        .collect();
    let selected = Screen::all()
        .iter()
        .position(|screen| *screen == app.screen)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("|");
    frame.render_widget(tabs, tabs_area);

    frame.render_widget(
        Paragraph::new(status).alignment(Alignment::Right),
        status_area,
    );
}

fn backend_status_line(app: &App) -> Line<'static> {
    let mut spans = vec![match app.backend_status {
        BackendStatus::Unknown => {
            Span::styled("* checking", Style::default().fg(Color::DarkGray))
        }
        BackendStatus::Online => Span::styled("* online", Style::default().fg(Color::Green)),
        BackendStatus::Offline => Span::styled("* offline", Style::default().fg(Color::Red)),
    }];
    if let Some(stats) = &app.backend_stats {
        spans.push(Span::styled(
            format!(
                "  {} books, {} queries",
                stats.total_books, stats.total_queries
            ),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(
            " Recommendations ({} messages) ",
            app.conversation.messages().len()
        ));

    let chat_text = if app.conversation.messages().is_empty() && !app.conversation.is_waiting() {
        Text::from(Span::styled(
            "Ask about books, genres, or the kind of story you want to read...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.conversation.messages() {
            if msg.is_user {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            } else {
                lines.push(Line::from(Span::styled(
                    "LIA:",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )));
            }
            for line in msg.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }

        if app.conversation.is_waiting() {
            lines.push(Line::from(Span::styled(
                "LIA:",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    // Input line - greyed out while a reply is pending
    let waiting = app.conversation.is_waiting();
    let input_border_color = if app.input_mode == InputMode::Editing && !waiting {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let input_title = if waiting {
        if app.conversation.queued_len() > 0 {
            format!(
                " LIA is thinking ({} queued) ",
                app.conversation.queued_len()
            )
        } else {
            " LIA is thinking... ".to_string()
        }
    } else {
        " Message (i to type, Enter to send) ".to_string()
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(input_title);

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let visible_text = visible_slice(&app.conversation.draft, app.conversation.cursor, inner_width);
    let input_style = if waiting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let input = Paragraph::new(visible_text)
        .style(input_style)
        .block(input_block);
    frame.render_widget(input, input_area);
}

/// Visible portion of a single-line input, scrolled horizontally so the
/// cursor stays inside the box.
fn visible_slice(value: &str, cursor: usize, inner_width: usize) -> String {
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor >= inner_width {
        cursor - inner_width + 1
    } else {
        0
    };
    value.chars().skip(scroll_offset).take(inner_width).collect()
}

fn render_add_book_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let show_banner = app.success_ticks > 0;
    let mut constraints: Vec<Constraint> = Vec::new();
    if show_banner {
        constraints.push(Constraint::Length(3));
    }
    // One bordered input plus an error line per field
    for _ in FormField::all() {
        constraints.push(Constraint::Length(4));
    }
    constraints.push(Constraint::Min(0));
    let rows = Layout::vertical(constraints).split(area);

    let mut row = 0;
    if show_banner {
        let banner = Paragraph::new(Span::styled(
            "Book added to the library!",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        );
        frame.render_widget(banner, rows[row]);
        row += 1;
    }

    for field in FormField::all() {
        render_form_field(app, frame, rows[row], field);
        row += 1;
    }

    let info = Paragraph::new(Line::from(Span::styled(
        "All fields are required. The description and critique help the backend index your library for better recommendations.",
        Style::default().fg(Color::DarkGray),
    )))
    .wrap(Wrap { trim: true });
    frame.render_widget(info, rows[row]);
}

fn form_field_title(app: &App, field: FormField) -> String {
    match field {
        FormField::Title => " Title * ".to_string(),
        FormField::Author => " Author * ".to_string(),
        FormField::Description => format!(
            " Description * ({} chars, min 20) ",
            app.form.description.trim().chars().count()
        ),
        FormField::Critique => {
            let mode = app.library.mode();
            match mode {
                CritiqueMode::Review => format!(
                    " {} * ({} chars, min 10) ",
                    mode.field_label(),
                    app.form.critique.trim().chars().count()
                ),
                CritiqueMode::Rating => format!(" {} * ", mode.field_label()),
            }
        }
    }
}

fn render_form_field(app: &App, frame: &mut Frame, area: Rect, field: FormField) {
    let [input_area, error_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Length(1)]).areas(area);

    let focused = app.form_focus == field;
    let editing = focused && app.input_mode == InputMode::Editing;
    let error = app.error_for(app.validation_field(field));

    let border_color = if editing {
        Color::Yellow
    } else if error.is_some() {
        Color::Red
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(form_field_title(app, field));

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let value = app.form_value(field);
    let visible_text = if focused {
        visible_slice(value, app.form_cursor, inner_width)
    } else {
        value.chars().take(inner_width).collect()
    };

    let input = Paragraph::new(visible_text).block(block);
    frame.render_widget(input, input_area);

    if let Some(message) = error {
        let error_line = Paragraph::new(Span::styled(
            format!("! {}", message),
            Style::default().fg(Color::Red),
        ));
        frame.render_widget(error_line, error_area);
    }
}

fn render_library_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    if app.library.books().is_empty() {
        let empty = Paragraph::new(Span::styled(
            "The library is empty. Press 2 to add your first book.",
            Style::default().fg(Color::DarkGray),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Library "));
        frame.render_widget(empty, area);
        return;
    }

    if app.library_state.selected().is_none() {
        app.library_state.select(Some(0));
    }

    let books = app.library.books();

    let [list_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let items: Vec<ListItem> = books
        .iter()
        .map(|book| ListItem::new(format!(" {} - {} ", book.title, book.author)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Library ({} books) ", books.len())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.library_state);

    let selected = app
        .library_state
        .selected()
        .and_then(|i| app.library.books().get(i));
    let detail_text = match selected {
        Some(book) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    book.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("by {}", book.author),
                    Style::default().fg(Color::DarkGray),
                )),
                Line::default(),
                Line::from(vec![
                    Span::styled("Added: ", Style::default().fg(Color::DarkGray)),
                    Span::raw(book.date_added.format("%Y-%m-%d %H:%M").to_string()),
                    Span::raw("   "),
                    index_status_span(book.index_status),
                ]),
                Line::default(),
            ];
            for line in book.description.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
            match &book.critique {
                Critique::Review(review) => {
                    lines.push(Line::from(Span::styled(
                        "Review:",
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )));
                    for line in review.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Critique::Rating(rating) => {
                    lines.push(Line::from(vec![
                        Span::styled(
                            "Rating: ",
                            Style::default()
                                .fg(Color::Yellow)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(format!("{rating} / 5")),
                    ]));
                }
            }
            Text::from(lines)
        }
        None => Text::from(""),
    };

    let detail = Paragraph::new(detail_text)
        .block(Block::default().borders(Borders::ALL).title(" Details "))
        .wrap(Wrap { trim: true });
    frame.render_widget(detail, detail_area);
}

fn index_status_span(status: IndexStatus) -> Span<'static> {
    match status {
        IndexStatus::Pending => {
            Span::styled("index: pending", Style::default().fg(Color::Yellow))
        }
        IndexStatus::Indexed => Span::styled("index: done", Style::default().fg(Color::Green)),
        IndexStatus::Failed => Span::styled("index: failed", Style::default().fg(Color::Red)),
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Normal) => {
            " q quit | Tab/1-3 switch | i type | j/k scroll | G bottom "
        }
        (Screen::Chat, InputMode::Editing) => " Enter send | Esc done ",
        (Screen::AddBook, InputMode::Normal) => {
            " q quit | j/k field | i edit | s save book | Tab switch "
        }
        (Screen::AddBook, InputMode::Editing) => {
            " Enter next field (last field saves) | Tab/Shift-Tab move | Esc done "
        }
        (Screen::Library, _) => " q quit | j/k select | Tab switch ",
    };
    let footer = Paragraph::new(Span::styled(
        hints,
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(footer, area);
}
