use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::pipeline::{QueryOutcome, Step, EXAMPLE_QUESTIONS};
use crate::ui::{
    classify, App, Focus, SidebarTab, StatusType, Theme, WordClass, SPINNER_FRAMES,
};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(app.sidebar_width), Constraint::Min(0)])
        .split(chunks[1]);

    draw_sidebar(frame, app, main_chunks[0]);
    draw_main_panel(frame, app, main_chunks[1]);

    draw_status_bar(frame, app, chunks[2]);

    if !app.show_help {
        draw_toasts(frame, app);
    }

    if app.show_help {
        draw_help_overlay(frame, app);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let info = format!(
        " {} | {} | model: {} ",
        app.database_label,
        app.dialect(),
        app.model_name()
    );
    let header = Paragraph::new(format!(" pgask {}", info)).style(theme.header());
    frame.render_widget(header, area);
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Sidebar;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Tabs
            Constraint::Min(0),    // Content
        ])
        .split(area);

    let selected_tab = match app.sidebar_tab {
        SidebarTab::Tables => 0,
        SidebarTab::Examples => 1,
        SidebarTab::History => 2,
    };

    let tabs = Tabs::new(vec!["Tables", "Examples", "History"])
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(theme.border_style(focused)),
        )
        .select(selected_tab)
        .style(Style::default().fg(theme.text_secondary))
        .highlight_style(
            Style::default()
                .fg(theme.text_accent)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, chunks[0]);

    let (title, items) = match app.sidebar_tab {
        SidebarTab::Tables => (" Tables ", table_items(app)),
        SidebarTab::Examples => (" Examples ", example_items(app, chunks[1].width)),
        SidebarTab::History => (" History ", history_items(app, chunks[1].width)),
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style(focused))
            .title(title)
            .title_style(if focused {
                Style::default().fg(theme.text_accent)
            } else {
                Style::default().fg(theme.text_secondary)
            }),
    );
    frame.render_widget(list, chunks[1]);
}

fn item_style(app: &App, index: usize) -> Style {
    if index == app.sidebar_selected && app.focus == Focus::Sidebar {
        app.theme.selected()
    } else {
        Style::default().fg(app.theme.text_primary)
    }
}

fn table_items(app: &App) -> Vec<ListItem<'static>> {
    let referenced: &[String] = app
        .last_run
        .as_ref()
        .map(|run| run.referenced_tables.as_slice())
        .unwrap_or(&[]);

    if app.tables.is_empty() {
        return vec![ListItem::new(" (no tables)").style(app.theme.muted())];
    }

    app.tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let used = referenced.iter().any(|r| r.eq_ignore_ascii_case(table));
            let marker = if used { "●" } else { " " };
            let style = if used && i != app.sidebar_selected {
                Style::default().fg(app.theme.success)
            } else {
                item_style(app, i)
            };
            ListItem::new(format!(" {} {}", marker, table)).style(style)
        })
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn example_items(app: &App, width: u16) -> Vec<ListItem<'static>> {
    let width = (width as usize).saturating_sub(5);
    EXAMPLE_QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, q)| ListItem::new(format!(" {}", truncate(q, width))).style(item_style(app, i)))
        .collect()
}

fn history_items(app: &App, width: u16) -> Vec<ListItem<'static>> {
    let width = (width as usize).saturating_sub(7);
    app.history
        .entries()
        .iter()
        .rev()
        .enumerate()
        .map(|(i, entry)| {
            let status_icon = if entry.success { "✓" } else { "✗" };
            ListItem::new(format!(" {} {}", status_icon, truncate(&entry.question, width)))
                .style(item_style(app, i))
        })
        .collect()
}

fn draw_main_panel(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Question
            Constraint::Length(1),      // Progress
            Constraint::Percentage(35), // SQL
            Constraint::Percentage(25), // Query result
            Constraint::Min(3),         // Answer
        ])
        .split(area);

    draw_input(frame, app, chunks[0]);
    draw_progress(frame, app, chunks[1]);
    draw_sql_panel(frame, app, chunks[2]);
    draw_output_panel(frame, app, chunks[3]);
    draw_answer_panel(frame, app, chunks[4]);
}

fn panel<'a>(theme: &Theme, title: &'a str, focused: bool) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style(focused))
        .title(title)
        .title_style(if focused {
            Style::default().fg(theme.text_accent)
        } else {
            Style::default().fg(theme.text_secondary)
        })
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Input;

    let text = if app.input.text().is_empty() && !focused {
        Line::from(Span::styled("Ask a question about your data...", theme.muted()))
    } else {
        Line::from(Span::styled(
            app.input.text().to_string(),
            Style::default().fg(theme.text_primary),
        ))
    };

    let block = panel(theme, " Question ", focused);
    let inner = block.inner(area);

    // Keep the cursor visible on long questions
    let column = app.input.cursor_column() as u16;
    let scroll = column.saturating_sub(inner.width.saturating_sub(1));
    let input = Paragraph::new(text)
        .block(block)
        .scroll((0, scroll))
        .style(theme.normal());
    frame.render_widget(input, area);

    if focused && !app.show_help {
        frame.set_cursor_position((inner.x + column - scroll, inner.y));
    }
}

fn draw_progress(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    if !app.is_running() {
        let hint = match &app.last_run {
            Some(run) => format!(
                " {} tables described, answered in {} ms",
                run.schema_tables.len(),
                run.elapsed.as_millis()
            ),
            None => " Enter to ask, Tab to switch panes, F1 for help".to_string(),
        };
        frame.render_widget(Paragraph::new(Span::styled(hint, theme.muted())), area);
        return;
    }

    let current = app.current_step.map(|s| s.index());
    let mut spans = vec![Span::raw(" ")];
    for step in Step::ALL {
        let (icon, style) = match current {
            Some(c) if step.index() < c => ("✓".to_string(), theme.status_success()),
            Some(c) if step.index() == c => (
                SPINNER_FRAMES[app.spinner_frame].to_string(),
                Style::default().fg(theme.info).add_modifier(Modifier::BOLD),
            ),
            _ => ("·".to_string(), theme.muted()),
        };
        spans.push(Span::styled(format!("{} {}", icon, step.progress()), style));
        spans.push(Span::raw("  "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_sql_panel(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let lines: Vec<Line> = match &app.last_run {
        Some(run) if !run.sql.is_empty() => run
            .sql
            .lines()
            .map(|line| highlight_sql_line(line, theme))
            .collect(),
        _ => vec![Line::from(Span::styled("No SQL yet", theme.muted()))],
    };

    let sql = Paragraph::new(lines)
        .block(panel(theme, " Generated SQL (Ctrl+Y copy) ", false))
        .wrap(Wrap { trim: false })
        .style(theme.normal());
    frame.render_widget(sql, area);
}

fn draw_output_panel(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let (text, style, title) = match app.last_run.as_ref().and_then(|r| r.outcome.as_ref()) {
        Some(QueryOutcome::Success { rendered, row_count }) => {
            let text = if rendered.is_empty() {
                "(no rows)".to_string()
            } else {
                rendered.clone()
            };
            let title = format!(
                " Query Result ({} row{}) ",
                row_count,
                if *row_count == 1 { "" } else { "s" }
            );
            (text, Style::default().fg(theme.text_primary), title)
        }
        Some(failure @ QueryOutcome::Failure { .. }) => {
            (failure.text(), theme.status_error(), " Query Result ".to_string())
        }
        None => (String::new(), theme.muted(), " Query Result ".to_string()),
    };

    let output = Paragraph::new(Span::styled(text, style))
        .block(panel(theme, &title, false))
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.bg_primary));
    frame.render_widget(output, area);
}

fn draw_answer_panel(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Answer;

    let (text, style) = if let Some(error) = &app.last_error {
        (error.clone(), theme.status_error())
    } else if let Some(run) = &app.last_run {
        (run.narrative.clone(), Style::default().fg(theme.text_primary))
    } else {
        (String::new(), theme.muted())
    };

    let answer = Paragraph::new(Span::styled(text, style))
        .block(panel(theme, " Answer ", focused))
        .wrap(Wrap { trim: true })
        .scroll((app.answer_scroll, 0))
        .style(Style::default().bg(theme.bg_tertiary));
    frame.render_widget(answer, area);
}

/// Colour one line of SQL. Multi-line comments and strings are not
/// tracked across lines.
pub fn highlight_sql_line<'a>(line: &str, theme: &Theme) -> Line<'a> {
    let mut spans: Vec<Span> = Vec::new();
    let mut current_word = String::new();
    let mut in_string = false;
    let mut string_char = '\'';

    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        // Line comment
        if !in_string && i + 1 < len && c == '-' && chars[i + 1] == '-' {
            if !current_word.is_empty() {
                spans.push(create_word_span(&current_word, theme));
                current_word.clear();
            }
            let rest: String = chars[i..].iter().collect();
            spans.push(Span::styled(rest, Style::default().fg(theme.syntax_comment)));
            current_word.clear();
            i = len;
            continue;
        }

        if c == '\'' || c == '"' {
            if in_string && c == string_char {
                // Escaped quote ('')
                if i + 1 < len && chars[i + 1] == c {
                    current_word.push(c);
                    current_word.push(c);
                    i += 2;
                    continue;
                }
                current_word.push(c);
                spans.push(Span::styled(
                    current_word.clone(),
                    Style::default().fg(if c == '\'' {
                        theme.syntax_string
                    } else {
                        theme.text_primary
                    }),
                ));
                current_word.clear();
                in_string = false;
            } else if !in_string {
                if !current_word.is_empty() {
                    spans.push(create_word_span(&current_word, theme));
                    current_word.clear();
                }
                in_string = true;
                string_char = c;
                current_word.push(c);
            } else {
                current_word.push(c);
            }
            i += 1;
            continue;
        }

        if in_string {
            current_word.push(c);
            i += 1;
            continue;
        }

        if c.is_alphanumeric() || c == '_' || (c == '.' && is_number(&current_word)) {
            current_word.push(c);
        } else {
            if !current_word.is_empty() {
                spans.push(create_word_span(&current_word, theme));
                current_word.clear();
            }
            let style = match c {
                ',' | ';' => Style::default().fg(theme.text_secondary),
                '=' | '>' | '<' | '!' | '+' | '-' | '*' | '/' | '%' | ':' | '|' => {
                    Style::default().fg(theme.syntax_operator)
                }
                '.' => Style::default().fg(theme.text_muted),
                _ => Style::default().fg(theme.text_primary),
            };
            spans.push(Span::styled(c.to_string(), style));
        }

        i += 1;
    }

    if !current_word.is_empty() {
        if in_string {
            spans.push(Span::styled(
                current_word,
                Style::default().fg(theme.syntax_string),
            ));
        } else {
            spans.push(create_word_span(&current_word, theme));
        }
    }

    Line::from(spans)
}

fn is_number(word: &str) -> bool {
    classify(word) == WordClass::Number
}

fn create_word_span<'a>(word: &str, theme: &Theme) -> Span<'a> {
    let style = match classify(word) {
        WordClass::Keyword => Style::default()
            .fg(theme.syntax_keyword)
            .add_modifier(Modifier::BOLD),
        WordClass::Function => Style::default().fg(theme.syntax_function),
        WordClass::Type => Style::default().fg(theme.syntax_type),
        WordClass::Number => Style::default().fg(theme.syntax_number),
        WordClass::Plain => Style::default().fg(theme.text_primary),
    };
    Span::styled(word.to_string(), style)
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let left_text = if app.is_loading {
        let spinner = SPINNER_FRAMES[app.spinner_frame];
        format!(" {} {}", spinner, app.loading_message)
    } else {
        format!(" {} tables | {} questions asked", app.tables.len(), app.history.len())
    };

    let left_style = if app.is_loading {
        Style::default().fg(theme.info).bg(theme.bg_secondary)
    } else {
        Style::default().fg(theme.text_muted).bg(theme.bg_secondary)
    };

    let right_text = "F1 Help | Ctrl+Q Quit ";

    let left_len = left_text.chars().count() as u16;
    let right_len = right_text.len() as u16;
    let padding = area.width.saturating_sub(left_len + right_len);

    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::styled(
            " ".repeat(padding as usize),
            Style::default().bg(theme.bg_secondary),
        ),
        Span::styled(
            right_text.to_string(),
            Style::default().fg(theme.text_muted).bg(theme.bg_secondary),
        ),
    ]);

    frame.render_widget(Paragraph::new(status_line), area);
}

fn draw_toasts(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    if app.toasts.is_empty() {
        return;
    }

    let area = frame.area();
    let toast_width = 50.min(area.width.saturating_sub(4));

    // Stack toasts upward from the bottom-right, above the status bar (1 line)
    for (i, toast) in app.toasts.iter().rev().enumerate() {
        let toast_y = area.height.saturating_sub(2 + i as u16);
        if toast_y < 1 {
            break;
        }

        let toast_x = area.width.saturating_sub(toast_width + 1);
        let toast_area = Rect::new(toast_x, toast_y, toast_width, 1);

        let icon = match toast.status_type {
            StatusType::Success => "✓",
            StatusType::Error => "✗",
            StatusType::Warning => "!",
            StatusType::Info => "ℹ",
        };

        let bg = match toast.status_type {
            StatusType::Success => theme.success,
            StatusType::Error => theme.error,
            StatusType::Warning => theme.warning,
            StatusType::Info => theme.info,
        };

        // Dim when about to expire
        let style = if toast.progress() > 0.8 {
            Style::default()
                .fg(theme.bg_primary)
                .bg(bg)
                .add_modifier(Modifier::DIM)
        } else {
            Style::default().fg(theme.bg_primary).bg(bg)
        };

        let max_msg_len = (toast_width as usize).saturating_sub(4);
        let msg: String = toast.message.chars().take(max_msg_len).collect();
        let text = format!(" {} {} ", icon, msg);

        frame.render_widget(Clear, toast_area);
        frame.render_widget(Paragraph::new(text).style(style), toast_area);
    }
}

fn draw_help_overlay(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = frame.area();

    let help_width = 52.min(area.width.saturating_sub(4));
    let help_height = 27.min(area.height.saturating_sub(4));

    let help_x = (area.width - help_width) / 2;
    let help_y = (area.height - help_height) / 2;

    let help_area = Rect::new(help_x, help_y, help_width, help_height);

    frame.render_widget(Clear, help_area);

    let help_text = [
        "",
        " KEYBOARD SHORTCUTS",
        " ══════════════════════════════════════",
        "",
        " GLOBAL",
        "   Ctrl+Q/D       Quit",
        "   F1 / ?         Toggle help",
        "   Tab            Next pane",
        "   Shift+Tab      Previous pane",
        "",
        " QUESTION",
        "   Enter          Ask",
        "   ↑/↓            Previous questions",
        "   Ctrl+L / Esc   Clear",
        "   Ctrl+W         Delete word",
        "   Ctrl+Y         Copy generated SQL",
        "   Ctrl+R         Reload tables",
        "",
        " SIDEBAR",
        "   1/2/3          Tables / Examples / History",
        "   Enter          Use selected item",
        "   r              Reload tables",
        "   q              Quit",
        "",
        " ANSWER",
        "   ↑/↓ PgUp/PgDn  Scroll",
        "   y              Copy generated SQL",
        "",
    ];

    let text: Vec<Line> = help_text
        .iter()
        .map(|s| Line::from(Span::styled(*s, Style::default().fg(theme.text_primary))))
        .collect();

    let help = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_focused))
                .title(" Help ")
                .title_style(
                    Style::default()
                        .fg(theme.text_accent)
                        .add_modifier(Modifier::BOLD),
                ),
        )
        .style(Style::default().bg(theme.bg_primary));

    frame.render_widget(help, help_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_highlight_splits_words_and_strings() {
        let theme = Theme::dark();
        let sql = "SELECT COUNT(*) FROM \"Customer\" WHERE x = 'it''s'";
        let line = highlight_sql_line(sql, &theme);
        let parts = texts(&line);
        assert!(parts.contains(&"SELECT".to_string()));
        assert!(parts.contains(&"\"Customer\"".to_string()));
        assert!(parts.contains(&"'it''s'".to_string()));
        assert_eq!(parts.concat(), sql);

        let select = &line.spans[0];
        assert_eq!(select.style.fg, Some(theme.syntax_keyword));
    }

    #[test]
    fn test_highlight_comment_and_numbers() {
        let theme = Theme::dark();
        let line = highlight_sql_line("LIMIT 2.5 -- top", &theme);
        let parts = texts(&line);
        assert_eq!(parts.concat(), "LIMIT 2.5 -- top");
        let number = line.spans.iter().find(|s| s.content == "2.5").unwrap();
        assert_eq!(number.style.fg, Some(theme.syntax_number));
        assert_eq!(line.spans.last().unwrap().content, "-- top");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer question", 8), "a longe…");
    }
}
