use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthStr;

use super::{App, Focus};

/// Single-line text field with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct QuestionInput {
    text: String,
    /// Cursor position in chars, 0..=len
    cursor: usize,
}

impl QuestionInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Display width of the text left of the cursor.
    pub fn cursor_column(&self) -> usize {
        self.text[..self.byte_index()].width()
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.replace('\n', " ");
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = self.byte_index();
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    pub fn insert_text(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\n') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index();
        self.text.remove(idx);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index();
            self.text.remove(idx);
        }
    }

    /// Delete back to the start of the previous word.
    pub fn delete_word(&mut self) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        let tail: String = chars[self.cursor..].iter().collect();
        self.text = chars[..start].iter().collect::<String>() + &tail;
        self.cursor = start;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }
}

impl App {
    pub(super) async fn handle_question_input(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Tab => self.focus = Focus::Answer,
            KeyCode::BackTab => self.focus = Focus::Sidebar,
            KeyCode::Char('l') if ctrl => self.input.clear(),
            KeyCode::Char('y') if ctrl => self.copy_sql(),
            KeyCode::Char('w') if ctrl => self.input.delete_word(),
            KeyCode::Char('a') if ctrl => self.input.move_home(),
            KeyCode::Char('e') if ctrl => self.input.move_end(),
            KeyCode::Char('r') if ctrl => self.refresh_tables().await,
            // History navigation: Up/Down
            KeyCode::Up => {
                if let Some(entry) = self.history.previous() {
                    let question = entry.question.clone();
                    self.input.set_text(&question);
                }
            }
            KeyCode::Down => {
                match self.history.next() {
                    Some(entry) => {
                        let question = entry.question.clone();
                        self.input.set_text(&question);
                    }
                    None => self.input.clear(),
                }
            }
            KeyCode::Char(c) if !ctrl => self.input.insert_char(c),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Esc => self.input.clear(),
            _ => {}
        }
        Ok(())
    }
}
