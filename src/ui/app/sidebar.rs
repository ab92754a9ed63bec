use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::pipeline::EXAMPLE_QUESTIONS;

use super::{App, Focus, SidebarTab, StatusType};

impl App {
    pub(super) async fn handle_sidebar_input(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Tab | KeyCode::Right | KeyCode::Esc => {
                self.focus = Focus::Input;
            }
            KeyCode::BackTab => {
                self.focus = Focus::Answer;
            }
            KeyCode::Up => {
                if self.sidebar_selected > 0 {
                    self.sidebar_selected -= 1;
                }
            }
            KeyCode::Down => {
                if self.sidebar_selected < self.sidebar_len().saturating_sub(1) {
                    self.sidebar_selected += 1;
                }
            }
            KeyCode::Enter => {
                self.handle_sidebar_select();
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.select_tab(SidebarTab::Tables),
            KeyCode::Char('2') => self.select_tab(SidebarTab::Examples),
            KeyCode::Char('3') => self.select_tab(SidebarTab::History),
            KeyCode::Char('r') => {
                self.refresh_tables().await;
                self.set_status(
                    format!("{} tables", self.tables.len()),
                    StatusType::Info,
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn select_tab(&mut self, tab: SidebarTab) {
        self.sidebar_tab = tab;
        self.sidebar_selected = 0;
    }

    pub(crate) fn sidebar_len(&self) -> usize {
        match self.sidebar_tab {
            SidebarTab::Tables => self.tables.len(),
            SidebarTab::Examples => EXAMPLE_QUESTIONS.len(),
            SidebarTab::History => self.history.len(),
        }
    }

    fn handle_sidebar_select(&mut self) {
        match self.sidebar_tab {
            SidebarTab::Tables => {
                // Insert table name into the question
                if let Some(table) = self.tables.get(self.sidebar_selected) {
                    let table = table.clone();
                    if !self.input.text().is_empty() && !self.input.text().ends_with(' ') {
                        self.input.insert_char(' ');
                    }
                    self.input.insert_text(&table);
                    self.focus = Focus::Input;
                }
            }
            SidebarTab::Examples => {
                if let Some(question) = EXAMPLE_QUESTIONS.get(self.sidebar_selected) {
                    self.input.set_text(question);
                    self.focus = Focus::Input;
                }
            }
            SidebarTab::History => {
                // Newest first
                let entries = self.history.entries();
                let picked = entries
                    .len()
                    .checked_sub(1 + self.sidebar_selected)
                    .and_then(|i| entries.get(i))
                    .map(|entry| entry.question.clone());
                if let Some(question) = picked {
                    self.input.set_text(&question);
                    self.focus = Focus::Input;
                }
            }
        }
    }
}
