mod input;
mod sidebar;

pub use input::QuestionInput;

use anyhow::Result;
use arboard::Clipboard;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::history::{HistoryEntry, QuestionHistory};
use crate::pipeline::{Pipeline, PipelineError, PipelineState, Step};
use crate::ui::Theme;

pub const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Sidebar,
    Input,
    Answer,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SidebarTab {
    Tables,
    Examples,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusType {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone)]
pub struct Toast {
    pub message: String,
    pub status_type: StatusType,
    pub created_at: Instant,
    pub duration: Duration,
}

impl Toast {
    pub fn new(message: String, status_type: StatusType) -> Self {
        let duration = match status_type {
            StatusType::Info | StatusType::Success => Duration::from_secs(3),
            StatusType::Warning => Duration::from_secs(5),
            StatusType::Error => Duration::from_secs(8),
        };
        Self {
            message,
            status_type,
            created_at: Instant::now(),
            duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }

    /// Returns progress from 0.0 (just created) to 1.0 (about to expire)
    pub fn progress(&self) -> f64 {
        let elapsed = self.created_at.elapsed().as_secs_f64();
        let total = self.duration.as_secs_f64();
        (elapsed / total).min(1.0)
    }
}

/// A question being answered in the background.
pub struct PendingRun {
    pub question: String,
    pub started: Instant,
    handle: JoinHandle<Result<PipelineState, PipelineError>>,
    progress: UnboundedReceiver<Step>,
}

pub struct App {
    pub theme: Theme,
    pub focus: Focus,
    pub should_quit: bool,

    pipeline: Arc<Pipeline>,
    pub database_label: String,

    // Sidebar
    pub sidebar_tab: SidebarTab,
    pub sidebar_width: u16,
    pub sidebar_selected: usize,
    pub tables: Vec<String>,

    // Question
    pub input: QuestionInput,
    pub history: QuestionHistory,
    history_path: Option<PathBuf>,

    // Answer
    pub last_run: Option<PipelineState>,
    pub last_error: Option<String>,
    pub answer_scroll: u16,

    // Running
    pub pending: Option<PendingRun>,
    pub current_step: Option<Step>,

    // Toasts
    pub toasts: Vec<Toast>,

    // Loading
    pub is_loading: bool,
    pub loading_message: String,
    pub spinner_frame: usize,

    pub show_help: bool,
}

impl App {
    pub fn new(pipeline: Arc<Pipeline>, database_label: String) -> Self {
        Self {
            theme: Theme::dark(),
            focus: Focus::Input,
            should_quit: false,

            pipeline,
            database_label,

            sidebar_tab: SidebarTab::Tables,
            sidebar_width: 35,
            sidebar_selected: 0,
            tables: Vec::new(),

            input: QuestionInput::new(),
            history: QuestionHistory::new(),
            history_path: None,

            last_run: None,
            last_error: None,
            answer_scroll: 0,

            pending: None,
            current_step: None,

            toasts: Vec::new(),
            is_loading: false,
            loading_message: String::new(),
            spinner_frame: 0,
            show_help: false,
        }
    }

    /// Use `history`, saving it back to `path` after every question.
    pub fn with_history(mut self, history: QuestionHistory, path: PathBuf) -> Self {
        self.history = history;
        self.history_path = Some(path);
        self
    }

    pub fn model_name(&self) -> &str {
        self.pipeline.model().name()
    }

    pub fn dialect(&self) -> &str {
        self.pipeline.database().dialect()
    }

    pub async fn handle_input(&mut self, key: KeyEvent) -> Result<()> {
        // Global shortcuts
        match (key.code, key.modifiers) {
            (KeyCode::Char('?'), _) if self.focus != Focus::Input => {
                self.show_help = !self.show_help;
                self.focus = if self.show_help {
                    Focus::Help
                } else {
                    Focus::Input
                };
                return Ok(());
            }
            (KeyCode::F(1), _) => {
                self.show_help = true;
                self.focus = Focus::Help;
                return Ok(());
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => self.handle_sidebar_input(key).await,
            Focus::Input => self.handle_question_input(key).await,
            Focus::Answer => self.handle_answer_input(key),
            Focus::Help => self.handle_help_input(key),
        }
    }

    fn handle_help_input(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::F(1) => {
                self.show_help = false;
                self.focus = Focus::Input;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_answer_input(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.focus = Focus::Input,
            KeyCode::BackTab => self.focus = Focus::Sidebar,
            KeyCode::Up => self.answer_scroll = self.answer_scroll.saturating_sub(1),
            KeyCode::Down => self.answer_scroll = self.answer_scroll.saturating_add(1),
            KeyCode::PageUp => self.answer_scroll = self.answer_scroll.saturating_sub(10),
            KeyCode::PageDown => self.answer_scroll = self.answer_scroll.saturating_add(10),
            KeyCode::Char('y') => self.copy_sql(),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn set_status(&mut self, message: String, status_type: StatusType) {
        let toast = Toast::new(message, status_type);
        self.toasts.push(toast);
        // Keep max 5 toasts
        if self.toasts.len() > 5 {
            self.toasts.remove(0);
        }
    }

    pub(crate) fn start_loading(&mut self, message: String) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub(crate) fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message.clear();
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Start answering the current input in the background.
    pub fn submit(&mut self) {
        if self.is_running() {
            self.set_status("Still working on the last question".into(), StatusType::Warning);
            return;
        }
        let question = self.input.text().to_string();
        if question.trim().is_empty() {
            self.set_status("Type a question first".into(), StatusType::Warning);
            return;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let (tx, rx) = mpsc::unbounded_channel();
        let asked = question.clone();
        let handle =
            tokio::spawn(async move { pipeline.run_with_progress(&asked, Some(&tx)).await });

        self.pending = Some(PendingRun {
            question,
            started: Instant::now(),
            handle,
            progress: rx,
        });
        self.current_step = None;
        self.last_error = None;
        self.history.reset_navigation();
        self.start_loading("Thinking...".into());
    }

    pub fn copy_sql(&mut self) {
        let Some(sql) = self.last_run.as_ref().map(|run| run.sql.clone()) else {
            self.set_status("Nothing to copy yet".into(), StatusType::Info);
            return;
        };
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(sql)) {
            Ok(()) => self.set_status("SQL copied to clipboard".into(), StatusType::Success),
            Err(e) => self.set_status(format!("Clipboard unavailable: {}", e), StatusType::Error),
        }
    }

    pub(super) async fn refresh_tables(&mut self) {
        self.start_loading("Loading tables...".into());
        match self.pipeline.database().usable_table_names().await {
            Ok(tables) => {
                self.tables = tables;
                if self.sidebar_tab == SidebarTab::Tables {
                    self.sidebar_selected = 0;
                }
            }
            Err(e) => self.set_status(format!("Failed to load tables: {}", e), StatusType::Error),
        }
        self.stop_loading();
    }

    /// Load the sidebar's table list. Called once before the first frame.
    pub async fn load_tables(&mut self) {
        self.refresh_tables().await;
    }

    pub async fn tick(&mut self) -> Result<()> {
        // Remove expired toasts
        self.toasts.retain(|t| !t.is_expired());

        // Advance spinner frame when loading
        if self.is_loading {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        }

        if let Some(pending) = self.pending.as_mut() {
            while let Ok(step) = pending.progress.try_recv() {
                self.current_step = Some(step);
                self.loading_message = format!("{}...", step.progress());
            }
        }

        let finished = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.handle.is_finished());
        if !finished {
            return Ok(());
        }
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        self.stop_loading();
        self.current_step = None;
        let elapsed_ms = pending.started.elapsed().as_millis() as u64;
        match pending.handle.await {
            Ok(Ok(run)) => self.finish_run(run, elapsed_ms),
            Ok(Err(e)) => {
                self.record_history(&pending.question, "", false, elapsed_ms);
                self.last_error = Some(e.to_string());
                self.set_status(e.to_string(), StatusType::Error);
            }
            Err(e) => {
                let msg = format!("Question task failed: {}", e);
                self.last_error = Some(msg.clone());
                self.set_status(msg, StatusType::Error);
            }
        }

        Ok(())
    }

    fn finish_run(&mut self, run: PipelineState, elapsed_ms: u64) {
        let success = run
            .outcome
            .as_ref()
            .is_some_and(|outcome| outcome.is_success());
        self.record_history(run.question(), &run.sql, success, elapsed_ms);

        if success {
            self.set_status(format!("Answered in {} ms", elapsed_ms), StatusType::Success);
        } else {
            self.set_status("The generated SQL failed".into(), StatusType::Warning);
        }
        self.answer_scroll = 0;
        self.last_run = Some(run);
    }

    fn record_history(&mut self, question: &str, sql: &str, success: bool, elapsed_ms: u64) {
        self.history.add(HistoryEntry {
            question: question.to_string(),
            sql: sql.to_string(),
            timestamp: chrono::Utc::now(),
            elapsed_ms,
            success,
        });
        if let Some(path) = &self.history_path {
            if let Err(e) = self.history.save_to(path) {
                warn!(error = %e, "failed to save question history");
            }
        }
    }
}
