// src/cli/state.rs
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::widgets::{ListState, TableState};
use rust_decimal::Decimal;

use crate::cli::api::{Client, EnvelopeRow, ProgressDto};
use crate::cli::input::LineEdit;
use crate::cli::util::{fmt_money, parse_money};
use crate::database::models::{Category, ChatMessage, ChatSession, Transaction, TransactionKind};

pub const HISTORY_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Envelopes,
    History,
    Add,
    Progress,
    Oracle,
    Help,
}

impl Tab {
    pub const ALL: [Tab; 6] = [Tab::Envelopes, Tab::History, Tab::Add, Tab::Progress, Tab::Oracle, Tab::Help];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Envelopes => "Envelopes",
            Self::History => "History",
            Self::Add => "Add",
            Self::Progress => "Progress",
            Self::Oracle => "Oracle",
            Self::Help => "Help",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    fn step(&self, delta: isize) -> Tab {
        let n = Self::ALL.len() as isize;
        Self::ALL[(self.index() as isize + delta).rem_euclid(n) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Amount,
    Note,
}

#[derive(Default)]
pub struct AddForm {
    pub kind: Option<TransactionKind>,
    pub amount: LineEdit,
    pub note: LineEdit,
    pub cat_sel: ListState,
    pub editing: Option<EditField>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl AddForm {
    pub fn is_expense(&self) -> bool {
        self.kind == Some(TransactionKind::Expense)
    }
}

#[derive(Default)]
pub struct OraclePage {
    pub session: Option<ChatSession>,
    pub messages: Vec<ChatMessage>,
    pub input: LineEdit,
    pub editing: bool,
    /// Question waiting to be sent on the next tick, so the UI can show it first.
    pub asking: Option<String>,
    pub error: Option<String>,
}

pub struct App {
    pub api: Client,
    pub tab: Tab,
    pub status: String,
    pub quit: bool,
    pub envelopes: Vec<EnvelopeRow>,
    pub env_sel: ListState,
    pub history: Vec<Transaction>,
    pub hist_sel: TableState,
    pub categories: Vec<Category>,
    pub add: AddForm,
    pub progress: Option<ProgressDto>,
    pub oracle: OraclePage,
    /// Queue length, `None` without a remote.
    pub pending: Option<i64>,
}

impl App {
    pub fn new(api: Client) -> Self {
        Self {
            api,
            tab: Tab::Envelopes,
            status: "i income | e expense | s sync | ? help | q quit".into(),
            quit: false,
            envelopes: Vec::new(),
            env_sel: ListState::default(),
            history: Vec::new(),
            hist_sel: TableState::default(),
            categories: Vec::new(),
            add: AddForm::default(),
            progress: None,
            oracle: OraclePage::default(),
            pending: None,
        }
    }

    pub async fn refresh(&mut self) -> anyhow::Result<()> {
        self.envelopes = self.api.envelopes().await?;
        self.categories = self.api.categories().await?;
        self.history = self.api.history(Some(HISTORY_LIMIT)).await?;
        self.progress = Some(self.api.progress().await?);
        self.pending = self.api.pending().await?;

        clamp(&mut self.env_sel, self.envelopes.len());
        clamp_table(&mut self.hist_sel, self.history.len());
        clamp(&mut self.add.cat_sel, self.categories.len());
        Ok(())
    }

    async fn refresh_or_report(&mut self) {
        if let Err(e) = self.refresh().await {
            self.status = format!("Refresh failed: {e}");
        }
    }

    pub fn is_editing(&self) -> bool {
        self.add.editing.is_some() || self.oracle.editing
    }

    pub fn selected_envelope(&self) -> Option<&EnvelopeRow> {
        self.env_sel.selected().and_then(|i| self.envelopes.get(i))
    }

    pub fn selected_category(&self) -> Option<&Category> {
        self.add.cat_sel.selected().and_then(|i| self.categories.get(i))
    }

    fn selected_txn(&self) -> Option<&Transaction> {
        self.hist_sel.selected().and_then(|i| self.history.get(i))
    }

    pub async fn handle_key(&mut self, k: KeyEvent) -> anyhow::Result<()> {
        if k.kind != KeyEventKind::Press {
            return Ok(());
        }
        if let Some(field) = self.add.editing {
            self.handle_add_input(field, k).await;
            return Ok(());
        }
        if self.oracle.editing {
            self.handle_oracle_input(k);
            return Ok(());
        }

        match k.code {
            KeyCode::Char('q') => {
                self.quit = true;
                return Ok(());
            }
            KeyCode::Tab => {
                self.tab = self.tab.step(1);
                return Ok(());
            }
            KeyCode::BackTab => {
                self.tab = self.tab.step(-1);
                return Ok(());
            }
            KeyCode::Char(c @ '1'..='6') => {
                self.tab = Tab::ALL[c as usize - '1' as usize];
                return Ok(());
            }
            KeyCode::Char('?') => {
                self.tab = Tab::Help;
                return Ok(());
            }
            KeyCode::Char('i') => {
                self.start_add(TransactionKind::Income);
                return Ok(());
            }
            KeyCode::Char('e') => {
                self.start_add(TransactionKind::Expense);
                return Ok(());
            }
            KeyCode::Char('s') => {
                self.sync().await;
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.status = match self.refresh().await {
                    Ok(()) => "Refreshed.".into(),
                    Err(e) => format!("Refresh failed: {e}"),
                };
                return Ok(());
            }
            _ => {}
        }

        match self.tab {
            Tab::Envelopes => match k.code {
                KeyCode::Up => move_sel(&mut self.env_sel, self.envelopes.len(), -1),
                KeyCode::Down => move_sel(&mut self.env_sel, self.envelopes.len(), 1),
                KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_selected(Decimal::ONE).await,
                KeyCode::Char('-') => self.adjust_selected(Decimal::NEGATIVE_ONE).await,
                _ => {}
            },
            Tab::History => match k.code {
                KeyCode::Up => move_table(&mut self.hist_sel, self.history.len(), -1),
                KeyCode::Down => move_table(&mut self.hist_sel, self.history.len(), 1),
                KeyCode::Char('x') | KeyCode::Delete => self.delete_selected().await,
                _ => {}
            },
            Tab::Add => match k.code {
                KeyCode::Up => move_sel(&mut self.add.cat_sel, self.categories.len(), -1),
                KeyCode::Down => move_sel(&mut self.add.cat_sel, self.categories.len(), 1),
                KeyCode::Char('t') => {
                    self.add.kind = Some(if self.add.is_expense() {
                        TransactionKind::Income
                    } else {
                        TransactionKind::Expense
                    });
                }
                KeyCode::Char('a') => self.add.editing = Some(EditField::Amount),
                KeyCode::Char('n') => self.add.editing = Some(EditField::Note),
                KeyCode::Enter => self.submit().await,
                KeyCode::Esc => {
                    self.tab = Tab::Envelopes;
                    self.add.error = None;
                }
                _ => {}
            },
            Tab::Oracle => match k.code {
                KeyCode::Enter if self.api.has_oracle() => {
                    self.oracle.editing = true;
                    if self.oracle.session.is_none() {
                        self.load_session().await;
                    }
                }
                _ => {}
            },
            Tab::Progress | Tab::Help => {
                if k.code == KeyCode::Esc {
                    self.tab = Tab::Envelopes;
                }
            }
        }
        Ok(())
    }

    fn start_add(&mut self, kind: TransactionKind) {
        self.tab = Tab::Add;
        self.add.kind = Some(kind);
        self.add.error = None;
        self.add.success = None;
        self.add.editing = Some(EditField::Amount);
        if self.add.cat_sel.selected().is_none() && !self.categories.is_empty() {
            self.add.cat_sel.select(Some(0));
        }
    }

    async fn handle_add_input(&mut self, field: EditField, k: KeyEvent) {
        let edit = match field {
            EditField::Amount => &mut self.add.amount,
            EditField::Note => &mut self.add.note,
        };
        match k.code {
            KeyCode::Char(c) => edit.push(c),
            KeyCode::Backspace => edit.backspace(),
            KeyCode::Delete => edit.delete(),
            KeyCode::Left => edit.left(),
            KeyCode::Right => edit.right(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.add.editing = Some(match field {
                    EditField::Amount => EditField::Note,
                    EditField::Note => EditField::Amount,
                });
            }
            // arrows still pick the envelope while typing
            KeyCode::Up => move_sel(&mut self.add.cat_sel, self.categories.len(), -1),
            KeyCode::Down => move_sel(&mut self.add.cat_sel, self.categories.len(), 1),
            KeyCode::Enter => {
                self.add.editing = None;
                self.submit().await;
            }
            KeyCode::Esc => self.add.editing = None,
            _ => {}
        }
    }

    fn handle_oracle_input(&mut self, k: KeyEvent) {
        let input = &mut self.oracle.input;
        match k.code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Left => input.left(),
            KeyCode::Right => input.right(),
            KeyCode::Esc => self.oracle.editing = false,
            KeyCode::Enter => {
                if !input.is_blank() && self.oracle.asking.is_none() {
                    self.oracle.asking = Some(input.take());
                    self.oracle.error = None;
                }
            }
            _ => {}
        }
    }

    /// Work that should happen after a frame has been drawn.
    pub async fn tick(&mut self) {
        let Some(question) = self.oracle.asking.take() else {
            return;
        };
        let Some(session_id) = self.oracle.session.as_ref().map(|s| s.id) else {
            self.oracle.error = Some("No conversation open".into());
            return;
        };
        match self.api.ask(session_id, &question).await {
            Ok(_) => self.load_session().await,
            Err(e) => {
                self.oracle.input.set(question);
                self.oracle.error = Some(format!("{e}"));
            }
        }
    }

    pub async fn load_session(&mut self) {
        match self.api.open_session().await {
            Ok(Some((session, messages))) => {
                self.oracle.session = Some(session);
                self.oracle.messages = messages;
            }
            Ok(None) => {}
            Err(e) => self.oracle.error = Some(format!("{e}")),
        }
    }

    async fn adjust_selected(&mut self, delta: Decimal) {
        let Some((key, weighted)) = self.selected_envelope().map(|r| (r.key.clone(), r.percent.is_some())) else {
            return;
        };
        if !weighted {
            self.status = format!("{key} is a surplus bucket, it has no weight");
            return;
        }
        match self.api.adjust_percent(&key, delta).await {
            Ok(_) => {
                self.refresh_or_report().await;
                self.status = format!("Rebalanced around {key}.");
            }
            Err(e) => self.status = format!("Rebalance failed: {e}"),
        }
    }

    async fn delete_selected(&mut self) {
        let Some(id) = self.selected_txn().map(|t| t.id) else { return };
        match self.api.delete_transaction(id).await {
            Ok(removed) => {
                self.refresh_or_report().await;
                self.status = format!("Deleted {} of {}.", removed.kind.as_str(), fmt_money(&removed.amount));
            }
            Err(e) => self.status = format!("Delete failed: {e}"),
        }
    }

    async fn sync(&mut self) {
        match self.api.sync().await {
            Ok(Some(report)) => {
                self.status = match &report.last_error {
                    Some(err) if report.remaining > 0 => {
                        format!("Synced {}, {} waiting: {err}", report.sent, report.remaining)
                    }
                    _ => format!("Synced {}, dropped {}.", report.sent, report.dead),
                };
                self.refresh_or_report().await;
            }
            Ok(None) => self.status = "No REMOTE_URL configured.".into(),
            Err(e) => self.status = format!("Sync failed: {e}"),
        }
    }

    pub async fn submit(&mut self) {
        let Some(kind) = self.add.kind else {
            self.add.error = Some("Press i or e to choose income or expense".into());
            return;
        };
        if self.add.amount.is_blank() {
            self.add.error = Some("Amount cannot be empty".into());
            return;
        }
        let Some(amount) = parse_money(&self.add.amount.value) else {
            self.add.error = Some("Invalid amount format".into());
            return;
        };
        let note = Some(self.add.note.value.clone()).filter(|n| !n.trim().is_empty());

        let result = match kind {
            TransactionKind::Income => self
                .api
                .record_income(amount, note)
                .await
                .map(|r| match r.surplus {
                    Some(split) => format!("Income saved, {} routed as surplus", fmt_money(&split.total())),
                    None => "Income saved".to_string(),
                }),
            TransactionKind::Expense => {
                let Some(category) = self.selected_category().map(|c| c.key.clone()) else {
                    self.add.error = Some("Category is required!".into());
                    return;
                };
                self.api
                    .record_expense(&category, amount, note)
                    .await
                    .map(|_| format!("Expense saved to {category}"))
            }
        };

        match result {
            Ok(msg) => {
                self.add.success = Some(msg);
                self.add.error = None;
                self.add.amount.clear();
                self.add.note.clear();
                self.refresh_or_report().await;
            }
            Err(e) => {
                self.add.error = Some(format!("Save failed: {e}"));
                self.add.success = None;
            }
        }
    }
}

fn move_sel(sel: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        sel.select(None);
        return;
    }
    let cur = sel.selected().unwrap_or(0) as isize;
    sel.select(Some((cur + delta).rem_euclid(len as isize) as usize));
}

fn move_table(sel: &mut TableState, len: usize, delta: isize) {
    if len == 0 {
        sel.select(None);
        return;
    }
    let cur = sel.selected().unwrap_or(0) as isize;
    sel.select(Some((cur + delta).rem_euclid(len as isize) as usize));
}

fn clamp(sel: &mut ListState, len: usize) {
    match (len, sel.selected()) {
        (0, _) => sel.select(None),
        (n, Some(i)) if i >= n => sel.select(Some(n - 1)),
        (_, None) => sel.select(Some(0)),
        _ => {}
    }
}

fn clamp_table(sel: &mut TableState, len: usize) {
    match (len, sel.selected()) {
        (0, _) => sel.select(None),
        (n, Some(i)) if i >= n => sel.select(Some(n - 1)),
        (_, None) => sel.select(Some(0)),
        _ => {}
    }
}
