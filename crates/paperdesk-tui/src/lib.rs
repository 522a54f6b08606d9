// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use paperdesk_app::{
    AppCommand, AppMode, AppState, CHECKBOX_COLUMN, ChoiceList, ChoiceRecord, FormKind, PaneId,
    PaneTree, PrefsSession, PrefsStorage, ProfileField, ProfileSnapshot, ProfileVerifyTicket,
    RecognitionPage, RecognitionRequest, RowClick, RowDecorator, RowProjector, RowSelection,
    ScrollHost, ScrollSynchronizer, SelectionReconciler, SessionEvent, SubmissionReply, TabKind,
    TableController, TokenVerifyTicket, VerifyReply, mask_api_key, route_click,
    visible_data_rows,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

const HEADER_ROWS: u16 = 1;
const ROW_HEIGHT: u16 = 1;
const PROFILE_FORM_HEIGHT: u16 = ProfileField::ALL.len() as u16 + 4;
const TOKEN_FORM_HEIGHT: u16 = 5;
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);

/// What the terminal host needs from the outside world.
///
/// The `spawn_*` methods deliver their result as an [`InternalEvent`]; the
/// defaults call the blocking method inline, runtimes with a real network
/// client move the call onto a worker thread.
pub trait AppRuntime {
    fn prefs(&self) -> &dyn PrefsStorage;
    fn verify_profile(&mut self, snapshot: &ProfileSnapshot) -> VerifyReply;
    fn verify_token(&mut self, token: &str) -> VerifyReply;
    fn start_recognition(&mut self, request: &RecognitionRequest) -> SubmissionReply;

    fn spawn_profile_verify(
        &mut self,
        ticket: ProfileVerifyTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let reply = self.verify_profile(&ticket.snapshot);
        tx.send(InternalEvent::ProfileVerified {
            fingerprint: ticket.fingerprint,
            reply,
        })
        .map_err(|_| anyhow!("verification event channel closed"))
    }

    fn spawn_token_verify(
        &mut self,
        ticket: TokenVerifyTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let reply = self.verify_token(&ticket.token);
        tx.send(InternalEvent::TokenVerified {
            token: ticket.token,
            reply,
        })
        .map_err(|_| anyhow!("verification event channel closed"))
    }

    fn spawn_recognition(
        &mut self,
        request: RecognitionRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let reply = self.start_recognition(&request);
        tx.send(InternalEvent::RecognitionFinished { reply })
            .map_err(|_| anyhow!("recognition event channel closed"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    ProfileVerified { fingerprint: String, reply: VerifyReply },
    TokenVerified { token: String, reply: VerifyReply },
    RecognitionFinished { reply: SubmissionReply },
}

/// Header and body panes of one table, scrolled in lockstep.
#[derive(Debug, Clone)]
struct TablePanes {
    tree: PaneTree,
    sync: ScrollSynchronizer,
    header: PaneId,
    body: PaneId,
}

impl TablePanes {
    fn new(data_columns: usize) -> Self {
        let mut tree = PaneTree::new();
        let container = tree.add_root();
        let header = tree.add_child(container);
        let body = tree.add_child(container);
        let max_scroll = data_columns.saturating_sub(1).min(usize::from(u16::MAX)) as u16;
        tree.set_max_scroll(header, max_scroll);
        tree.set_max_scroll(body, max_scroll);
        let mut sync = ScrollSynchronizer::new();
        sync.attach(container);
        Self {
            tree,
            sync,
            header,
            body,
        }
    }

    fn scroll_body(&mut self, delta: i32) -> bool {
        let moved = self.tree.scroll_by(self.body, delta);
        self.observe();
        moved
    }

    /// Runs the pending frame, if any. Echo notifications from the frame's
    /// own writes are fed back so the synchronizer can drop them.
    fn flush(&mut self) -> usize {
        let written = self.sync.run_frame(&mut self.tree);
        self.observe();
        written
    }

    fn header_offset(&self) -> usize {
        usize::from(self.tree.scroll_left(self.header))
    }

    fn body_offset(&self) -> usize {
        usize::from(self.tree.scroll_left(self.body))
    }

    fn observe(&mut self) {
        for pane in self.tree.take_scroll_events() {
            self.sync.on_scroll(&self.tree, pane);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoiceKind {
    Classes,
    InstructionPrompts,
    SummaryPrompts,
}

impl ChoiceKind {
    const ALL: [Self; 3] = [
        Self::Classes,
        Self::InstructionPrompts,
        Self::SummaryPrompts,
    ];

    const fn title(self) -> &'static str {
        match self {
            Self::Classes => "arXiv classes",
            Self::InstructionPrompts => "instruction prompts",
            Self::SummaryPrompts => "summary prompts",
        }
    }

    const fn detail_label(self) -> &'static str {
        match self {
            Self::Classes => "description",
            Self::InstructionPrompts | Self::SummaryPrompts => "content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecognitionItem {
    ListHeader(ChoiceKind),
    Entry(ChoiceKind, usize),
    Model,
    WindowHours,
    FolderPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    WindowHours,
    FolderPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryDraft {
    kind: ChoiceKind,
    name: String,
    detail: String,
    on_detail: bool,
}

struct ViewData {
    session: PrefsSession,
    recognition: RecognitionPage,
    profile_rows: RowSelection,
    token_rows: RowSelection,
    profile_panes: TablePanes,
    token_panes: TablePanes,
    profile_field: usize,
    recognition_focus: usize,
    text_target: Option<TextTarget>,
    entry_draft: Option<EntryDraft>,
    find_query: String,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn open(storage: &dyn PrefsStorage) -> Self {
        let session = PrefsSession::open(storage);
        let recognition = RecognitionPage::open(storage, session.profiles());
        let profile_columns = session.profile_table().columns().len().saturating_sub(1);
        let token_columns = session.token_table().columns().len().saturating_sub(1);
        Self {
            session,
            recognition,
            profile_rows: RowSelection::default(),
            token_rows: RowSelection::default(),
            profile_panes: TablePanes::new(profile_columns),
            token_panes: TablePanes::new(token_columns),
            profile_field: 0,
            recognition_focus: 0,
            text_target: None,
            entry_draft: None,
            find_query: String::new(),
            help_visible: false,
            status_token: 0,
        }
    }

    fn flush_scroll_frames(&mut self) {
        self.profile_panes.flush();
        self.token_panes.flush();
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::open(runtime.prefs());
    let (internal_tx, internal_rx) = mpsc::channel();
    tracing::info!("terminal session started");

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        view_data.flush_scroll_frames();

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => {
                    let size = terminal.size().context("read terminal size")?;
                    let area = Rect::new(0, 0, size.width, size.height);
                    handle_mouse_event(state, &mut view_data, mouse, area);
                }
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(
        io::stdout(),
        terminal::LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("leave alternate screen")?;
    tracing::info!("terminal session closed");
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::ProfileVerified { fingerprint, reply } => {
                let events = view_data.session.finish_profile_verify(fingerprint, &reply);
                apply_session_events(state, runtime.prefs(), view_data, tx, events);
            }
            InternalEvent::TokenVerified { token, reply } => {
                let events = view_data.session.finish_token_verify(token, &reply);
                apply_session_events(state, runtime.prefs(), view_data, tx, events);
            }
            InternalEvent::RecognitionFinished { reply } => {
                view_data.recognition.record_reply(local_now(), &reply);
            }
        }
    }
}

fn apply_session_events(
    state: &mut AppState,
    storage: &dyn PrefsStorage,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: Vec<SessionEvent>,
) {
    for event in events {
        match event {
            SessionEvent::Status { .. } => {}
            SessionEvent::ProfilesChanged => {
                view_data
                    .profile_rows
                    .clamp(view_data.session.profiles().len());
                view_data
                    .recognition
                    .refresh_models(storage, view_data.session.profiles());
            }
            SessionEvent::TokensChanged => {
                view_data.token_rows.clamp(view_data.session.tokens().len());
            }
            SessionEvent::Notice(text) => emit_status(state, view_data, tx, text),
            SessionEvent::PersistFailed { error, .. } => {
                emit_status(state, view_data, tx, format!("save failed: {error}"));
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if state.mode != AppMode::Find {
        match key.code {
            KeyCode::Tab => {
                switch_tab(state, view_data, AppCommand::NextTab);
                return false;
            }
            KeyCode::BackTab => {
                switch_tab(state, view_data, AppCommand::PrevTab);
                return false;
            }
            _ => {}
        }
    }

    match state.mode {
        AppMode::Form => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::Find => handle_find_key(state, view_data, key),
        AppMode::Nav => {
            if key.code == KeyCode::Char('?') {
                view_data.help_visible = true;
                return false;
            }
            match state.active_tab {
                TabKind::Profiles | TabKind::Tokens => {
                    handle_table_key(state, runtime, view_data, internal_tx, key);
                }
                TabKind::Recognition => {
                    handle_recognition_key(state, runtime, view_data, internal_tx, key);
                }
            }
        }
    }
    false
}

fn switch_tab(state: &mut AppState, view_data: &mut ViewData, command: AppCommand) {
    state.dispatch(command);
    leave_form(view_data);
    view_data.find_query.clear();
}

fn leave_form(view_data: &mut ViewData) {
    view_data.text_target = None;
    view_data.entry_draft = None;
}

fn exit_to_nav(state: &mut AppState, view_data: &mut ViewData) {
    state.dispatch(AppCommand::ExitToNav);
    leave_form(view_data);
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let tab = state.active_tab;
    let extend = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Up => move_table_cursor(view_data, tab, -1, extend),
        KeyCode::Down => move_table_cursor(view_data, tab, 1, extend),
        KeyCode::Left => {
            table_panes_mut(view_data, tab).scroll_body(-1);
        }
        KeyCode::Right => {
            table_panes_mut(view_data, tab).scroll_body(1);
        }
        KeyCode::Char(' ') => {
            if let Some(cursor) = table_rows(view_data, tab).cursor() {
                toggle_row_check(view_data, tab, cursor);
            }
        }
        KeyCode::Char('/') => {
            view_data.find_query.clear();
            state.dispatch(AppCommand::OpenFind);
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::FocusForm);
        }
        KeyCode::Char('e') => edit_into_form(state, view_data, internal_tx, tab),
        KeyCode::Char('t') => start_verify(state, runtime, view_data, internal_tx, tab),
        KeyCode::Char('s') => commit_form(state, runtime, view_data, internal_tx, tab),
        KeyCode::Char('d') => delete_targets(state, runtime, view_data, internal_tx, tab),
        _ => {}
    }
}

fn table_rows(view_data: &ViewData, tab: TabKind) -> &RowSelection {
    match tab {
        TabKind::Tokens => &view_data.token_rows,
        _ => &view_data.profile_rows,
    }
}

fn table_panes_mut(view_data: &mut ViewData, tab: TabKind) -> &mut TablePanes {
    match tab {
        TabKind::Tokens => &mut view_data.token_panes,
        _ => &mut view_data.profile_panes,
    }
}

fn table_len(view_data: &ViewData, tab: TabKind) -> usize {
    match tab {
        TabKind::Tokens => view_data.session.tokens().len(),
        _ => view_data.session.profiles().len(),
    }
}

fn move_table_cursor(view_data: &mut ViewData, tab: TabKind, delta: isize, extend: bool) {
    let len = table_len(view_data, tab);
    match tab {
        TabKind::Tokens => view_data.token_rows.move_cursor(delta, len, extend),
        _ => view_data.profile_rows.move_cursor(delta, len, extend),
    }
}

fn toggle_row_check(view_data: &mut ViewData, tab: TabKind, index: usize) {
    match tab {
        TabKind::Tokens => view_data.session.toggle_token_check(index),
        _ => view_data.session.toggle_profile_check(index),
    }
}

fn select_row(view_data: &mut ViewData, tab: TabKind, index: usize) {
    match tab {
        TabKind::Tokens => view_data.token_rows.select_only(index),
        _ => view_data.profile_rows.select_only(index),
    }
}

fn edit_into_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    tab: TabKind,
) {
    if tab == TabKind::Profiles {
        let events = view_data
            .session
            .edit_selected_profile(&view_data.profile_rows);
        let mut refused = false;
        for event in events {
            if let SessionEvent::Notice(text) = event {
                refused = true;
                emit_status(state, view_data, internal_tx, text);
            }
        }
        if refused {
            return;
        }
        view_data.profile_field = 0;
    }
    state.dispatch(AppCommand::FocusForm);
}

fn start_verify<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    tab: TabKind,
) {
    let spawned = match tab {
        TabKind::Tokens => {
            let (ticket, _) = view_data.session.begin_token_verify();
            runtime.spawn_token_verify(ticket, internal_tx.clone())
        }
        _ => {
            let (ticket, _) = view_data.session.begin_profile_verify();
            runtime.spawn_profile_verify(ticket, internal_tx.clone())
        }
    };
    if let Err(error) = spawned {
        tracing::error!("start verification: {error:#}");
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("verification could not start: {error}"),
        );
    }
}

fn commit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    tab: TabKind,
) {
    let events = match tab {
        TabKind::Tokens => view_data.session.submit_token(runtime.prefs()),
        _ => view_data.session.save_profile(runtime.prefs()),
    };
    apply_session_events(state, runtime.prefs(), view_data, internal_tx, events);
}

fn delete_targets<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    tab: TabKind,
) {
    let events = match tab {
        TabKind::Tokens => view_data
            .session
            .delete_tokens(&view_data.token_rows, runtime.prefs()),
        _ => view_data
            .session
            .delete_profiles(&view_data.profile_rows, runtime.prefs()),
    };
    if events.is_empty() {
        return;
    }
    // Indices shift after a delete; keep only the cursor selected.
    let len = table_len(view_data, tab);
    let rows = match tab {
        TabKind::Tokens => &mut view_data.token_rows,
        _ => &mut view_data.profile_rows,
    };
    match rows.cursor() {
        Some(cursor) if len > 0 => rows.select_only(cursor.min(len - 1)),
        _ => rows.clear(),
    }
    apply_session_events(state, runtime.prefs(), view_data, internal_tx, events);
}

fn handle_find_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
            return;
        }
        KeyCode::Backspace => {
            view_data.find_query.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.find_query.push(ch);
        }
        _ => return,
    }

    let tab = state.active_tab;
    let start = table_rows(view_data, tab).cursor().unwrap_or(0);
    let found = match tab {
        TabKind::Tokens => view_data
            .session
            .token_table()
            .find(&view_data.find_query, start),
        _ => view_data
            .session
            .profile_table()
            .find(&view_data.find_query, start),
    };
    if let Some(index) = found {
        select_row(view_data, tab, index);
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let tab = state.active_tab;
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    if tab != TabKind::Recognition {
        match key.code {
            KeyCode::Esc => {
                exit_to_nav(state, view_data);
                return;
            }
            KeyCode::Char('t') if control => {
                start_verify(state, runtime, view_data, internal_tx, tab);
                return;
            }
            KeyCode::Char('s') if control => {
                commit_form(state, runtime, view_data, internal_tx, tab);
                return;
            }
            _ => {}
        }
    }

    match tab {
        TabKind::Profiles => edit_profile_form(view_data, key),
        TabKind::Tokens => edit_token_form(view_data, key),
        TabKind::Recognition => {
            handle_recognition_form_key(state, runtime, view_data, internal_tx, key);
        }
    }
}

fn edit_profile_form(view_data: &mut ViewData, key: KeyEvent) {
    let fields = ProfileField::ALL;
    let field = fields[view_data.profile_field.min(fields.len() - 1)];
    let mut value = view_data.session.profile_form().value(field).to_owned();
    match key.code {
        KeyCode::Up => {
            view_data.profile_field = view_data.profile_field.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Enter => {
            view_data.profile_field = (view_data.profile_field + 1).min(fields.len() - 1);
        }
        KeyCode::Left if field.is_choice() => {
            view_data.session.cycle_api_type(-1);
        }
        KeyCode::Right if field.is_choice() => {
            view_data.session.cycle_api_type(1);
        }
        KeyCode::Backspace if !field.is_choice() => {
            if value.pop().is_some() {
                view_data.session.set_profile_field(field, &value);
            }
        }
        KeyCode::Char(ch)
            if !field.is_choice() && !key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            value.push(ch);
            view_data.session.set_profile_field(field, &value);
        }
        _ => {}
    }
}

fn edit_token_form(view_data: &mut ViewData, key: KeyEvent) {
    let mut value = view_data.session.token_form().input.clone();
    match key.code {
        KeyCode::Backspace => {
            if value.pop().is_some() {
                view_data.session.set_token_input(&value);
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            value.push(ch);
            view_data.session.set_token_input(&value);
        }
        _ => {}
    }
}

fn recognition_items(page: &RecognitionPage) -> Vec<RecognitionItem> {
    let mut items = Vec::new();
    for kind in ChoiceKind::ALL {
        items.push(RecognitionItem::ListHeader(kind));
        for index in 0..choice_len(page, kind) {
            items.push(RecognitionItem::Entry(kind, index));
        }
    }
    items.extend([
        RecognitionItem::Model,
        RecognitionItem::WindowHours,
        RecognitionItem::FolderPath,
    ]);
    items
}

fn focused_item(view_data: &ViewData) -> Option<RecognitionItem> {
    let items = recognition_items(&view_data.recognition);
    let index = view_data
        .recognition_focus
        .min(items.len().saturating_sub(1));
    items.get(index).copied()
}

fn choice_len(page: &RecognitionPage, kind: ChoiceKind) -> usize {
    match kind {
        ChoiceKind::Classes => page.classes.len(),
        ChoiceKind::InstructionPrompts => page.instruction_prompts.len(),
        ChoiceKind::SummaryPrompts => page.summary_prompts.len(),
    }
}

fn toggle_choice(page: &mut RecognitionPage, kind: ChoiceKind, index: usize) {
    match kind {
        ChoiceKind::Classes => page.classes.toggle(index),
        ChoiceKind::InstructionPrompts => page.instruction_prompts.toggle(index),
        ChoiceKind::SummaryPrompts => page.summary_prompts.toggle(index),
    }
}

fn add_choice(
    page: &mut RecognitionPage,
    kind: ChoiceKind,
    draft: &EntryDraft,
    storage: &dyn PrefsStorage,
) -> Result<bool> {
    match kind {
        ChoiceKind::Classes => page.classes.add(&draft.name, &draft.detail, storage),
        ChoiceKind::InstructionPrompts => {
            page.instruction_prompts
                .add(&draft.name, &draft.detail, storage)
        }
        ChoiceKind::SummaryPrompts => page.summary_prompts.add(&draft.name, &draft.detail, storage),
    }
}

fn delete_choice(
    page: &mut RecognitionPage,
    kind: ChoiceKind,
    index: usize,
    storage: &dyn PrefsStorage,
) -> Result<bool> {
    match kind {
        ChoiceKind::Classes => page.classes.delete(index, storage),
        ChoiceKind::InstructionPrompts => page.instruction_prompts.delete(index, storage),
        ChoiceKind::SummaryPrompts => page.summary_prompts.delete(index, storage),
    }
}

fn handle_recognition_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let item_count = recognition_items(&view_data.recognition).len();
    let item = focused_item(view_data);
    match (key.code, item) {
        (KeyCode::Up, _) => {
            view_data.recognition_focus = view_data.recognition_focus.saturating_sub(1);
        }
        (KeyCode::Down, _) => {
            view_data.recognition_focus =
                (view_data.recognition_focus + 1).min(item_count.saturating_sub(1));
        }
        (KeyCode::Char(' ') | KeyCode::Enter, Some(RecognitionItem::Entry(kind, index))) => {
            toggle_choice(&mut view_data.recognition, kind, index);
        }
        (KeyCode::Left, Some(RecognitionItem::Model)) => {
            cycle_model(state, runtime, view_data, internal_tx, -1);
        }
        (KeyCode::Right | KeyCode::Char(' '), Some(RecognitionItem::Model)) => {
            cycle_model(state, runtime, view_data, internal_tx, 1);
        }
        (KeyCode::Enter, Some(RecognitionItem::WindowHours)) => {
            view_data.text_target = Some(TextTarget::WindowHours);
            state.dispatch(AppCommand::FocusForm);
        }
        (KeyCode::Enter, Some(RecognitionItem::FolderPath)) => {
            view_data.text_target = Some(TextTarget::FolderPath);
            state.dispatch(AppCommand::FocusForm);
        }
        (
            KeyCode::Char('a'),
            Some(RecognitionItem::ListHeader(kind) | RecognitionItem::Entry(kind, _)),
        ) => {
            view_data.entry_draft = Some(EntryDraft {
                kind,
                name: String::new(),
                detail: String::new(),
                on_detail: false,
            });
            state.dispatch(AppCommand::FocusForm);
        }
        (KeyCode::Char('d'), Some(RecognitionItem::Entry(kind, index))) => {
            match delete_choice(&mut view_data.recognition, kind, index, runtime.prefs()) {
                Ok(true) => {
                    let count = recognition_items(&view_data.recognition).len();
                    view_data.recognition_focus =
                        view_data.recognition_focus.min(count.saturating_sub(1));
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::error!("delete {}: {error:#}", kind.title());
                    emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
                }
            }
        }
        (KeyCode::Char('s'), _) => {
            let request = view_data.recognition.build_request();
            tracing::info!(
                model = request.model.as_str(),
                window_hours = request.window_hours.as_str(),
                "submitting recognition request"
            );
            if let Err(error) = runtime.spawn_recognition(request, internal_tx.clone()) {
                tracing::error!("start recognition: {error:#}");
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("recognition could not start: {error}"),
                );
            }
        }
        (KeyCode::Char('c'), _) => view_data.recognition.log.clear(),
        _ => {}
    }
}

fn cycle_model<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    if let Err(error) = view_data.recognition.cycle_model(delta, runtime.prefs()) {
        tracing::error!("persist model choice: {error:#}");
        emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
    }
}

fn handle_recognition_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if view_data.entry_draft.is_some() {
        edit_entry_draft(state, runtime, view_data, internal_tx, key);
        return;
    }

    let Some(target) = view_data.text_target else {
        exit_to_nav(state, view_data);
        return;
    };
    let mut value = match target {
        TextTarget::WindowHours => view_data.recognition.window_hours().to_owned(),
        TextTarget::FolderPath => view_data.recognition.folder_path.clone(),
    };
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            exit_to_nav(state, view_data);
            return;
        }
        KeyCode::Backspace => {
            if value.pop().is_none() {
                return;
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => value.push(ch),
        _ => return,
    }

    match target {
        TextTarget::FolderPath => view_data.recognition.folder_path = value,
        TextTarget::WindowHours => {
            if let Err(error) = view_data
                .recognition
                .set_window_hours(&value, runtime.prefs())
            {
                tracing::error!("persist window hours: {error:#}");
                emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
            }
        }
    }
}

fn edit_entry_draft<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(draft) = view_data.entry_draft.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => {
            exit_to_nav(state, view_data);
        }
        KeyCode::Up => draft.on_detail = false,
        KeyCode::Down => draft.on_detail = true,
        KeyCode::Backspace => {
            let field = if draft.on_detail {
                &mut draft.detail
            } else {
                &mut draft.name
            };
            field.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let field = if draft.on_detail {
                &mut draft.detail
            } else {
                &mut draft.name
            };
            field.push(ch);
        }
        KeyCode::Enter if !draft.on_detail => draft.on_detail = true,
        KeyCode::Enter => {
            let draft = draft.clone();
            match add_choice(
                &mut view_data.recognition,
                draft.kind,
                &draft,
                runtime.prefs(),
            ) {
                Ok(true) => exit_to_nav(state, view_data),
                Ok(false) => {
                    emit_status(state, view_data, internal_tx, "name must not be empty");
                }
                Err(error) => {
                    tracing::error!("add {}: {error:#}", draft.kind.title());
                    emit_status(state, view_data, internal_tx, format!("save failed: {error}"));
                }
            }
        }
        _ => {}
    }
}

fn handle_mouse_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    mouse: MouseEvent,
    area: Rect,
) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) || state.mode != AppMode::Nav {
        return;
    }
    let tab = state.active_tab;
    let Some(body) = table_body_area(tab, view_data, area) else {
        return;
    };
    let inside = mouse.column >= body.x
        && mouse.column < body.right()
        && mouse.row >= body.y
        && mouse.row < body.bottom();
    if !inside {
        return;
    }

    let window = visible_window(table_len(view_data, tab), table_rows(view_data, tab).cursor());
    let index = window.start + usize::from((mouse.row - body.y) / ROW_HEIGHT);
    if index >= window.end {
        return;
    }
    match route_click(index, mouse.column - body.x) {
        RowClick::ToggleChecked(index) => toggle_row_check(view_data, tab, index),
        RowClick::SelectRow(index) => select_row(view_data, tab, index),
    }
}

/// Rows shown in the viewport, scrolled so the cursor stays visible.
fn visible_window(row_count: usize, cursor: Option<usize>) -> Range<usize> {
    let visible = visible_data_rows(row_count).min(row_count);
    let cursor = cursor.unwrap_or(0).min(row_count.saturating_sub(1));
    let start = (cursor + 1).saturating_sub(visible);
    start..start + visible
}

fn screen_layout(area: Rect) -> [Rect; 3] {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(area);
    [layout[0], layout[1], layout[2]]
}

/// Form and table rectangles of a table tab.
fn table_tab_layout(tab: TabKind, view_data: &ViewData, body: Rect) -> (Rect, Rect) {
    let form_height = match tab {
        TabKind::Tokens => TOKEN_FORM_HEIGHT,
        _ => PROFILE_FORM_HEIGHT,
    };
    let table_height = viewport_rows(tab, view_data) + 2;
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(form_height),
            Constraint::Length(table_height),
            Constraint::Min(0),
        ])
        .split(body);
    (layout[0], layout[1])
}

fn viewport_rows(tab: TabKind, view_data: &ViewData) -> u16 {
    match tab {
        TabKind::Tokens => view_data
            .session
            .token_table()
            .viewport_height(HEADER_ROWS, ROW_HEIGHT),
        _ => view_data
            .session
            .profile_table()
            .viewport_height(HEADER_ROWS, ROW_HEIGHT),
    }
}

/// Screen area of the data rows, below the header.
fn table_body_area(tab: TabKind, view_data: &ViewData, area: Rect) -> Option<Rect> {
    if tab == TabKind::Recognition {
        return None;
    }
    let [_, body, _] = screen_layout(area);
    let (_, table) = table_tab_layout(tab, view_data, body);
    let inner = Block::default().borders(Borders::ALL).inner(table);
    if inner.height <= HEADER_ROWS {
        return None;
    }
    Some(Rect::new(
        inner.x,
        inner.y + HEADER_ROWS,
        inner.width,
        inner.height - HEADER_ROWS,
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RowView {
    index: usize,
    checkbox: &'static str,
    cells: Vec<String>,
    backdrop: bool,
    highlighted: bool,
    cursor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableView {
    header: Vec<String>,
    widths: Vec<u16>,
    rows: Vec<RowView>,
}

fn table_view<P: RowProjector, D: RowDecorator>(
    controller: &TableController<P, D>,
    rows: &RowSelection,
    checks: &SelectionReconciler,
    panes: &TablePanes,
) -> TableView {
    let data_columns = controller.columns().get(1..).unwrap_or_default();
    let header = std::iter::once(String::new())
        .chain(
            data_columns
                .iter()
                .skip(panes.header_offset())
                .map(|column| column.label.to_owned()),
        )
        .collect();
    let body_offset = panes.body_offset();
    let widths = std::iter::once(CHECKBOX_COLUMN.width)
        .chain(
            data_columns
                .iter()
                .skip(body_offset)
                .map(|column| column.width),
        )
        .collect();

    let window = visible_window(controller.row_count(), rows.cursor());
    let rows_out = controller
        .render_rows(window, rows, checks)
        .into_iter()
        .map(|node| {
            let (checked, highlighted) = node.checkbox().unwrap_or((false, false));
            RowView {
                index: node.index,
                checkbox: if checked { "[x]" } else { "[ ]" },
                cells: node
                    .visible_cells()
                    .skip(body_offset)
                    .map(|cell| cell.text.clone())
                    .collect(),
                backdrop: node.has_backdrop(),
                highlighted,
                cursor: rows.cursor() == Some(node.index),
            }
        })
        .collect();

    TableView {
        header,
        widths,
        rows: rows_out,
    }
}

fn active_table_view(tab: TabKind, view_data: &ViewData) -> TableView {
    match tab {
        TabKind::Tokens => table_view(
            &view_data.session.token_table(),
            &view_data.token_rows,
            view_data.session.token_checks(),
            &view_data.token_panes,
        ),
        _ => table_view(
            &view_data.session.profile_table(),
            &view_data.profile_rows,
            view_data.session.profile_checks(),
            &view_data.profile_panes,
        ),
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let [tabs_area, body, status_area] = screen_layout(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, view_data))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("paperdesk").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, tabs_area);

    match state.active_tab {
        TabKind::Profiles | TabKind::Tokens => render_table_tab(frame, body, state, view_data),
        TabKind::Recognition => render_recognition_tab(frame, body, state, view_data),
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, status_area);

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn tab_title(tab: TabKind, view_data: &ViewData) -> String {
    match tab {
        TabKind::Profiles => format!("{} ({})", tab.label(), view_data.session.profiles().len()),
        TabKind::Tokens => format!("{} ({})", tab.label(), view_data.session.tokens().len()),
        TabKind::Recognition => tab.label().to_owned(),
    }
}

fn render_table_tab(
    frame: &mut ratatui::Frame<'_>,
    body: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let tab = state.active_tab;
    let (form_area, table_area) = table_tab_layout(tab, view_data, body);
    let editing = state.mode == AppMode::Form;

    let (form_title, form_text) = match tab {
        TabKind::Tokens => ("token", render_token_form_text(view_data, editing)),
        _ => ("profile", render_profile_form_text(view_data, editing)),
    };
    let form_style = if editing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let form = Paragraph::new(form_text).block(
        Block::default()
            .title(form_title)
            .borders(Borders::ALL)
            .border_style(form_style),
    );
    frame.render_widget(form, form_area);

    let view = active_table_view(tab, view_data);
    let header = Row::new(view.header.iter().map(|label| {
        Cell::from(label.clone()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let rows = view.rows.iter().map(|row| {
        let mut base = Style::default();
        if row.backdrop {
            base = base.bg(Color::DarkGray);
        }
        let mut checkbox_style = base;
        if row.highlighted {
            checkbox_style = checkbox_style.fg(Color::Cyan);
        }
        let mut text_style = base;
        if row.cursor {
            text_style = text_style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        let cells = std::iter::once(Cell::from(row.checkbox).style(checkbox_style)).chain(
            row.cells
                .iter()
                .map(|text| Cell::from(text.clone()).style(text_style)),
        );
        Row::new(cells.collect::<Vec<_>>())
    });
    let widths = view
        .widths
        .iter()
        .map(|width| Constraint::Length(*width))
        .collect::<Vec<_>>();
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(tab, view_data))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, table_area);
}

fn table_title(tab: TabKind, view_data: &ViewData) -> String {
    let (len, checked) = match tab {
        TabKind::Tokens => (
            view_data.session.tokens().len(),
            view_data.session.token_checks().checked().len(),
        ),
        _ => (
            view_data.session.profiles().len(),
            view_data.session.profile_checks().checked().len(),
        ),
    };
    if checked == 0 {
        format!("{} rows", len)
    } else {
        format!("{} rows, {} checked", len, checked)
    }
}

fn render_profile_form_text(view_data: &ViewData, editing: bool) -> String {
    let form = view_data.session.profile_form();
    let mut lines = Vec::with_capacity(ProfileField::ALL.len() + 2);
    for (index, field) in ProfileField::ALL.iter().copied().enumerate() {
        let focused = editing && index == view_data.profile_field;
        let marker = if focused { ">" } else { " " };
        let raw = form.value(field);
        let value = if field.is_secret() && !focused {
            mask_api_key(raw)
        } else if field.is_choice() {
            format!("< {raw} >")
        } else {
            raw.to_owned()
        };
        lines.push(format!("{marker} {:<15} {value}", field.label()));
    }

    let mut footer = String::new();
    if let Some(index) = view_data.session.editing_index() {
        footer.push_str(&format!("editing row {}  ", index + 1));
    }
    footer.push_str(if view_data.session.can_save_profile() {
        "save: ready"
    } else {
        "save: verify first"
    });
    lines.push(footer);
    lines.push(status_or_blank(
        view_data.session.status(FormKind::Profile),
    ));
    lines.join("\n")
}

fn render_token_form_text(view_data: &ViewData, editing: bool) -> String {
    let marker = if editing { ">" } else { " " };
    let input = &view_data.session.token_form().input;
    let gate = if view_data.session.can_submit_token() {
        "submit: ready"
    } else {
        "submit: verify first"
    };
    [
        format!("{marker} {:<15} {input}", "token"),
        gate.to_owned(),
        status_or_blank(view_data.session.status(FormKind::Token)),
    ]
    .join("\n")
}

fn status_or_blank(status: &str) -> String {
    if status.is_empty() {
        String::new()
    } else {
        format!("status: {status}")
    }
}

fn render_recognition_tab(
    frame: &mut ratatui::Frame<'_>,
    body: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(10)])
        .split(body);

    let editing = state.mode == AppMode::Form;
    let page = Paragraph::new(render_recognition_text(view_data, editing))
        .block(Block::default().title("start recognition").borders(Borders::ALL));
    frame.render_widget(page, layout[0]);

    let log = Paragraph::new(view_data.recognition.log.text())
        .block(Block::default().title("progress").borders(Borders::ALL));
    frame.render_widget(log, layout[1]);

    if let Some(draft) = &view_data.entry_draft {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let title = format!("add to {}", draft.kind.title());
        let popup = Paragraph::new(render_entry_draft_text(draft))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(popup, area);
    }
}

fn choice_lines<R: ChoiceRecord>(
    list: &ChoiceList<R>,
    kind: ChoiceKind,
    focus: Option<RecognitionItem>,
    lines: &mut Vec<String>,
) {
    let header_marker = if focus == Some(RecognitionItem::ListHeader(kind)) {
        ">"
    } else {
        " "
    };
    lines.push(format!("{header_marker} {}", kind.title()));
    if list.is_empty() {
        lines.push("    (none; press a to add)".to_owned());
    }
    for (index, entry) in list.entries().iter().enumerate() {
        let marker = if focus == Some(RecognitionItem::Entry(kind, index)) {
            ">"
        } else {
            " "
        };
        let check = if list.checked() == Some(index) {
            "[x]"
        } else {
            "[ ]"
        };
        lines.push(format!(
            "{marker}   {check} {}  {}",
            entry.name(),
            entry.detail()
        ));
    }
}

fn render_recognition_text(view_data: &ViewData, editing: bool) -> String {
    let page = &view_data.recognition;
    let focus = focused_item(view_data);
    let mut lines = Vec::new();
    choice_lines(&page.classes, ChoiceKind::Classes, focus, &mut lines);
    choice_lines(
        &page.instruction_prompts,
        ChoiceKind::InstructionPrompts,
        focus,
        &mut lines,
    );
    choice_lines(
        &page.summary_prompts,
        ChoiceKind::SummaryPrompts,
        focus,
        &mut lines,
    );

    let marker = |item: RecognitionItem| if focus == Some(item) { ">" } else { " " };
    let model = page.model().unwrap_or("(no saved profiles)");
    lines.push(format!("{} model         < {model} >", marker(RecognitionItem::Model)));

    let cursor = |target: TextTarget| {
        if editing && view_data.text_target == Some(target) {
            "_"
        } else {
            ""
        }
    };
    lines.push(format!(
        "{} window hours  {}{}",
        marker(RecognitionItem::WindowHours),
        page.window_hours(),
        cursor(TextTarget::WindowHours)
    ));
    lines.push(format!(
        "{} folder path   {}{}",
        marker(RecognitionItem::FolderPath),
        page.folder_path,
        cursor(TextTarget::FolderPath)
    ));
    lines.join("\n")
}

fn render_entry_draft_text(draft: &EntryDraft) -> String {
    let (name_marker, detail_marker) = if draft.on_detail {
        (" ", ">")
    } else {
        (">", " ")
    };
    format!(
        "{name_marker} name         {}\n{detail_marker} {:<12} {}\n\nenter next/save, esc cancel",
        draft.name,
        draft.kind.detail_label(),
        draft.detail
    )
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match (state.mode, state.active_tab) {
        (AppMode::Find, _) => format!("find: {}", view_data.find_query),
        (AppMode::Form, TabKind::Recognition) => "type to edit, enter done, esc cancel".to_owned(),
        (AppMode::Form, _) => {
            "type to edit, ↑/↓ field, ctrl-t verify, ctrl-s save, esc done".to_owned()
        }
        (AppMode::Nav, TabKind::Recognition) => {
            "space check, a add, d delete, ←/→ model, enter edit, s start, c clear log".to_owned()
        }
        (AppMode::Nav, _) => {
            "enter form, e edit, t verify, s save, d delete, space check, / find, ? help"
                .to_owned()
        }
    }
}

fn help_overlay_text() -> &'static str {
    "tab / shift-tab   switch tabs\n\
     ↑ / ↓             move cursor (shift extends selection)\n\
     space             toggle row checkbox\n\
     ← / →             scroll columns\n\
     /                 find row\n\
     enter             focus form\n\
     e                 edit selected profile\n\
     t / ctrl-t        verify form\n\
     s / ctrl-s        save profile or submit token\n\
     d                 delete checked and selected rows\n\
     esc               leave form\n\
     ctrl-q            quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
