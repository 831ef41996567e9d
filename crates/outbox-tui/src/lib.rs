// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use outbox_app::{
    AppCommand, AppEvent, AppState, EmailFormInput, EntityKind, FieldKind, FormPayload, Lists,
    Mode, RecipientFormInput, RecipientId, StatusFormInput, StatusId, TaskFormInput, TaskId,
    WriteCommand, WriteDraft, format_timestamp,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::cmp::Ordering;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const SORT_MARK_ASCENDING: &str = " ↑";
const SORT_MARK_DESCENDING: &str = " ↓";
const PICKER_WINDOW: usize = 8;

/// Everything the front end needs from the backend. The terminal loop
/// stays synchronous; each call blocks until the server answers.
pub trait AppRuntime {
    fn load_lists(&mut self) -> Result<Lists>;
    fn load_record(&mut self, entity: EntityKind, id: i64) -> Result<FormPayload>;
    fn dispatch_write(&mut self, command: &WriteCommand) -> Result<()>;
    /// Drops any cached lists so the next load hits the server.
    fn invalidate(&mut self);
}

/// One column of an entity table. Tables, sorting, filtering, and
/// forms are all driven by these declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: &'static str,
    pub kind: FieldKind,
    pub sortable: bool,
    pub filterable: bool,
    pub required: bool,
}

const STATUS_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        label: "id",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
    ColumnSpec {
        label: "name",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        required: true,
    },
    ColumnSpec {
        label: "description",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        required: true,
    },
];

const TASK_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        label: "id",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
    ColumnSpec {
        label: "subject",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        required: true,
    },
    ColumnSpec {
        label: "body",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        required: true,
    },
    ColumnSpec {
        label: "created",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
];

const RECIPIENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        label: "id",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
    ColumnSpec {
        label: "address",
        kind: FieldKind::Text,
        sortable: true,
        filterable: true,
        required: true,
    },
];

const EMAIL_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        label: "id",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
    ColumnSpec {
        label: "send at",
        kind: FieldKind::ReadOnly,
        sortable: true,
        filterable: false,
        required: false,
    },
    ColumnSpec {
        label: "status",
        kind: FieldKind::ForeignOne(EntityKind::Statuses),
        sortable: true,
        filterable: true,
        required: false,
    },
    ColumnSpec {
        label: "task",
        kind: FieldKind::ForeignOne(EntityKind::Tasks),
        sortable: true,
        filterable: true,
        required: true,
    },
    ColumnSpec {
        label: "recipients",
        kind: FieldKind::ForeignMany(EntityKind::Recipients),
        sortable: false,
        filterable: true,
        required: true,
    },
];

pub const fn columns_for(entity: EntityKind) -> &'static [ColumnSpec] {
    match entity {
        EntityKind::Statuses => STATUS_COLUMNS,
        EntityKind::Tasks => TASK_COLUMNS,
        EntityKind::Recipients => RECIPIENT_COLUMNS,
        EntityKind::Emails => EMAIL_COLUMNS,
    }
}

/// A rendered table value. Comparison works on the underlying value,
/// not the rendered text, so timestamps sort chronologically and text
/// sorts case-insensitively. `Missing` always sorts last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCell {
    Integer(i64),
    Timestamp(i64),
    Text(String),
    Missing(&'static str),
}

impl TableCell {
    pub fn display(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Timestamp(millis) => format_timestamp(*millis),
            Self::Text(text) => text.clone(),
            Self::Missing(placeholder) => (*placeholder).to_owned(),
        }
    }

    fn numeric(&self) -> Option<i64> {
        match self {
            Self::Integer(value) | Self::Timestamp(value) => Some(*value),
            _ => None,
        }
    }
}

fn compare_cells(a: &TableCell, b: &TableCell) -> Ordering {
    match (a, b) {
        (TableCell::Missing(_), TableCell::Missing(_)) => Ordering::Equal,
        (TableCell::Missing(_), _) => Ordering::Greater,
        (_, TableCell::Missing(_)) => Ordering::Less,
        (TableCell::Text(x), TableCell::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => match (a.numeric(), b.numeric()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: i64,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableProjection {
    pub entity: EntityKind,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: usize,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    pub column: usize,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableUiState {
    pub selected_row: usize,
    pub selected_col: usize,
    pub sort: Option<SortSpec>,
    pub filter: Option<TableFilter>,
}

/// Sort cycles per column: off, ascending, descending, off again.
/// Sorting a different column starts that column ascending.
pub fn cycle_sort(table: &mut TableUiState, column: usize) {
    table.sort = match table.sort {
        Some(SortSpec {
            column: current,
            direction: SortDirection::Ascending,
        }) if current == column => Some(SortSpec {
            column,
            direction: SortDirection::Descending,
        }),
        Some(SortSpec {
            column: current, ..
        }) if current == column => None,
        _ => Some(SortSpec {
            column,
            direction: SortDirection::Ascending,
        }),
    };
}

fn build_rows(entity: EntityKind, lists: &Lists) -> Vec<TableRow> {
    match entity {
        EntityKind::Statuses => lists
            .statuses
            .iter()
            .map(|status| TableRow {
                id: status.id.get(),
                cells: vec![
                    TableCell::Integer(status.id.get()),
                    TableCell::Text(status.name.clone()),
                    TableCell::Text(status.description.clone()),
                ],
            })
            .collect(),
        EntityKind::Tasks => lists
            .tasks
            .iter()
            .map(|task| TableRow {
                id: task.id.get(),
                cells: vec![
                    TableCell::Integer(task.id.get()),
                    TableCell::Text(task.subject.clone()),
                    TableCell::Text(task.body.clone()),
                    TableCell::Timestamp(task.created_at),
                ],
            })
            .collect(),
        EntityKind::Recipients => lists
            .recipients
            .iter()
            .map(|recipient| TableRow {
                id: recipient.id.get(),
                cells: vec![
                    TableCell::Integer(recipient.id.get()),
                    TableCell::Text(recipient.address.clone()),
                ],
            })
            .collect(),
        EntityKind::Emails => lists
            .emails
            .iter()
            .map(|email| {
                let status = match &email.status {
                    Some(status) => TableCell::Text(status.name.clone()),
                    None => TableCell::Missing("not set"),
                };
                let recipients = if email.recipient_list.is_empty() {
                    TableCell::Missing("no recipients")
                } else {
                    TableCell::Text(email.recipient_summary())
                };
                TableRow {
                    id: email.id.get(),
                    cells: vec![
                        TableCell::Integer(email.id.get()),
                        TableCell::Timestamp(email.send_at),
                        status,
                        TableCell::Text(email.task.subject.clone()),
                        recipients,
                    ],
                }
            })
            .collect(),
    }
}

/// Applies the active filter and sort to the entity's rows. Unsorted
/// rows keep server order; ties under a sort break by id ascending.
pub fn projection_for(entity: EntityKind, lists: &Lists, table: &TableUiState) -> TableProjection {
    let mut rows = build_rows(entity, lists);

    if let Some(filter) = &table.filter {
        let needle = filter.query.to_lowercase();
        rows.retain(|row| {
            row.cells
                .get(filter.column)
                .is_some_and(|cell| cell.display().to_lowercase().contains(&needle))
        });
    }

    if let Some(sort) = table.sort {
        rows.sort_by(|a, b| {
            let left = a.cells.get(sort.column);
            let right = b.cells.get(sort.column);
            // Missing values stay last in both directions.
            let ordering = match (left, right) {
                (Some(TableCell::Missing(_)), Some(TableCell::Missing(_))) => Ordering::Equal,
                (Some(TableCell::Missing(_)), Some(_)) => Ordering::Greater,
                (Some(_), Some(TableCell::Missing(_))) => Ordering::Less,
                (Some(left), Some(right)) => {
                    let ordering = compare_cells(left, right);
                    match sort.direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    }
                }
                _ => Ordering::Equal,
            };
            ordering.then(a.id.cmp(&b.id))
        });
    }

    TableProjection { entity, rows }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Text(String),
    One(Option<i64>),
    Many(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormField {
    label: &'static str,
    kind: FieldKind,
    required: bool,
    value: FieldValue,
    option_cursor: usize,
}

/// An open create or edit modal. Fields mirror the editable columns of
/// the entity, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    entity: EntityKind,
    record_id: Option<i64>,
    fields: Vec<FormField>,
    cursor: usize,
}

impl FormUiState {
    fn from_payload(record_id: Option<i64>, payload: &FormPayload) -> Self {
        let entity = payload.kind();
        let values = match payload {
            FormPayload::Status(input) => vec![
                FieldValue::Text(input.name.clone()),
                FieldValue::Text(input.description.clone()),
            ],
            FormPayload::Task(input) => vec![
                FieldValue::Text(input.subject.clone()),
                FieldValue::Text(input.body.clone()),
            ],
            FormPayload::Recipient(input) => vec![FieldValue::Text(input.address.clone())],
            FormPayload::Email(input) => vec![
                FieldValue::One(input.status.map(|id| id.get())),
                FieldValue::One(input.task.map(|id| id.get())),
                FieldValue::Many(input.recipient_list.iter().map(|id| id.get()).collect()),
            ],
        };

        let fields = columns_for(entity)
            .iter()
            .filter(|spec| spec.kind != FieldKind::ReadOnly)
            .zip(values)
            .map(|(spec, value)| FormField {
                label: spec.label,
                kind: spec.kind,
                required: spec.required,
                value,
                option_cursor: 0,
            })
            .collect();

        Self {
            entity,
            record_id,
            fields,
            cursor: 0,
        }
    }

    fn blank(entity: EntityKind) -> Self {
        Self::from_payload(None, &FormPayload::blank_for(entity))
    }

    fn text(&self, index: usize) -> String {
        match self.fields.get(index).map(|field| &field.value) {
            Some(FieldValue::Text(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn one(&self, index: usize) -> Option<i64> {
        match self.fields.get(index).map(|field| &field.value) {
            Some(FieldValue::One(value)) => *value,
            _ => None,
        }
    }

    fn many(&self, index: usize) -> Vec<i64> {
        match self.fields.get(index).map(|field| &field.value) {
            Some(FieldValue::Many(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    fn to_payload(&self) -> FormPayload {
        match self.entity {
            EntityKind::Statuses => FormPayload::Status(StatusFormInput {
                name: self.text(0),
                description: self.text(1),
            }),
            EntityKind::Tasks => FormPayload::Task(TaskFormInput {
                subject: self.text(0),
                body: self.text(1),
            }),
            EntityKind::Recipients => FormPayload::Recipient(RecipientFormInput {
                address: self.text(0),
            }),
            EntityKind::Emails => FormPayload::Email(EmailFormInput {
                status: self.one(0).map(StatusId::new),
                task: self.one(1).map(TaskId::new),
                recipient_list: self.many(2).into_iter().map(RecipientId::new).collect(),
            }),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.fields.is_empty() {
            return;
        }
        let len = self.fields.len() as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterInputUiState {
    column: usize,
    buffer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    lists: Lists,
    table: TableUiState,
    table_entity: Option<EntityKind>,
    form: Option<FormUiState>,
    filter_input: Option<FilterInputUiState>,
    help_visible: bool,
    status_token: u64,
}

pub enum InternalEvent {
    ClearStatus { token: u64 },
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    if state.active_entity().is_none() {
        state.dispatch(AppCommand::SelectEntity(EntityKind::ALL[0]));
    }
    if let Err(error) = refresh_view_data(state, runtime, &mut view_data) {
        emit_status(
            state,
            &mut view_data,
            &internal_tx,
            format!("load failed: {error:#}"),
        );
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(EVENT_POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(tx: Sender<InternalEvent>, token: u64) {
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = tx.send(InternalEvent::ClearStatus { token });
    });
}

/// Shows a message in the status line and schedules its removal. A
/// later message bumps the token, which cancels the earlier removal.
fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    message: String,
) {
    view_data.status_token = view_data.status_token.wrapping_add(1);
    state.dispatch(AppCommand::SetStatus(message));
    schedule_status_clear(tx.clone(), view_data.status_token);
}

fn should_refresh_view(events: &[AppEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, AppEvent::ModeChanged(Mode::Listing(_))))
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
) -> Result<()> {
    let events = state.dispatch(command);
    if should_refresh_view(&events) {
        refresh_view_data(state, runtime, view_data)?;
    }
    Ok(())
}

/// Reloads the lists for the active entity and reconciles the table
/// cursor. Switching entities drops sort, filter, and selection.
fn refresh_view_data<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let Some(entity) = state.active_entity() else {
        return Ok(());
    };

    view_data.lists = runtime.load_lists()?;
    if view_data.table_entity != Some(entity) {
        view_data.table = TableUiState::default();
        view_data.table_entity = Some(entity);
    }

    let projection = projection_for(entity, &view_data.lists, &view_data.table);
    let last_row = projection.rows.len().saturating_sub(1);
    view_data.table.selected_row = view_data.table.selected_row.min(last_row);
    let last_col = columns_for(entity).len().saturating_sub(1);
    view_data.table.selected_col = view_data.table.selected_col.min(last_col);
    Ok(())
}

/// Routes one key press. Returns true when the app should exit.
fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q') {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    let outcome = if view_data.filter_input.is_some() {
        handle_filter_key(view_data, key);
        Ok(())
    } else if view_data.form.is_some() {
        handle_form_key(state, runtime, view_data, tx, key)
    } else {
        handle_table_key(state, runtime, view_data, tx, key)
    };

    if let Err(error) = outcome {
        emit_status(state, view_data, tx, format!("{error:#}"));
    }
    false
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<()> {
    let Some(entity) = state.active_entity() else {
        return Ok(());
    };
    let specs = columns_for(entity);

    match key.code {
        KeyCode::Char('f') | KeyCode::Tab => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextEntity)?;
        }
        KeyCode::Char('b') | KeyCode::BackTab => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevEntity)?;
        }
        KeyCode::Char('j') | KeyCode::Down => move_row(entity, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(entity, view_data, -1),
        KeyCode::Char('h') | KeyCode::Left => {
            view_data.table.selected_col = view_data.table.selected_col.saturating_sub(1);
        }
        KeyCode::Char('l') | KeyCode::Right => {
            let last = specs.len().saturating_sub(1);
            view_data.table.selected_col = (view_data.table.selected_col + 1).min(last);
        }
        KeyCode::Char('g') => view_data.table.selected_row = 0,
        KeyCode::Char('G') => {
            let projection = projection_for(entity, &view_data.lists, &view_data.table);
            view_data.table.selected_row = projection.rows.len().saturating_sub(1);
        }
        KeyCode::Char('s') => {
            let column = view_data.table.selected_col;
            if specs.get(column).is_some_and(|spec| spec.sortable) {
                cycle_sort(&mut view_data.table, column);
            } else if let Some(spec) = specs.get(column) {
                emit_status(state, view_data, tx, format!("{} is not sortable", spec.label));
            }
        }
        KeyCode::Char('/') => {
            let column = view_data.table.selected_col;
            if specs.get(column).is_some_and(|spec| spec.filterable) {
                let buffer = view_data
                    .table
                    .filter
                    .as_ref()
                    .filter(|filter| filter.column == column)
                    .map(|filter| filter.query.clone())
                    .unwrap_or_default();
                view_data.filter_input = Some(FilterInputUiState { column, buffer });
            } else if let Some(spec) = specs.get(column) {
                emit_status(
                    state,
                    view_data,
                    tx,
                    format!("{} is not filterable", spec.label),
                );
            }
        }
        KeyCode::Esc => {
            if view_data.table.filter.take().is_some() {
                view_data.table.selected_row = 0;
            }
        }
        KeyCode::Char('r') => {
            runtime.invalidate();
            refresh_view_data(state, runtime, view_data)?;
            emit_status(state, view_data, tx, "reloaded".to_owned());
        }
        KeyCode::Enter => open_editor(state, runtime, view_data, tx)?,
        KeyCode::Char('a') => {
            let events = state.dispatch(AppCommand::OpenCreator);
            if !events.is_empty() {
                view_data.form = Some(FormUiState::blank(entity));
            }
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    Ok(())
}

fn move_row(entity: EntityKind, view_data: &mut ViewData, delta: isize) {
    let projection = projection_for(entity, &view_data.lists, &view_data.table);
    if projection.rows.is_empty() {
        view_data.table.selected_row = 0;
        return;
    }
    let last = projection.rows.len() as isize - 1;
    let next = (view_data.table.selected_row as isize + delta).clamp(0, last);
    view_data.table.selected_row = next as usize;
}

fn open_editor<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let Some(entity) = state.active_entity() else {
        return Ok(());
    };
    let projection = projection_for(entity, &view_data.lists, &view_data.table);
    let Some(row) = projection.rows.get(view_data.table.selected_row) else {
        emit_status(state, view_data, tx, "nothing to edit".to_owned());
        return Ok(());
    };

    let payload = runtime
        .load_record(entity, row.id)
        .with_context(|| format!("load {} {}", entity.noun(), row.id))?;
    let events = state.dispatch(AppCommand::OpenEditor { record_id: row.id });
    if !events.is_empty() {
        view_data.form = Some(FormUiState::from_payload(Some(row.id), &payload));
    }
    Ok(())
}

fn handle_filter_key(view_data: &mut ViewData, key: KeyEvent) {
    let Some(input) = view_data.filter_input.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Esc => {
            view_data.filter_input = None;
        }
        KeyCode::Enter => {
            let input = input.clone();
            view_data.table.filter = if input.buffer.trim().is_empty() {
                None
            } else {
                Some(TableFilter {
                    column: input.column,
                    query: input.buffer,
                })
            };
            view_data.table.selected_row = 0;
            view_data.filter_input = None;
        }
        KeyCode::Backspace => {
            input.buffer.pop();
        }
        KeyCode::Char(character) => input.buffer.push(character),
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> Result<()> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('d') {
        return delete_current(state, runtime, view_data, tx);
    }

    match key.code {
        KeyCode::Esc => {
            view_data.form = None;
            dispatch_and_refresh(state, runtime, view_data, AppCommand::CloseModal)?;
        }
        KeyCode::Enter => submit_form(state, runtime, view_data, tx)?,
        KeyCode::Tab | KeyCode::Down => {
            if let Some(form) = view_data.form.as_mut() {
                form.move_cursor(1);
            }
        }
        KeyCode::BackTab | KeyCode::Up => {
            if let Some(form) = view_data.form.as_mut() {
                form.move_cursor(-1);
            }
        }
        _ => edit_field(view_data, key),
    }
    Ok(())
}

fn edit_field(view_data: &mut ViewData, key: KeyEvent) {
    let options = {
        let Some(form) = view_data.form.as_ref() else {
            return;
        };
        let Some(field) = form.fields.get(form.cursor) else {
            return;
        };
        match field.kind {
            FieldKind::ForeignOne(entity) | FieldKind::ForeignMany(entity) => {
                foreign_option_ids(&view_data.lists, entity)
            }
            _ => Vec::new(),
        }
    };

    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let Some(field) = form.fields.get_mut(form.cursor) else {
        return;
    };

    match &mut field.value {
        FieldValue::Text(buffer) => match key.code {
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(character) => buffer.push(character),
            _ => {}
        },
        FieldValue::One(current) => match key.code {
            KeyCode::Left => cycle_one(current, &options, !field.required, -1),
            KeyCode::Right => cycle_one(current, &options, !field.required, 1),
            _ => {}
        },
        FieldValue::Many(selected) => match key.code {
            KeyCode::Left => field.option_cursor = field.option_cursor.saturating_sub(1),
            KeyCode::Right => {
                let last = options.len().saturating_sub(1);
                field.option_cursor = (field.option_cursor + 1).min(last);
            }
            KeyCode::Char(' ') => {
                if let Some(id) = options.get(field.option_cursor) {
                    match selected.iter().position(|existing| existing == id) {
                        Some(position) => {
                            selected.remove(position);
                        }
                        None => selected.push(*id),
                    }
                }
            }
            _ => {}
        },
    }
}

/// Steps a single-reference selection through its options. Optional
/// references include an empty slot before the first option.
fn cycle_one(current: &mut Option<i64>, options: &[i64], optional: bool, delta: isize) {
    if options.is_empty() {
        if optional {
            *current = None;
        }
        return;
    }
    if !optional && current.is_none() {
        *current = Some(options[0]);
        return;
    }

    let extra = isize::from(optional);
    let len = options.len() as isize + extra;
    let position = match *current {
        None => 0,
        Some(id) => options
            .iter()
            .position(|option| *option == id)
            .map_or(0, |index| index as isize + extra),
    };
    let next = (position + delta).rem_euclid(len);
    *current = if optional && next == 0 {
        None
    } else {
        Some(options[(next - extra) as usize])
    };
}

fn foreign_option_ids(lists: &Lists, entity: EntityKind) -> Vec<i64> {
    match entity {
        EntityKind::Statuses => lists.statuses.iter().map(|status| status.id.get()).collect(),
        EntityKind::Tasks => lists.tasks.iter().map(|task| task.id.get()).collect(),
        EntityKind::Recipients => lists
            .recipients
            .iter()
            .map(|recipient| recipient.id.get())
            .collect(),
        EntityKind::Emails => lists.emails.iter().map(|email| email.id.get()).collect(),
    }
}

fn option_label(lists: &Lists, entity: EntityKind, id: i64) -> String {
    let detail = match entity {
        EntityKind::Statuses => lists.status_by_id(StatusId::new(id)).map(|status| {
            join_detail_parts(&[status.name.as_str(), status.description.as_str()])
        }),
        EntityKind::Tasks => lists.task_by_id(TaskId::new(id)).map(|task| {
            join_detail_parts(&[
                task.subject.as_str(),
                &format_timestamp(task.created_at),
                task.body.as_str(),
            ])
        }),
        EntityKind::Recipients => lists
            .recipient_by_id(RecipientId::new(id))
            .map(|recipient| recipient.address.clone()),
        EntityKind::Emails => None,
    };
    match detail {
        Some(detail) => format!("{id} {}", truncate_label(&detail, 56)),
        None => format!("{id} (missing)"),
    }
}

fn join_detail_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" | ")
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let Some(form) = view_data.form.as_ref() else {
        return Ok(());
    };
    let record_id = form.record_id;
    let payload = form.to_payload();

    if let Err(error) = payload.validate() {
        emit_status(state, view_data, tx, format!("{error:#}"));
        return Ok(());
    }

    let draft = match payload {
        FormPayload::Status(input) => WriteDraft::Status(input),
        FormPayload::Task(input) => WriteDraft::Task(input),
        FormPayload::Recipient(input) => WriteDraft::Recipient(input),
        FormPayload::Email(input) => match input.resolve(&view_data.lists) {
            Ok(resolved) => WriteDraft::Email(resolved),
            Err(error) => {
                emit_status(state, view_data, tx, format!("{error:#}"));
                return Ok(());
            }
        },
    };

    let command = match record_id {
        Some(id) => WriteCommand::Update { id, draft },
        None => WriteCommand::Create(draft),
    };

    match runtime.dispatch_write(&command) {
        Ok(()) => {
            view_data.form = None;
            emit_status(state, view_data, tx, command.describe());
            dispatch_and_refresh(state, runtime, view_data, AppCommand::FormSubmitted)?;
        }
        Err(error) => emit_status(state, view_data, tx, format!("{error:#}")),
    }
    Ok(())
}

fn delete_current<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) -> Result<()> {
    let Some(form) = view_data.form.as_ref() else {
        return Ok(());
    };
    let Some(id) = form.record_id else {
        emit_status(state, view_data, tx, "nothing to delete yet".to_owned());
        return Ok(());
    };

    let command = WriteCommand::Delete {
        entity: form.entity,
        id,
    };
    match runtime.dispatch_write(&command) {
        Ok(()) => {
            view_data.form = None;
            emit_status(state, view_data, tx, command.describe());
            dispatch_and_refresh(state, runtime, view_data, AppCommand::FormSubmitted)?;
        }
        Err(error) => emit_status(state, view_data, tx, format!("{error:#}")),
    }
    Ok(())
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = state
        .active_entity()
        .and_then(|active| EntityKind::ALL.iter().position(|entity| *entity == active))
        .unwrap_or(0);
    let titles = EntityKind::ALL
        .iter()
        .map(|entity| entity.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("outbox").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    render_table(frame, layout[1], state, view_data);

    let status_text = state
        .status_line
        .clone()
        .unwrap_or_else(|| key_hint_line(view_data).to_owned());
    let status_style = if state.status_line.is_some() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let status_widget = Paragraph::new(status_text).style(status_style);
    frame.render_widget(status_widget, layout[2]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(62, 64, frame.area());
        frame.render_widget(Clear, area);
        let title = match form.record_id {
            Some(id) => format!("edit {} #{id}", form.entity.noun()),
            None => format!("new {}", form.entity.noun()),
        };
        let widget = Paragraph::new(render_form_overlay_text(form, &view_data.lists))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if let Some(input) = &view_data.filter_input {
        let area = centered_rect(46, 22, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_filter_overlay_text(view_data, input))
            .block(Block::default().title("filter").borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(64, 66, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(widget, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let Some(entity) = state.active_entity() else {
        let empty = Paragraph::new(String::new())
            .block(Block::default().borders(Borders::ALL).title("outbox"));
        frame.render_widget(empty, area);
        return;
    };

    let specs = columns_for(entity);
    let projection = projection_for(entity, &view_data.lists, &view_data.table);
    let widths = vec![Constraint::Min(8); specs.len()];

    let header_cells = specs.iter().enumerate().map(|(column, spec)| {
        Cell::from(header_label(spec, &view_data.table, column)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells);

    let rows = projection.rows.iter().enumerate().map(|(row_index, row)| {
        let selected_row = row_index == view_data.table.selected_row;
        let cells = row
            .cells
            .iter()
            .enumerate()
            .map(|(column, cell)| {
                let mut style = Style::default();
                if selected_row {
                    style = style.bg(Color::DarkGray);
                }
                if selected_row && column == view_data.table.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(cell.display()).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(entity, &projection, &view_data.table))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn header_label(spec: &ColumnSpec, table: &TableUiState, column: usize) -> String {
    let mut label = spec.label.to_owned();
    if let Some(sort) = table.sort
        && sort.column == column
    {
        label.push_str(match sort.direction {
            SortDirection::Ascending => SORT_MARK_ASCENDING,
            SortDirection::Descending => SORT_MARK_DESCENDING,
        });
    }
    label
}

fn table_title(entity: EntityKind, projection: &TableProjection, table: &TableUiState) -> String {
    let specs = columns_for(entity);
    let mut parts = vec![
        entity.label().to_owned(),
        format!("{} rows", projection.rows.len()),
    ];
    if let Some(sort) = table.sort
        && let Some(spec) = specs.get(sort.column)
    {
        let mark = match sort.direction {
            SortDirection::Ascending => SORT_MARK_ASCENDING,
            SortDirection::Descending => SORT_MARK_DESCENDING,
        };
        parts.push(format!("sort: {}{mark}", spec.label));
    }
    if let Some(filter) = &table.filter
        && let Some(spec) = specs.get(filter.column)
    {
        parts.push(format!("filter: {} ~ {}", spec.label, filter.query));
    }
    parts.join(" | ")
}

fn render_form_overlay_text(form: &FormUiState, lists: &Lists) -> String {
    let mut lines = Vec::new();

    for (index, field) in form.fields.iter().enumerate() {
        let prefix = if index == form.cursor { "> " } else { "  " };
        let value = match &field.value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::One(None) => "(none)".to_owned(),
            FieldValue::One(Some(id)) => match field.kind {
                FieldKind::ForeignOne(entity) => option_label(lists, entity, *id),
                _ => id.to_string(),
            },
            FieldValue::Many(ids) => {
                if ids.is_empty() {
                    "(none)".to_owned()
                } else {
                    match field.kind {
                        FieldKind::ForeignMany(entity) => ids
                            .iter()
                            .map(|id| option_label(lists, entity, *id))
                            .collect::<Vec<_>>()
                            .join(", "),
                        _ => String::new(),
                    }
                }
            }
        };
        lines.push(format!("{prefix}{}: {value}", field.label));

        if index == form.cursor {
            match (field.kind, &field.value) {
                (FieldKind::ForeignOne(entity), FieldValue::One(current)) => {
                    lines.extend(one_picker_lines(lists, entity, *current, !field.required));
                }
                (FieldKind::ForeignMany(entity), FieldValue::Many(selected)) => {
                    lines.extend(many_picker_lines(
                        lists,
                        entity,
                        selected,
                        field.option_cursor,
                    ));
                }
                _ => {}
            }
        }
    }

    lines.push(String::new());
    let hint = match form.fields.get(form.cursor).map(|field| field.kind) {
        Some(FieldKind::ForeignOne(_)) => "left/right choose",
        Some(FieldKind::ForeignMany(_)) => "left/right move | space toggle",
        _ => "type to edit",
    };
    lines.push(hint.to_owned());
    let mut footer = "tab next field | enter save | esc cancel".to_owned();
    if form.record_id.is_some() {
        footer.push_str(" | ctrl+d delete");
    }
    lines.push(footer);
    lines.join("\n")
}

fn one_picker_lines(
    lists: &Lists,
    entity: EntityKind,
    current: Option<i64>,
    optional: bool,
) -> Vec<String> {
    let mut entries = Vec::new();
    if optional {
        entries.push((None, "(none)".to_owned()));
    }
    for id in foreign_option_ids(lists, entity) {
        entries.push((Some(id), option_label(lists, entity, id)));
    }

    let cursor = entries
        .iter()
        .position(|(id, _)| *id == current)
        .unwrap_or(0);
    picker_window(&entries, cursor)
        .map(|(index, (_, label))| {
            let marker = if index == cursor { "> " } else { "  " };
            format!("    {marker}{label}")
        })
        .collect()
}

fn many_picker_lines(
    lists: &Lists,
    entity: EntityKind,
    selected: &[i64],
    cursor: usize,
) -> Vec<String> {
    let entries = foreign_option_ids(lists, entity)
        .into_iter()
        .map(|id| (id, option_label(lists, entity, id)))
        .collect::<Vec<_>>();
    if entries.is_empty() {
        return vec!["    (no options)".to_owned()];
    }

    let cursor = cursor.min(entries.len() - 1);
    picker_window(&entries, cursor)
        .map(|(index, (id, label))| {
            let marker = if index == cursor { "> " } else { "  " };
            let checked = if selected.contains(id) { "[x]" } else { "[ ]" };
            format!("    {marker}{checked} {label}")
        })
        .collect()
}

fn picker_window<T>(entries: &[T], cursor: usize) -> impl Iterator<Item = (usize, &T)> {
    let start = cursor.saturating_sub(3);
    let end = (start + PICKER_WINDOW).min(entries.len());
    entries.iter().enumerate().take(end).skip(start)
}

fn render_filter_overlay_text(view_data: &ViewData, input: &FilterInputUiState) -> String {
    let column = view_data
        .table_entity
        .map(columns_for)
        .and_then(|specs| specs.get(input.column))
        .map_or("column", |spec| spec.label);
    [
        format!("{column} contains: {}", input.buffer),
        String::new(),
        "enter apply | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn key_hint_line(view_data: &ViewData) -> &'static str {
    if view_data.form.is_some() {
        "tab next field | enter save | esc cancel"
    } else {
        "f/b tabs | j/k rows | enter edit | a new | s sort | / filter | ? help | ctrl+q quit"
    }
}

fn help_overlay_text() -> String {
    [
        "f, tab        next tab",
        "b, shift-tab  previous tab",
        "j/k, arrows   move row",
        "h/l           move column",
        "g / G         first / last row",
        "enter         edit selected row",
        "a             create a record",
        "s             cycle sort on the selected column",
        "/             filter on the selected column",
        "esc           clear filter / close modal",
        "r             reload from the server",
        "ctrl+d        delete (inside the editor)",
        "ctrl+q        quit",
        "",
        "press any key to close",
    ]
    .join("\n")
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let kept = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    format!("{kept}…")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
