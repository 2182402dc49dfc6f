use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use tracing::warn;

use crate::app::{App, Cancellation, ProgressEvent, ProgressSink, RunOutcome};
use crate::domain::StructureList;
use crate::error::MolgenError;
use crate::filters::{Bound, FilterConfig, FilterProperty};
use crate::record::{MoleculeRecord, SortKey, sort_records};
use crate::service::GenerationService;
use crate::state::{IngestionState, MoleculeStore, StoreEvent};
use crate::viewer::{
    ColorScheme, DisplayStyle, Representation, SummaryViewer, ViewerSession,
};

const EVENTS_MAX: usize = 6;
const SPINNER: &[&str] = &["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Input,
    Configuration,
    Results,
}

impl View {
    fn label(self) -> &'static str {
        match self {
            View::Landing => "Home",
            View::Input => "Input",
            View::Configuration => "Configuration",
            View::Results => "Results",
        }
    }

    fn next(self) -> Self {
        match self {
            View::Landing => View::Input,
            View::Input => View::Configuration,
            View::Configuration => View::Results,
            View::Results => View::Landing,
        }
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    events: VecDeque<String>,
    latency_ms: Option<u128>,
}

struct TuiProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some(latency) = parse_latency(&message) {
                state.latency_ms = Some(latency);
            }
            if message.contains("accepted=") {
                return;
            }
            state.events.push_back(message);
            while state.events.len() > EVENTS_MAX {
                state.events.pop_front();
            }
        }
    }
}

type Worker = (
    JoinHandle<()>,
    Receiver<Result<RunOutcome, MolgenError>>,
    Cancellation,
);

#[derive(Debug)]
pub struct SessionResult {
    pub outcome: Option<RunOutcome>,
    pub last_error: Option<String>,
    pub structures: StructureList,
    pub filters: FilterConfig,
}

/// Restores the terminal when dropped, including on error paths.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> miette::Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

pub struct Tui {
    store: MoleculeStore,
    store_events: Receiver<StoreEvent>,
    structures: StructureList,
    session: ViewerSession<SummaryViewer>,
    filters: FilterConfig,
    view: View,
    progress: Arc<Mutex<ProgressState>>,
    structure_cursor: usize,
    filter_cursor: usize,
    results: TableState,
    sort_key: SortKey,
    descending: bool,
    notice: Option<String>,
    started: Option<Instant>,
    outcome: Option<RunOutcome>,
    last_error: Option<String>,
}

impl Tui {
    pub fn new(
        store: MoleculeStore,
        structures: StructureList,
        filters: FilterConfig,
        style: DisplayStyle,
    ) -> Self {
        let mut session = ViewerSession::new(SummaryViewer, style);
        let mut notice = None;
        let mut kept = StructureList::new();
        for structure in structures.iter() {
            match session.show(structure) {
                Ok(()) => kept.push(structure.clone()),
                Err(err) => notice = Some(err.to_string()),
            }
        }
        Self {
            store_events: store.subscribe(),
            store,
            structures: kept,
            session,
            filters,
            view: View::Landing,
            progress: Arc::new(Mutex::new(ProgressState::default())),
            structure_cursor: 0,
            filter_cursor: 0,
            results: TableState::default(),
            sort_key: SortKey::Arrival,
            descending: false,
            notice,
            started: None,
            outcome: None,
            last_error: None,
        }
    }

    pub fn with_sort(mut self, key: SortKey, descending: bool) -> Self {
        self.sort_key = key;
        self.descending = descending;
        self
    }

    /// Runs the interactive session until the user quits. With `autostart`
    /// a generation is launched immediately and the results view is shown.
    pub fn run<S>(mut self, app: Arc<App<S>>, autostart: bool) -> miette::Result<SessionResult>
    where
        S: GenerationService + 'static,
    {
        let mut guard = TerminalGuard::enter()?;
        let mut worker: Option<Worker> = None;
        if autostart {
            worker = Some(self.spawn(&app));
        }

        let mut snapshot = self.store.snapshot();
        let mut tick = 0usize;
        loop {
            let finished = worker.as_ref().and_then(|(_, rx, _)| rx.try_recv().ok());
            if let Some(result) = finished {
                if let Some((handle, _, _)) = worker.take() {
                    handle.join().ok();
                }
                self.finish(result);
            }

            if drain_store_events(&self.store_events) {
                snapshot = self.store.snapshot();
            }
            guard
                .terminal
                .draw(|frame| self.draw(frame, &snapshot, tick))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    match self.handle_key(key, worker.is_some()) {
                        Action::None => {}
                        Action::Generate => {
                            if worker.is_none() {
                                worker = Some(self.spawn(&app));
                            }
                        }
                        Action::Quit => {
                            match &worker {
                                Some((_, _, cancel)) if !cancel.is_cancelled() => {
                                    cancel.cancel();
                                    self.notice = Some(
                                        "cancelling... press q again to leave now".to_string(),
                                    );
                                }
                                _ => break,
                            }
                        }
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        drop(guard);
        release_worker(worker);
        Ok(SessionResult {
            outcome: self.outcome.take(),
            last_error: self.last_error.take(),
            structures: self.structures.clone(),
            filters: self.filters.clone(),
        })
    }

    fn spawn<S>(&mut self, app: &Arc<App<S>>) -> Worker
    where
        S: GenerationService + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = Cancellation::new();
        let sink = TuiProgress {
            state: self.progress.clone(),
        };
        let app = Arc::clone(app);
        let structures = self.structures.as_slice().to_vec();
        let filters = self.filters.clone();
        let worker_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let result = app.run(&structures, &filters, &worker_cancel, &sink);
            let _ = tx.send(result);
        });
        self.view = View::Results;
        self.results.select(None);
        self.started = Some(Instant::now());
        self.notice = None;
        (handle, rx, cancel)
    }

    fn finish(&mut self, result: Result<RunOutcome, MolgenError>) {
        match result {
            Ok(outcome) => {
                self.notice = Some(format!(
                    "done: {} molecule(s), {} duplicate(s), {} malformed",
                    outcome.accepted, outcome.duplicates, outcome.malformed
                ));
                self.outcome = Some(outcome);
                self.last_error = None;
            }
            Err(err) => {
                self.notice = None;
                self.last_error = Some(err.to_string());
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent, running: bool) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Tab => {
                self.view = self.view.next();
                return Action::None;
            }
            KeyCode::Char('1') => self.view = View::Landing,
            KeyCode::Char('2') => self.view = View::Input,
            KeyCode::Char('3') => self.view = View::Configuration,
            KeyCode::Char('4') => self.view = View::Results,
            KeyCode::Char('g') if !running => return Action::Generate,
            _ => {}
        }

        match self.view {
            View::Landing => {
                if matches!(key.code, KeyCode::Enter) {
                    self.view = View::Input;
                }
            }
            View::Input => self.handle_input_key(key),
            View::Configuration => self.handle_config_key(key),
            View::Results => self.handle_results_key(key),
        }
        Action::None
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.structure_cursor = self.structure_cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.structure_cursor + 1 < self.structures.len() {
                    self.structure_cursor += 1;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(removed) = self.structures.remove(self.structure_cursor) {
                    self.session.remove(self.structure_cursor);
                    self.notice = Some(format!("removed {}", removed.name));
                    if self.structure_cursor >= self.structures.len() {
                        self.structure_cursor = self.structures.len().saturating_sub(1);
                    }
                }
            }
            KeyCode::Char('w') => self.session.toggle_water(),
            KeyCode::Char('i') => self.session.toggle_ions(),
            KeyCode::Char('r') => {
                let mut style = self.session.style();
                style.representation = next_representation(style.representation);
                self.session.restyle(style);
            }
            KeyCode::Char('c') => {
                let mut style = self.session.style();
                style.color_scheme = next_color_scheme(style.color_scheme);
                self.session.restyle(style);
            }
            _ => {}
        }
    }

    fn handle_config_key(&mut self, key: KeyEvent) {
        let property = FilterProperty::ALL[self.filter_cursor];
        let interval = self.filters.interval(property);
        let step = filter_step(property);
        let edit = match key.code {
            KeyCode::Up => {
                self.filter_cursor = self.filter_cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.filter_cursor + 1 < FilterProperty::ALL.len() {
                    self.filter_cursor += 1;
                }
                None
            }
            KeyCode::Char('[') => Some((Bound::Min, interval.min() - step)),
            KeyCode::Char(']') => Some((Bound::Min, interval.min() + step)),
            KeyCode::Char('-') => Some((Bound::Max, interval.max() - step)),
            KeyCode::Char('+') | KeyCode::Char('=') => Some((Bound::Max, interval.max() + step)),
            KeyCode::Char('n') => {
                let lowered = self.filters.num_molecules().saturating_sub(1);
                if let Err(err) = self.filters.set_num_molecules(lowered) {
                    self.notice = Some(err.to_string());
                }
                None
            }
            KeyCode::Char('N') => {
                let raised = self.filters.num_molecules().saturating_add(1);
                if let Err(err) = self.filters.set_num_molecules(raised) {
                    self.notice = Some(err.to_string());
                }
                None
            }
            _ => None,
        };
        if let Some((bound, value)) = edit {
            let value = clamp_to_range(property, value);
            if let Err(err) = self.filters.set_bound(property, bound, value) {
                self.notice = Some(err.to_string());
            }
        }
    }

    fn handle_results_key(&mut self, key: KeyEvent) {
        let len = self.store.len();
        match key.code {
            KeyCode::Up => {
                let index = self.results.selected().unwrap_or(0).saturating_sub(1);
                self.results.select(Some(index));
            }
            KeyCode::Down => {
                if len > 0 {
                    let index = self
                        .results
                        .selected()
                        .map(|index| (index + 1).min(len - 1))
                        .unwrap_or(0);
                    self.results.select(Some(index));
                }
            }
            KeyCode::Char('s') => self.sort_key = self.sort_key.next(),
            KeyCode::Char('o') => self.descending = !self.descending,
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame, snapshot: &IngestionState, tick: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(frame.area());

        frame.render_widget(self.draw_header(snapshot, tick), chunks[0]);
        match self.view {
            View::Landing => frame.render_widget(draw_landing(), chunks[1]),
            View::Input => frame.render_widget(self.draw_input(), chunks[1]),
            View::Configuration => {
                let mut state = TableState::default();
                state.select(Some(self.filter_cursor));
                frame.render_stateful_widget(self.draw_filters(), chunks[1], &mut state);
            }
            View::Results => self.draw_results(frame, snapshot, chunks[1]),
        }
        frame.render_widget(self.draw_footer(), chunks[2]);
    }

    fn draw_header(&self, snapshot: &IngestionState, tick: usize) -> Paragraph<'static> {
        let (status, color) = if snapshot.loading {
            (
                format!("{} generating", SPINNER[tick % SPINNER.len()]),
                Color::Cyan,
            )
        } else if let Some(error) = &snapshot.error {
            (format!("error: {error}"), Color::Red)
        } else if self.outcome.is_some() {
            ("complete".to_string(), Color::Green)
        } else {
            ("idle".to_string(), Color::Yellow)
        };
        let elapsed = self
            .started
            .map(|started| format!("{:.1}s", started.elapsed().as_secs_f64()))
            .unwrap_or_else(|| "--".to_string());
        let latency = self
            .progress
            .lock()
            .ok()
            .and_then(|state| state.latency_ms)
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "--".to_string());

        let title = Line::from(vec![
            Span::styled(
                "MOLGEN",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
            Span::raw("   View: "),
            Span::styled(self.view.label(), Style::default().fg(Color::Cyan)),
            Span::raw("   Status: "),
            Span::styled(status, Style::default().fg(color)),
        ]);
        let stats = Line::from(Span::styled(
            format!(
                "Structures: {} · Molecules: {} · Elapsed: {elapsed} · First byte: {latency}",
                self.structures.len(),
                snapshot.records.len()
            ),
            Style::default().fg(Color::Gray),
        ));
        Paragraph::new(vec![title, stats])
            .alignment(Alignment::Left)
            .block(Block::default().borders(Borders::BOTTOM))
    }

    fn draw_input(&self) -> Paragraph<'static> {
        let style = self.session.style();
        let mut lines = vec![
            Line::from(Span::styled(
                "UPLOADED STRUCTURES",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!(
                    "Style: {}   Color: {}   Water: {}   Ions: {}",
                    style.representation,
                    style.color_scheme,
                    on_off(style.show_water),
                    on_off(style.show_ions)
                ),
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
        ];
        if self.structures.is_empty() {
            lines.push(Line::from(
                "No structures loaded. Pass .pdb/.pdbqt paths to `molgen generate`.",
            ));
        }
        for (index, (structure, handle)) in self
            .structures
            .iter()
            .zip(self.session.handles())
            .enumerate()
        {
            let marker = if index == self.structure_cursor { ">" } else { " " };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{marker} {} ({})", structure.name, structure.format),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("  {}", handle.describe()),
                    Style::default().fg(Color::Gray),
                ),
            ]));
        }
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::NONE))
            .wrap(Wrap { trim: true })
    }

    fn draw_filters(&self) -> Table<'static> {
        let rows = FilterProperty::ALL.into_iter().map(|property| {
            let interval = self.filters.interval(property);
            let range = property.range();
            let group = if property.is_ro5() { "RO5" } else { "" };
            Row::new(vec![
                Cell::from(group),
                Cell::from(property.label()),
                Cell::from(format!("{}", interval.min())),
                Cell::from(format!("{}", interval.max())),
                Cell::from(format!("[{}, {}]", range.min(), range.max())),
            ])
        });
        Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(30),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(14),
            ],
        )
        .header(
            Row::new(vec!["", "Property", "Min", "Max", "Range"])
                .style(Style::default().fg(Color::Cyan)),
        )
        .block(
            Block::default()
                .borders(Borders::NONE)
                .title(format!("Molecules requested: {}", self.filters.num_molecules())),
        )
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    }

    fn draw_results(&mut self, frame: &mut ratatui::Frame, snapshot: &IngestionState, area: Rect) {
        let mut records = snapshot.records.clone();
        sort_records(&mut records, self.sort_key, self.descending);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        if records.is_empty() {
            let message = if snapshot.loading {
                "Waiting for molecules...".to_string()
            } else if let Some(error) = &self.last_error {
                format!("Error: {error}")
            } else {
                "No molecules yet. Press g to generate.".to_string()
            };
            frame.render_widget(Paragraph::new(message).wrap(Wrap { trim: true }), main[0]);
        } else {
            let rows = records.iter().map(|record| {
                Row::new(vec![
                    Cell::from(record.molecule_id.to_string()),
                    Cell::from(record.smiles.clone()),
                    Cell::from(format!("{}", record.num_atoms)),
                    Cell::from(
                        record
                            .docking_score
                            .map(|score| format!("{score:.2}"))
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ])
            });
            let table = Table::new(
                rows,
                [
                    Constraint::Length(6),
                    Constraint::Min(20),
                    Constraint::Length(10),
                    Constraint::Length(14),
                ],
            )
            .header(
                Row::new(vec!["#", "SMILES", "Num Atoms", "Docking Score"])
                    .style(Style::default().fg(Color::Cyan)),
            )
            .block(Block::default().borders(Borders::RIGHT).title(format!(
                "Sort: {} {}",
                self.sort_key.label(),
                if self.descending { "desc" } else { "asc" }
            )))
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            frame.render_stateful_widget(table, main[0], &mut self.results);
        }

        let selected = self
            .results
            .selected()
            .and_then(|index| records.get(index));
        frame.render_widget(self.draw_details(selected), main[1]);
    }

    fn draw_details(&self, record: Option<&MoleculeRecord>) -> Paragraph<'static> {
        let mut lines = vec![Line::from(Span::styled(
            "DETAILS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))];
        match record {
            Some(record) => {
                lines.push(Line::from(record.smiles.clone()));
                lines.push(Line::from(format!(
                    "Docked structure: {}",
                    record.docked_pdb_path.as_deref().unwrap_or("unknown")
                )));
                for (name, value) in record.ordered_descriptors() {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{name}: "), Style::default().fg(Color::Gray)),
                        Span::raw(format!("{value}")),
                    ]));
                }
            }
            None => lines.push(Line::from("Select a molecule with Up/Down.")),
        }
        lines.push(Line::from(""));
        if let Ok(progress) = self.progress.lock() {
            for event in progress.events.iter().rev().take(3) {
                lines.push(Line::from(Span::styled(
                    format!("- {event}"),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
        Paragraph::new(lines).wrap(Wrap { trim: true })
    }

    fn draw_footer(&self) -> Paragraph<'static> {
        let keys = match self.view {
            View::Landing => "Enter start · Tab switch view · q quit",
            View::Input => "Up/Down select · d delete · r style · c color · w water · i ions · g generate",
            View::Configuration => "Up/Down select · [ ] min · - + max · n N count · g generate",
            View::Results => "Up/Down select · s sort · o order · g generate · q cancel/quit",
        };
        let mut lines = vec![Line::from(Span::styled(keys, Style::default().fg(Color::Gray)))];
        if let Some(notice) = &self.notice {
            lines.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Yellow),
            )));
        }
        Paragraph::new(lines).block(Block::default().borders(Borders::TOP))
    }
}

enum Action {
    None,
    Generate,
    Quit,
}

fn draw_landing() -> Paragraph<'static> {
    let lines = vec![
        Line::from(Span::styled(
            "Structure-based molecule generation",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("1. Input: review uploaded protein structures (PDB/PDBQT)."),
        Line::from("2. Configuration: set property ranges and the number of molecules."),
        Line::from("3. Results: candidates appear here as the service streams them."),
        Line::from(""),
        Line::from("Press Enter to begin, or g to generate with the current settings."),
    ];
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

/// True when the store changed since the last call.
fn drain_store_events(events: &Receiver<StoreEvent>) -> bool {
    events.try_iter().count() > 0
}

/// Joins a worker that has already stopped. One still blocked on the
/// response body is cancelled and detached; its read is bounded by the
/// client timeout and it ends at the next record. Returns whether it was
/// joined.
fn release_worker(worker: Option<Worker>) -> bool {
    let Some((handle, _, cancel)) = worker else {
        return true;
    };
    cancel.cancel();
    if handle.is_finished() {
        handle.join().ok();
        true
    } else {
        warn!("generation still running at exit; leaving it to finish after cancel");
        false
    }
}

fn clamp_to_range(property: FilterProperty, value: f64) -> f64 {
    let range = property.range();
    value.clamp(range.min(), range.max())
}

fn filter_step(property: FilterProperty) -> f64 {
    match property {
        FilterProperty::MolecularWeight => 10.0,
        FilterProperty::Tpsa => 5.0,
        FilterProperty::LogP => 0.5,
        _ => 1.0,
    }
}

fn next_representation(current: Representation) -> Representation {
    match current {
        Representation::Cartoon => Representation::Surface,
        Representation::Surface => Representation::Spacefill,
        Representation::Spacefill => Representation::Licorice,
        Representation::Licorice => Representation::Line,
        Representation::Line => Representation::BallAndStick,
        Representation::BallAndStick => Representation::Cartoon,
    }
}

fn next_color_scheme(current: ColorScheme) -> ColorScheme {
    match current {
        ColorScheme::ChainIndex => ColorScheme::Element,
        ColorScheme::Element => ColorScheme::Rainbow,
        ColorScheme::Rainbow => ColorScheme::SecondaryStructure,
        ColorScheme::SecondaryStructure => ColorScheme::ChainIndex,
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn parse_latency(message: &str) -> Option<u128> {
    message
        .split("latency_ms=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u128>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_parsed_from_stream_event() {
        assert_eq!(parse_latency("phase=Stream; latency_ms=42"), Some(42));
        assert_eq!(parse_latency("phase=Request; uploading"), None);
    }

    #[test]
    fn view_cycle_visits_every_destination() {
        let mut view = View::Landing;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(view);
            view = view.next();
        }
        assert_eq!(view, View::Landing);
        assert_eq!(
            seen,
            vec![View::Landing, View::Input, View::Configuration, View::Results]
        );
    }

    #[test]
    fn bound_edits_stay_within_range() {
        let mut filters = FilterConfig::default();
        let hbd = FilterProperty::HBondDonors;
        for _ in 0..3 {
            let value = clamp_to_range(hbd, filters.interval(hbd).min() - filter_step(hbd));
            filters.set_bound(hbd, Bound::Min, value).unwrap();
        }
        assert_eq!(filters.interval(hbd).min(), 0.0);

        let mw = FilterProperty::MolecularWeight;
        assert_eq!(clamp_to_range(mw, 910.0), 900.0);
        assert_eq!(clamp_to_range(FilterProperty::LogP, -2.5), -2.0);
        assert!(
            filters
                .form_fields()
                .contains(&("hbd_min".to_string(), "0".to_string()))
        );
    }

    #[test]
    fn store_events_mark_snapshot_stale() {
        let store = MoleculeStore::new();
        let events = store.subscribe();
        assert!(!drain_store_events(&events));
        store.begin();
        store.complete();
        assert!(drain_store_events(&events));
        assert!(!drain_store_events(&events));
    }

    #[test]
    fn finished_worker_is_joined() {
        let (tx, rx) = mpsc::channel();
        let cancel = Cancellation::new();
        let handle = thread::spawn(|| {});
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(5));
        }
        drop(tx);
        assert!(release_worker(Some((handle, rx, cancel.clone()))));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn blocked_worker_is_cancelled_and_detached() {
        let (_tx, rx) = mpsc::channel();
        let (unblock_tx, unblock_rx) = mpsc::channel::<()>();
        let cancel = Cancellation::new();
        let handle = thread::spawn(move || {
            let _ = unblock_rx.recv();
        });
        assert!(!release_worker(Some((handle, rx, cancel.clone()))));
        assert!(cancel.is_cancelled());
        drop(unblock_tx);
    }

    #[test]
    fn representation_cycle_wraps() {
        let mut style = Representation::Cartoon;
        for _ in 0..6 {
            style = next_representation(style);
        }
        assert_eq!(style, Representation::Cartoon);
    }
}
