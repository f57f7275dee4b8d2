use crate::app::{update, AppMsg, Effect};
use crate::model::{validate_app_config, AppConfig};
use crate::nav::keys::{nav_input, NavInput};
use crate::nav::router::{PageRouter, HELP_PAGE};
use crate::services::dispatch::{Subscription, UpdateBus, UpdateKind};
use crate::services::inventory::{CliInventoryClient, InventoryClient};
use crate::services::poller::{spawn_poller, Diagnostic, PollerHandle};
use crate::widgets::detail::RecordViewerWidget;
use crate::widgets::grid::{FocusGrid, GridPos, GridSpan};
use crate::widgets::instances::InstancesWidget;
use crate::widgets::radio::RadioButtons;
use crate::widgets::status_bar::{draw_status, StatusBar};
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const PAGE_INSTANCES: &str = "instances";
pub(crate) const PAGE_DETAIL: &str = "detail";
// member order inside the instances grid
const INSTANCES_MEMBER: usize = 0;

const INSTANCES_HELP: &str = "Fleet dashboard

  Tab / Shift-Tab   cycle focus between panels
  Up/Down or j/k    move selection
  Enter             open instance detail
  i                 jump back to the instances page
  Esc / Backspace   go back one page
  q                 quit

The table refreshes automatically from the background inventory poller;
the State panel filters rows by instance state.";

pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) router: PageRouter,
    pub(crate) status: StatusBar,
    pub(crate) theme: crate::theme::Theme,
    pub(crate) tick: u64,
    pub(crate) debug_log: VecDeque<String>,
    bus: Arc<UpdateBus>,
    subs: Vec<Subscription>,
    diag_tx: Option<Sender<Diagnostic>>,
    diag_rx: Option<Receiver<Diagnostic>>,
    pollers: Vec<PollerHandle>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig) -> Self {
        let bus = Arc::new(UpdateBus::new());
        let subs = vec![
            bus.subscribe(UpdateKind::Instances),
            bus.subscribe(UpdateKind::Health),
        ];
        let (diag_tx, diag_rx) = mpsc::channel();

        let mut grid = FocusGrid::new(1, 4).with_help(INSTANCES_HELP);
        grid.add_member(
            Box::new(InstancesWidget::new()),
            GridPos { row: 0, col: 0 },
            GridSpan { rows: 1, cols: 3 },
            true,
        );
        grid.add_member(
            Box::new(RadioButtons::new("State", ["all", "running", "stopped"])),
            GridPos { row: 0, col: 3 },
            GridSpan::single(),
            false,
        );

        let mut router = PageRouter::new();
        router.register(PAGE_INSTANCES, Box::new(grid), true);
        // the page was registered one line up
        let _ = router.switch_to(PAGE_INSTANCES);

        let status = StatusBar::new(config.status_ttl_secs);
        Self {
            config,
            router,
            status,
            theme: crate::theme::Theme::default(),
            tick: 0,
            debug_log: VecDeque::new(),
            bus,
            subs,
            diag_tx: Some(diag_tx),
            diag_rx: Some(diag_rx),
            pollers: Vec::new(),
        }
    }

    pub(crate) fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    pub(crate) fn show_status(&mut self, text: impl Into<String>) {
        let tick = self.tick;
        self.status.set_text(text, tick);
    }

    fn with_instances<R>(&mut self, f: impl FnOnce(&mut InstancesWidget) -> R) -> Option<R> {
        let page = self.router.widget_mut(PAGE_INSTANCES)?;
        let grid = page.as_any_mut().downcast_mut::<FocusGrid>()?;
        let member = grid.member_mut(INSTANCES_MEMBER)?;
        let table = member.as_any_mut().downcast_mut::<InstancesWidget>()?;
        Some(f(table))
    }

    pub(crate) fn apply_update(
        &mut self,
        payload: crate::services::dispatch::UpdatePayload,
    ) -> usize {
        self.with_instances(|w| w.apply_update(payload)).unwrap_or(0)
    }

    pub(crate) fn set_state_filter(&mut self, filter: Option<String>) {
        self.with_instances(|w| w.set_state_filter(filter));
    }

    pub(crate) fn instances_count(&mut self) -> usize {
        self.with_instances(|w| w.visible_count()).unwrap_or(0)
    }

    fn front_help_text(&mut self) -> String {
        self.router
            .front_widget_mut()
            .and_then(|w| w.as_any().downcast_ref::<FocusGrid>())
            .map(|g| g.help_text().to_string())
            .unwrap_or_else(|| "Esc to go back, q to quit.".to_string())
    }

    fn start_pollers(&mut self) {
        let Some(diag_tx) = self.diag_tx.clone() else {
            return;
        };
        let client: Arc<dyn InventoryClient> =
            Arc::new(CliInventoryClient::from_config(&self.config));
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        self.pollers.push(spawn_poller(
            UpdateKind::Instances,
            Arc::clone(&client),
            Arc::clone(&self.bus),
            diag_tx.clone(),
            interval,
        ));
        if self.config.health_cmd.is_some() {
            self.pollers.push(spawn_poller(
                UpdateKind::Health,
                client,
                Arc::clone(&self.bus),
                diag_tx,
                interval,
            ));
        }
    }

    fn shutdown_pollers(&mut self) {
        for handle in self.pollers.drain(..) {
            handle.join();
        }
    }
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::ShowStatus { text } => state.show_status(text),
            Effect::OpenDetail { record } => {
                state.dbg(format!("open detail {}", record.id));
                let viewer = RecordViewerWidget::new(&record);
                state
                    .router
                    .register_and_switch(PAGE_DETAIL, Box::new(viewer));
            }
            Effect::OptionSelected { label } => {
                state.dbg(format!("filter: {label}"));
                let filter = if label == "all" { None } else { Some(label) };
                state.set_state_filter(filter);
            }
            Effect::SwitchPage { name } => {
                if let Err(e) = state.router.switch_to(&name) {
                    // misuse is a recoverable UI message, never a crash
                    state.dbg(format!("nav: {e}"));
                    state.show_status(format!("navigation: {e}"));
                }
            }
            Effect::NavBack => {
                state.router.back();
            }
            Effect::ShowHelp => {
                let text = state.front_help_text();
                state.router.show_help(&text);
            }
        }
    }
}

/// Drains pending bus updates and poller diagnostics into the reducer.
/// Called from the UI loop; never blocks.
fn pump_messages(state: &mut AppState) {
    let mut msgs = Vec::new();
    for sub in &state.subs {
        while let Some(msg) = sub.try_recv() {
            msgs.push(msg);
        }
    }
    for msg in msgs {
        let effects = update(state, AppMsg::UpdateArrived(msg));
        run_effects(state, effects);
    }

    let mut diags = Vec::new();
    if let Some(rx) = &state.diag_rx {
        while let Ok(d) = rx.try_recv() {
            diags.push(d);
        }
    }
    for d in diags {
        let effects = update(state, AppMsg::PollerDiag(d));
        run_effects(state, effects);
    }
}

/// Returns true when the app should quit.
fn handle_key(state: &mut AppState, code: KeyCode) -> bool {
    match code {
        KeyCode::Char('q') => {
            if state.router.current_page_name() == Some(HELP_PAGE) {
                state.router.back();
                return false;
            }
            if state.config.can_close {
                return true;
            }
            false
        }
        KeyCode::Char('i') => {
            if state.router.current_page_name() != Some(PAGE_INSTANCES) {
                run_effects(
                    state,
                    vec![Effect::SwitchPage {
                        name: PAGE_INSTANCES.to_string(),
                    }],
                );
            }
            false
        }
        code => {
            match nav_input(code) {
                Some(NavInput::Help) => run_effects(state, vec![Effect::ShowHelp]),
                Some(NavInput::Dismiss) => {
                    if !state.router.back() {
                        state.dbg("back: already at the root page");
                    }
                }
                _ => {
                    let effects = state
                        .router
                        .front_widget_mut()
                        .map(|w| w.on_key(code))
                        .unwrap_or_default();
                    run_effects(state, effects);
                }
            }
            false
        }
    }
}

fn draw(f: &mut Frame, state: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let header = state.config.header.clone().unwrap_or_default();
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {header}"),
            state.theme.text_accent_bold(),
        ))),
        chunks[0],
    );

    let tick = state.tick;
    if let Some(w) = state.router.front_widget_mut() {
        w.render(f, chunks[1], true, tick);
    }

    draw_status(f, chunks[2], state);
}

pub fn run() -> Result<()> {
    let config = load_config()?;
    let mut state = AppState::new(config);
    state.start_pollers();

    let headless = std::env::var("FLEET_TUI_HEADLESS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    if headless {
        let ticks: u64 = std::env::var("FLEET_TUI_TICKS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);
        return run_headless(state, ticks);
    }
    run_terminal(state)
}

fn run_terminal(mut state: AppState) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if let Err(e) = terminal.draw(|f| draw(f, &mut state)) {
            break Err(e.into());
        }
        pump_messages(&mut state);
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if handle_key(&mut state, key.code) {
                        break Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            let tick = state.tick;
            state.status.on_tick(tick);
            last_tick = Instant::now();
        }
    };

    state.shutdown_pollers();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

// CI smoke mode: render against a test backend for a fixed number of
// ticks, then print a JSON summary.
fn run_headless(mut state: AppState, ticks: u64) -> Result<()> {
    let backend = ratatui::backend::TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend)?;
    for _ in 0..ticks {
        terminal.draw(|f| draw(f, &mut state))?;
        pump_messages(&mut state);
        std::thread::sleep(Duration::from_millis(100));
        state.tick = state.tick.wrapping_add(1);
        let tick = state.tick;
        state.status.on_tick(tick);
    }
    state.shutdown_pollers();
    let summary = serde_json::json!({
        "ok": true,
        "page": state.router.current_page_name(),
        "instances": state.instances_count(),
        "log_lines": state.debug_log.len(),
    });
    println!("{summary}");
    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let config: AppConfig = if let Ok(path) = std::env::var("FLEET_TUI_CONFIG") {
        let s = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path}"))?
    } else {
        let default_path = std::path::Path::new("fleet.yaml");
        if default_path.exists() {
            let s = std::fs::read_to_string(default_path).context("reading fleet.yaml")?;
            serde_yaml::from_str(&s).context("parsing fleet.yaml")?
        } else {
            AppConfig::default()
        }
    };
    if let Err(e) = validate_app_config(&config) {
        anyhow::bail!("invalid config: {e}");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceRecord;
    use crate::services::dispatch::UpdatePayload;

    fn rec(id: &str, st: &str) -> InstanceRecord {
        InstanceRecord {
            id: id.into(),
            state: st.into(),
            ..Default::default()
        }
    }

    fn seeded_state() -> AppState {
        let mut state = AppState::new(AppConfig::default());
        state.apply_update(UpdatePayload::Instances(vec![
            rec("i-1", "running"),
            rec("i-2", "stopped"),
        ]));
        state
    }

    #[test]
    fn open_detail_and_back_round_trip() {
        let mut state = seeded_state();
        run_effects(
            &mut state,
            vec![Effect::OpenDetail {
                record: rec("i-1", "running"),
            }],
        );
        assert_eq!(state.router.current_page_name(), Some(PAGE_DETAIL));
        assert_eq!(state.router.previous_page_name(), Ok(PAGE_INSTANCES));
        assert!(state.router.back());
        assert_eq!(state.router.current_page_name(), Some(PAGE_INSTANCES));
    }

    #[test]
    fn switching_to_an_unknown_page_surfaces_a_status_message() {
        let mut state = seeded_state();
        run_effects(
            &mut state,
            vec![Effect::SwitchPage {
                name: "nope".to_string(),
            }],
        );
        let text = state.status.text().unwrap_or_default().to_string();
        assert!(text.contains("not registered"), "status was: {text}");
        assert_eq!(state.router.current_page_name(), Some(PAGE_INSTANCES));
    }

    #[test]
    fn option_selection_filters_the_table() {
        let mut state = seeded_state();
        assert_eq!(state.instances_count(), 2);
        run_effects(
            &mut state,
            vec![Effect::OptionSelected {
                label: "running".to_string(),
            }],
        );
        assert_eq!(state.instances_count(), 1);
        run_effects(
            &mut state,
            vec![Effect::OptionSelected {
                label: "all".to_string(),
            }],
        );
        assert_eq!(state.instances_count(), 2);
    }

    #[test]
    fn help_key_fronts_the_overlay_and_q_dismisses_it() {
        let mut state = seeded_state();
        assert!(!handle_key(&mut state, KeyCode::Char('?')));
        assert_eq!(state.router.current_page_name(), Some(HELP_PAGE));
        // q on the help page dismisses instead of quitting
        assert!(!handle_key(&mut state, KeyCode::Char('q')));
        assert_eq!(state.router.current_page_name(), Some(PAGE_INSTANCES));
        // q elsewhere quits
        assert!(handle_key(&mut state, KeyCode::Char('q')));
    }

    #[test]
    fn enter_on_the_table_opens_the_detail_page() {
        let mut state = seeded_state();
        assert!(!handle_key(&mut state, KeyCode::Enter));
        assert_eq!(state.router.current_page_name(), Some(PAGE_DETAIL));
        // Esc goes back
        assert!(!handle_key(&mut state, KeyCode::Esc));
        assert_eq!(state.router.current_page_name(), Some(PAGE_INSTANCES));
    }

    #[test]
    fn status_text_clears_after_its_deadline() {
        let mut state = seeded_state();
        state.show_status("hello");
        let ttl = state.config.status_ttl_secs * crate::widgets::status_bar::TICKS_PER_SECOND;
        state.status.on_tick(ttl - 1);
        assert_eq!(state.status.text(), Some("hello"));
        state.status.on_tick(ttl);
        assert_eq!(state.status.text(), None);
    }
}
