use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::night::SleepNight;
use crate::ui::adapter::{SleepNightAdapter, SleepNightListener};
use crate::ui::render;
use crate::ui::tracker::SleepTracker;

pub const GRID_COLUMNS: usize = 3;
const SNACKBAR_DURATION: Duration = Duration::from_secs(3);
const CLEARED_MESSAGE: &str = "Cleared all sleep data";

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    SleepTracker { selected: usize, show_summary: bool },
    SleepQuality { night_id: i64 },
    SleepDetail { night: SleepNight },
}

impl AppState {
    fn tracker_home() -> Self {
        AppState::SleepTracker { selected: 0, show_summary: false }
    }
}

pub struct App {
    pub state: AppState,
    tracker: SleepTracker,
    pub adapter: SleepNightAdapter,
    nights: watch::Receiver<Vec<SleepNight>>,
    pub tonight: watch::Receiver<Option<SleepNight>>,
    pub nights_string: watch::Receiver<String>,
    pub start_button_visible: watch::Receiver<bool>,
    pub stop_button_visible: watch::Receiver<bool>,
    pub clear_button_visible: watch::Receiver<bool>,
    pub snackbar: Option<(String, Instant)>,
    pending_detail: Option<JoinHandle<Result<Option<SleepNight>>>>,
}

impl App {
    pub fn new(tracker: SleepTracker) -> Self {
        let clicks = tracker.clone();
        let adapter = SleepNightAdapter::new(SleepNightListener::new(move |night_id| {
            clicks.on_sleep_night_clicked(night_id)
        }));

        Self {
            state: AppState::tracker_home(),
            adapter,
            nights: tracker.nights(),
            tonight: tracker.tonight(),
            nights_string: tracker.nights_string(),
            start_button_visible: tracker.start_button_visible(),
            stop_button_visible: tracker.stop_button_visible(),
            clear_button_visible: tracker.clear_button_visible(),
            snackbar: None,
            pending_detail: None,
            tracker,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting UI...");

        // Set up signal handlers for graceful shutdown on SIGTERM/SIGINT
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_flag))?;

        if let Err(e) = enable_raw_mode() {
            eprintln!("Failed to enable raw mode: {}. A real terminal is required.", e);
            return Err(anyhow::anyhow!("Terminal raw mode not supported: {}", e));
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
            let _ = disable_raw_mode();
            return Err(anyhow::anyhow!("Failed to setup terminal: {}", e));
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, &shutdown_flag).await;

        // Restore the terminal even if the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
        terminal.show_cursor()?;

        self.tracker.on_cleared();
        log::info!("UI stopped");
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        shutdown_flag: &AtomicBool,
    ) -> Result<()> {
        loop {
            self.sync_observers().await;
            terminal.draw(|f| render::draw(self, f))?;

            if shutdown_flag.load(Ordering::Relaxed) {
                log::info!("Received shutdown signal, exiting...");
                break;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    log::debug!("Key pressed: {:?} in state: {:?}", key.code, self.state);
                    if !self.handle_key(key.code) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pulls everything the tracker pushed since the last frame: a new
    /// listing, pending one-shot events and finished detail lookups.
    pub async fn sync_observers(&mut self) {
        if self.nights.has_changed().unwrap_or(false) {
            let nights = self.nights.borrow_and_update().clone();
            self.adapter.submit_list(nights);
            let count = self.adapter.item_count();
            if let AppState::SleepTracker { selected, .. } = &mut self.state {
                *selected = (*selected).min(count.saturating_sub(1));
            }
        }

        if let Some(night) = self.tracker.navigate_to_sleep_quality().peek() {
            self.state = AppState::SleepQuality { night_id: night.night_id };
            self.tracker.done_navigating();
        }

        if self.tracker.navigate_to_sleep_tracker().peek().is_some() {
            self.state = AppState::tracker_home();
            self.tracker.done_navigating_to_tracker();
        }

        if let Some(night_id) = self.tracker.navigate_to_sleep_data_quality().peek() {
            let tracker = self.tracker.clone();
            self.pending_detail = Some(tokio::spawn(async move { tracker.night_with_id(night_id).await }));
            self.tracker.on_sleep_data_quality_navigated();
        }

        if let Some(handle) = self.pending_detail.take_if(|handle| handle.is_finished()) {
            match handle.await {
                Ok(Ok(Some(night))) => self.state = AppState::SleepDetail { night },
                Ok(Ok(None)) => log::debug!("Clicked night no longer exists"),
                Ok(Err(e)) => log::error!("Failed to load night: {:#}", e),
                Err(e) => log::error!("Night lookup task failed: {}", e),
            }
        }

        if self.tracker.show_snackbar_event().peek().is_some() {
            self.snackbar = Some((CLEARED_MESSAGE.to_string(), Instant::now()));
            self.tracker.done_showing_snackbar();
        }
        if self
            .snackbar
            .as_ref()
            .is_some_and(|(_, shown_at)| shown_at.elapsed() >= SNACKBAR_DURATION)
        {
            self.snackbar = None;
        }
    }

    /// Returns `false` when the app should quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        match &mut self.state {
            AppState::SleepTracker { selected, show_summary } => match code {
                KeyCode::Char('q') => return false,
                KeyCode::Char('s') if *self.start_button_visible.borrow() => {
                    self.tracker.on_start_tracking();
                }
                KeyCode::Char('t') if *self.stop_button_visible.borrow() => {
                    self.tracker.on_stop_tracking();
                }
                KeyCode::Char('c') if *self.clear_button_visible.borrow() => {
                    self.tracker.on_clear();
                }
                KeyCode::Char('v') => *show_summary = !*show_summary,
                KeyCode::Enter => {
                    self.adapter.on_click(*selected);
                }
                KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down => {
                    *selected = move_selection(*selected, code, self.adapter.item_count());
                }
                _ => {}
            },
            AppState::SleepQuality { night_id } => match code {
                KeyCode::Char(digit @ '0'..='5') => {
                    let quality = digit as i32 - '0' as i32;
                    self.tracker.on_set_sleep_quality(*night_id, quality);
                }
                KeyCode::Esc => self.state = AppState::tracker_home(),
                _ => {}
            },
            AppState::SleepDetail { .. } => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace => {
                    self.state = AppState::tracker_home();
                }
                KeyCode::Char('q') => return false,
                _ => {}
            },
        }
        true
    }
}

/// Moves a grid selection by one cell, staying inside `0..count`.
pub fn move_selection(selected: usize, code: KeyCode, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let last = count - 1;
    let moved = match code {
        KeyCode::Left => selected.saturating_sub(1),
        KeyCode::Right => selected + 1,
        KeyCode::Up => selected.saturating_sub(GRID_COLUMNS),
        KeyCode::Down => {
            if selected + GRID_COLUMNS <= last {
                selected + GRID_COLUMNS
            } else {
                selected
            }
        }
        _ => selected,
    };
    moved.min(last)
}
