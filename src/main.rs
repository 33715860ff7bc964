use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::warn;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use stint::{
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{ConfigStore, FileConfigStore},
    continuity::{ContinuityController, NoopInhibitor},
    reconcile::load_and_reconcile,
    runtime::{CrosstermEventSource, FixedTicker, Runner, Ticker, TimerEvent, TimerEventSource},
    store::TimerStore,
    timer::StudyTimer,
    ui::TimerView,
};

const TICK_RATE_MS: u64 = 250;

/// terminal study timer with persistent sessions and daily totals
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal countdown timer for study sessions. Sessions survive \
restarts: a running timer keeps counting while the process is gone, and daily \
and weekly totals accumulate across sessions."
)]
pub struct Cli {
    /// arm a session of this many minutes on startup
    #[clap(short = 'm', long)]
    minutes: Option<u64>,

    /// path to the timer database (defaults to the platform data dir)
    #[clap(long)]
    db: Option<PathBuf>,
}

pub struct App {
    pub timer: StudyTimer,
    pub continuity: ContinuityController,
    pub presets: Vec<u64>,
}

impl App {
    pub fn new(timer: StudyTimer, presets: Vec<u64>, now_ms: i64) -> Self {
        let mut continuity = ContinuityController::new(Box::new(NoopInhibitor));
        continuity.sync(timer.state.is_running(), now_ms);
        Self {
            timer,
            continuity,
            presets,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Action {
    None,
    Redraw,
    Quit,
}

/// Pure key dispatcher. Every mutation funnels through the timer's
/// operations, then the inhibitor is re-synced to the resulting phase.
fn handle_key(app: &mut App, key: KeyEvent, now_ms: i64) -> Action {
    let action = match key.code {
        KeyCode::Esc | KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Action::Quit;
        }
        KeyCode::Char(' ') => {
            app.timer.toggle(now_ms);
            Action::Redraw
        }
        KeyCode::Char('r') => {
            app.timer.reset(now_ms);
            Action::Redraw
        }
        KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
            let idx = c.to_digit(10).unwrap_or(0) as usize - 1;
            match app.presets.get(idx) {
                Some(&minutes) => {
                    app.timer.select_duration(minutes, now_ms);
                    Action::Redraw
                }
                None => Action::None,
            }
        }
        _ => Action::None,
    };

    app.continuity.sync(app.timer.state.is_running(), now_ms);
    action
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &App,
    now_ms: i64,
) -> Result<(), Box<dyn Error>> {
    let view = TimerView {
        timer: &app.timer,
        presets: &app.presets,
        now_ms,
    };
    terminal.draw(|f| f.render_widget(&view, f.area()))?;
    Ok(())
}

fn run_app<B: Backend, E: TimerEventSource, T: Ticker, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
    clock: &C,
) -> Result<(), Box<dyn Error>> {
    draw(terminal, app, clock.now_ms())?;

    loop {
        let event = runner.step();
        let now = clock.now_ms();

        match event {
            TimerEvent::Tick => {
                let completed = app.timer.refresh(now);
                app.timer.maybe_periodic_save(now);
                app.continuity.poll(now);
                app.continuity.sync(app.timer.state.is_running(), now);

                if completed || app.timer.state.is_running() {
                    draw(terminal, app, now)?;
                }
            }
            TimerEvent::Resize => {
                draw(terminal, app, now)?;
            }
            TimerEvent::FocusLost => {
                app.continuity.on_hidden(&mut app.timer, now);
            }
            TimerEvent::FocusGained => {
                app.continuity.on_visible(&mut app.timer, now);
                draw(terminal, app, now)?;
            }
            TimerEvent::Key(key) => match handle_key(app, key, now) {
                Action::Quit => break,
                Action::Redraw => draw(terminal, app, now)?,
                Action::None => {}
            },
        }
    }

    // One last checkpoint so the session survives the quit.
    app.timer.save_snapshot(clock.now_ms());

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = FileConfigStore::new().load();

    let store = match &cli.db {
        Some(path) => TimerStore::open(path),
        None => TimerStore::new(),
    };
    let store = match store {
        Ok(store) => Some(store),
        Err(err) => {
            warn!("timer database unavailable, running without persistence: {err}");
            None
        }
    };

    let clock = SystemClock;
    let now = clock.now_ms();
    let (state, totals) = load_and_reconcile(store.as_ref(), now, config.resume_running);
    let mut timer = StudyTimer::new(store, state, totals, config.save_interval_secs, now);
    if let Some(log_path) = AppDirs::completion_log_path() {
        timer.set_completion_log(log_path);
    }

    // An explicit -m replaces whatever session was restored.
    if let Some(minutes) = cli.minutes {
        timer.select_duration(minutes, now);
    }

    let mut app = App::new(timer, config.presets_minutes, now);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let res = run_app(&mut terminal, &mut app, &runner, &clock);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}
