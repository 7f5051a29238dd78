/////////////////////
/// PhD Focus Pomodoro - "POMOCAT"
///
/// Asks for today's goal, then alternates focus and break intervals. Every
/// finished focus interval counts toward today's total, which survives
/// restarts until the date changes.
/// - 'space' starts & pauses
/// - 's' saves the focus time so far & resets to a fresh focus interval
/// - 'f' / 'b' step through the focus / break lengths (only while paused)
/// - 'c' "I can't focus": shows a random cat
/// - 'q' quits
///
pub const APP_VERSION: &str = "POMOCAT V0.1.0";
const APP_TITLE: &str = "PhD Focus Pomodoro";
const TAGLINE: &str = "For the distracted, the desperate, the determined.";
const GOAL_PLACEHOLDER: &str = "e.g., Finish Chapter 3 draft...";
const CAT_CAPTION: &str = "Here's a cat. Now, back to work!";
const LOG_FILE_NAME: &str = "pomocat.log";

use std::time::{Duration, Instant};
#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::*;
use std::fs::File;
#[macro_use]
extern crate ini;

mod cat;
mod config;
mod daily;
mod goal;
mod sound;
mod timer;
mod tui;

use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{prelude::*, style::Color, widgets::*};
use strum::EnumIs;
use tokio::sync::mpsc::UnboundedSender;
use tui_big_text::BigText;
use build_time::build_time_local;

use cat::{CatError, CatModal, CatPicture, CatView, PictureView};
use config::{Settings, CONF_FILE_NAME};
use daily::{DailyStore, DailyTotal};
use goal::GoalInput;
use sound::Sound;
use timer::{minutes_to_secs, Mode, Timer};
use tui::{Event, Ticker, Tui, TICK_INTERVAL_MS};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs)]
enum AppState {
  #[default]
  GoalEntry,
  Timing,
  Quitting,
}

#[derive(Debug, Clone, PartialEq)]
enum Message {
  Type(char),
  Erase,
  SubmitGoal,
  StartPause,
  SaveReset,
  NextFocus,
  NextBreak,
  OpenCat,
  CloseCat,
  CatArrived(u64, Result<CatPicture, CatError>),
  Tick,
  Render,
  Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  init_logging();

  let settings = Settings::load(CONF_FILE_NAME);
  let mut tui = Tui::new()?;
  let mut app = PomodoroApp::new(settings, tui.event_tx.clone())?;
  app.run(&mut tui).await?;
  drop(tui);

  println!("Focused {} min today. Thanks for using {} (built: {})\n",
    app.daily.minutes_on(today()), APP_VERSION, build_time_local!("%Y-%b-%d at %H:%M:%S"));
  Ok(())
}

// The terminal belongs to the TUI once it starts, so log records only ever
// go to the log file. Startup problems are also printed before the TUI starts.
fn init_logging() {
  let log_file = match File::create(LOG_FILE_NAME) {
    Ok(file) => Some(file),
    Err(e) => {
      eprintln!("Warning: Could not create log file: {}", e);
      eprintln!("Continuing without logging.");
      None
    }
  };

  let loggers = session_loggers(log_file);
  if loggers.is_empty() {
    return;
  }
  CombinedLogger::init(loggers).unwrap_or_else(|e| {
    eprintln!("Warning: Could not initialize logger: {}", e);
  });

  info!("Logging for {} initialized (tick interval: {}ms)", APP_VERSION, TICK_INTERVAL_MS);
}

fn session_loggers(log_file: Option<File>) -> Vec<Box<dyn SharedLogger>> {
  log_file
    .map(|file| WriteLogger::new(LevelFilter::Info, Config::default(), file) as Box<dyn SharedLogger>)
    .into_iter()
    .collect()
}

fn today() -> NaiveDate {
  chrono::Local::now().date_naive()
}

struct PomodoroApp {
  state: AppState,
  settings: Settings,
  goal_input: GoalInput,
  goal: String,
  timer: Timer,
  daily: DailyTotal,
  store: DailyStore,
  sound: Sound,
  cat: CatModal,
  ticker: Option<Ticker>,
  event_tx: UnboundedSender<Event>,
  status: Option<String>,
}

impl PomodoroApp {
  fn new(settings: Settings, event_tx: UnboundedSender<Event>) -> Result<Self> {
    let timer = Timer::new(settings.timer_config()?);
    let store = DailyStore::new(settings.data_file.clone());
    let daily = store.load(today());
    info!("Daily total file {} holds {}s for today", store.path().display(), daily.total_focused_seconds);
    Ok(Self {
      state: Default::default(),
      goal_input: GoalInput::default(),
      goal: String::new(),
      timer,
      daily,
      store,
      sound: Sound::new(settings.player.clone()),
      cat: CatModal::new(settings.cat_url.clone())?,
      ticker: None,
      event_tx,
      status: None,
      settings,
    })
  }

  async fn run(&mut self, tui: &mut Tui) -> Result<()> {
    tui.enter()?;
    while !self.state.is_quitting() {
      tui.draw(|f| self.ui(f))?;
      let event = tui.next().await.ok_or(eyre!("Unable to get event"))?; // blocks until next event
      let message = self.handle_event(event);
      self.update(message, Instant::now());
    }
    tui.exit()?;
    Ok(())
  }

  // Event handler (keyboard, tick, cat fetch)
  fn handle_event(&self, event: Event) -> Message {
    match event {
      Event::Key(key) => self.key_message(key),
      Event::Tick => Message::Tick,
      Event::Cat { request, result } => Message::CatArrived(request, result),
      Event::Render | Event::Error => Message::Render,
    }
  }

  fn key_message(&self, key: KeyEvent) -> Message {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Message::Quit;
    }
    match self.state {
      AppState::GoalEntry => match key.code {
        KeyCode::Esc => Message::Quit,
        KeyCode::Enter => Message::SubmitGoal,
        KeyCode::Backspace => Message::Erase,
        KeyCode::Char(c) => Message::Type(c),
        _ => Message::Render,
      },
      AppState::Timing if self.cat.is_open() => match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('c') | KeyCode::Char('C')
        | KeyCode::Char('q') | KeyCode::Char('Q') => Message::CloseCat,
        _ => Message::Render,
      },
      AppState::Timing => match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Message::Quit,
        KeyCode::Char(' ') | KeyCode::Enter => Message::StartPause,
        KeyCode::Char('s') | KeyCode::Char('S') => Message::SaveReset,
        KeyCode::Char('f') | KeyCode::Char('F') => Message::NextFocus,
        KeyCode::Char('b') | KeyCode::Char('B') => Message::NextBreak,
        KeyCode::Char('c') | KeyCode::Char('C') => Message::OpenCat,
        _ => Message::Render,
      },
      AppState::Quitting => Message::Render,
    }
  }

  fn update(&mut self, message: Message, now: Instant) {
    match message {
      Message::Type(c) => self.goal_input.push(c),
      Message::Erase => self.goal_input.backspace(),
      Message::SubmitGoal => self.submit_goal(),
      Message::StartPause => self.start_pause(now),
      Message::SaveReset => self.save_and_reset(now),
      Message::NextFocus => self.next_duration(Mode::Focus),
      Message::NextBreak => self.next_duration(Mode::Break),
      Message::OpenCat => self.cat.open(&self.event_tx),
      Message::CloseCat => self.cat.close(),
      Message::CatArrived(request, result) => self.cat.receive(request, result),
      Message::Tick => self.tick(now),
      Message::Render => {}
      Message::Quit => self.quit(),
    }
  }

  fn submit_goal(&mut self) {
    if let Some(goal) = self.goal_input.submit() {
      info!("Goal for today: {}", goal);
      self.goal = goal;
      self.state = AppState::Timing;
    }
  }

  fn start_pause(&mut self, now: Instant) {
    self.timer.toggle(now);
    self.sync_ticker();
    info!("Timer {} with {}s of {} left",
      if self.timer.is_running() { "started" } else { "paused" },
      self.timer.remaining_secs(), self.timer.mode());
  }

  // Keeps exactly one ticker alive while the timer runs and none otherwise.
  fn sync_ticker(&mut self) {
    if self.timer.is_running() {
      if self.ticker.is_none() {
        self.ticker = Some(Ticker::start(self.event_tx.clone(), Duration::from_millis(TICK_INTERVAL_MS)));
      }
    } else {
      self.ticker = None;
    }
  }

  fn tick(&mut self, now: Instant) {
    let Some(switch) = self.timer.tick(now) else {
      return;
    };
    info!("{} over, switching to {}", switch.from, switch.to);
    self.sound.play();
    self.credit(switch.credited_secs);
    self.status = Some(match switch.to {
      Mode::Break => "Focus done. Take a break!".to_string(),
      Mode::Focus => "Break's over. Back to focus.".to_string(),
    });
  }

  fn save_and_reset(&mut self, now: Instant) {
    self.sound.play();
    let credited = self.timer.save_and_reset(now);
    self.sync_ticker();
    self.credit(credited);
    self.status = Some(format!("Saved {} of focus", format_timeleft(credited)));
  }

  fn credit(&mut self, secs: u64) {
    if secs == 0 {
      return;
    }
    self.daily.credit(today(), secs);
    info!("Credited {}s, {}s today", secs, self.daily.total_focused_seconds);
    if let Err(e) = self.store.save(&self.daily) {
      log::error!("{:#}", e);
      self.status = Some("Couldn't save today's total".to_string());
    }
  }

  fn next_duration(&mut self, mode: Mode) {
    if self.timer.is_running() {
      self.status = Some("Pause the timer to change durations".to_string());
      return;
    }
    let options = match mode {
      Mode::Focus => &self.settings.focus_options,
      Mode::Break => &self.settings.break_options,
    };
    if options.is_empty() {
      return;
    }
    let current = self.timer.config().duration_of(mode);
    let next = options.iter()
      .position(|m| minutes_to_secs(*m) == Ok(current))
      .map_or(0, |i| (i + 1) % options.len());
    let result = minutes_to_secs(options[next]).and_then(|secs| match mode {
      Mode::Focus => self.timer.set_focus_duration(secs),
      Mode::Break => self.timer.set_break_duration(secs),
    });
    match result {
      Ok(()) => {
        let config = self.timer.config();
        info!("Durations now focus {}s, break {}s", config.focus_secs(), config.break_secs());
        self.status = None;
      }
      Err(e) => {
        warn!("Ignoring {} preset {}: {}", mode, options[next], e);
        self.status = Some(format!("Can't use {} min: {}", options[next], e));
      }
    }
  }

  fn quit(&mut self) {
    self.ticker = None;
    self.cat.close();
    self.state = AppState::Quitting;
  }

  fn ui(&mut self, f: &mut Frame) {
    match self.state {
      AppState::GoalEntry => self.goal_screen(f),
      _ => self.timer_screen(f),
    }
    if self.cat.is_open() {
      self.cat_modal(f);
    }
  }

  fn goal_screen(&self, f: &mut Frame) {
    let layout = Layout::default()
      .direction(Direction::Vertical)
      .constraints(vec![
        Constraint::Percentage(30),
        Constraint::Length(2), // title
        Constraint::Length(3), // tagline
        Constraint::Length(1), // question
        Constraint::Length(3), // input
        Constraint::Length(2), // help
        Constraint::Min(0),
      ])
      .split(f.size());

    f.render_widget(Paragraph::new(APP_TITLE.cyan().bold()).alignment(Alignment::Center), layout[1]);
    f.render_widget(Paragraph::new(TAGLINE).gray().alignment(Alignment::Center), layout[2]);
    f.render_widget(
      Paragraph::new("What is your main goal for today?".bold()).alignment(Alignment::Center), layout[3]);

    let input = if self.goal_input.text().is_empty() {
      Line::from(vec!["█".into(), GOAL_PLACEHOLDER.dim()])
    } else {
      Line::from(vec![self.goal_input.text().into(), "█".into()])
    };
    let input_area = centered_rect(60, 100, layout[4]);
    f.render_widget(Paragraph::new(input).block(Block::default().borders(Borders::ALL)), input_area);

    let enter = if self.goal_input.can_submit() { "Start Focusing".into() } else { "Start Focusing".dim() };
    let help = Line::from(vec!["enter ".into(), enter, " : esc ".into(), "quit".dim()]);
    f.render_widget(Paragraph::new(help).gray().alignment(Alignment::Center), layout[5]);
  }

  fn timer_screen(&self, f: &mut Frame) {
    let layout = Layout::default()
      .direction(Direction::Vertical)
      .constraints(vec![
        Constraint::Length(3), // top bar
        Constraint::Length(2), // goal
        Constraint::Length(9), // timer
        Constraint::Length(2), // mode
        Constraint::Length(1), // focus presets
        Constraint::Length(2), // break presets
        Constraint::Length(2), // status
        Constraint::Length(2), // help
      ])
      .split(f.size());

    let top = Layout::default()
      .direction(Direction::Horizontal)
      .constraints(vec![Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(layout[0]);
    f.render_widget(Paragraph::new(APP_VERSION).gray(), top[0]);
    f.render_widget(self.total_paragraph(), top[1]);

    f.render_widget(Paragraph::new(self.goal.as_str().bold()), layout[1]);
    f.render_widget(self.timer_paragraph(), layout[2]);
    f.render_widget(Paragraph::new(self.timer.mode().to_string()).style(self.mode_style()), layout[3]);
    f.render_widget(self.presets_paragraph(Mode::Focus), layout[4]);
    f.render_widget(self.presets_paragraph(Mode::Break), layout[5]);
    if let Some(status) = &self.status {
      f.render_widget(Paragraph::new(status.as_str()).italic(), layout[6]);
    }
    f.render_widget(self.help_paragraph(), layout[7]);
  }

  fn mode_color(&self) -> Color {
    match self.timer.mode() {
      Mode::Focus => Color::Cyan,
      Mode::Break => Color::Yellow,
    }
  }

  fn mode_style(&self) -> Style {
    if self.timer.is_running() {
      Style::new().fg(self.mode_color())
    } else {
      Style::new().gray()
    }
  }

  fn total_paragraph(&self) -> Paragraph<'_> {
    let minutes = self.daily.minutes_on(today());
    let text = Line::from(vec![
      "Total Focus Today: ".into(),
      Span::styled(format!("{} min", minutes), Style::new().fg(self.mode_color()).add_modifier(Modifier::BOLD)),
    ]);
    Paragraph::new(text).alignment(Alignment::Right)
  }

  fn timer_paragraph(&self) -> BigText<'_> {
    let lines = vec![format_timeleft(self.timer.remaining_secs()).into()];
    tui_big_text::BigTextBuilder::default()
      .lines(lines)
      .style(self.mode_style())
      .build()
      .expect("lines is always set")
  }

  fn presets_paragraph(&self, mode: Mode) -> Paragraph<'_> {
    let (label, options) = match mode {
      Mode::Focus => ("Focus: ", &self.settings.focus_options),
      Mode::Break => ("Break: ", &self.settings.break_options),
    };
    let selected = self.timer.config().duration_of(mode);
    let selected_style = Style::new().fg(Color::Black).bg(self.mode_color());
    let mut spans: Vec<Span> = vec![label.bold()];
    for minutes in options {
      let text = format!(" {} min ", minutes);
      let span = if minutes_to_secs(*minutes) == Ok(selected) {
        Span::styled(text, selected_style)
      } else {
        Span::raw(text)
      };
      spans.push(span);
      spans.push(" ".into());
    }
    let paragraph = Paragraph::new(Line::from(spans));
    if self.timer.is_running() { paragraph.dim() } else { paragraph }
  }

  fn help_paragraph(&self) -> Paragraph<'_> {
    let space_action = if self.timer.is_running() { "pause" } else { "start" };
    let help_text =
      Line::from(vec!["space ".into(), space_action.dim(), " : s ".into(), "save & reset".dim(),
        " : f ".into(), "focus".dim(), " : b ".into(), "break".dim(),
        " : c ".into(), "I can't focus".dim(), " : q ".into(), "quit".dim()]);
    Paragraph::new(help_text).gray()
  }

  fn cat_modal(&self, f: &mut Frame) {
    let area = centered_rect(60, 80, f.size());
    let block = Block::default().borders(Borders::ALL).title(" I can't focus ").red();
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let layout = Layout::default()
      .direction(Direction::Vertical)
      .constraints(vec![Constraint::Min(1), Constraint::Length(1), Constraint::Length(1)])
      .split(inner);

    match self.cat.view() {
      CatView::Ready(picture) => f.render_widget(PictureView(picture), layout[0]),
      CatView::Loading => f.render_widget(
        Paragraph::new("Loading a cute cat...").alignment(Alignment::Center), centered_rect(100, 20, layout[0])),
      CatView::Failed(e) => f.render_widget(
        Paragraph::new(format!("No cat this time ({})", e)).red().wrap(Wrap { trim: true })
          .alignment(Alignment::Center), centered_rect(100, 40, layout[0])),
      CatView::Closed => {}
    }
    f.render_widget(Paragraph::new(CAT_CAPTION).gray().alignment(Alignment::Center), layout[1]);
    f.render_widget(Paragraph::new(Line::from(vec!["esc ".into(), "close".dim()]))
      .gray().alignment(Alignment::Center), layout[2]);
  }
}

fn format_timeleft(secs: u64) -> String {
  format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
  let popup_layout = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Percentage((100 - percent_y) / 2),
      Constraint::Percentage(percent_y),
      Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);

  Layout::default()
    .direction(Direction::Horizontal)
    .constraints([
      Constraint::Percentage((100 - percent_x) / 2),
      Constraint::Percentage(percent_x),
      Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
