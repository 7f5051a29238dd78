//! Terminal handling and the two event sources feeding the app: the `Tui`
//! task (keys and a redraw pulse) and the `Ticker` that drives the timer.

use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use crossterm::event::KeyEvent;
use futures::{FutureExt, StreamExt};
use ratatui::backend::CrosstermBackend as Backend;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cat::{CatError, CatPicture};

pub const RENDER_INTERVAL_MS: u64 = 250;     // Redraw pulse
pub const TICK_INTERVAL_MS: u64 = 1000;      // Timer tick

#[derive(Clone, Debug)]
pub enum Event {
  Error,
  Render,
  Tick,
  Key(KeyEvent),
  Cat { request: u64, result: Result<CatPicture, CatError> },
}

pub struct Tui {
  pub terminal: ratatui::Terminal<Backend<std::io::Stderr>>,
  pub task: JoinHandle<()>,
  pub cancellation_token: CancellationToken,
  pub event_rx: UnboundedReceiver<Event>,
  pub event_tx: UnboundedSender<Event>,
}

impl Tui {
  pub fn new() -> Result<Tui> {
    let mut terminal = ratatui::Terminal::new(Backend::new(std::io::stderr()))?;
    terminal.clear()?;
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let cancellation_token = CancellationToken::new();
    let task = tokio::spawn(async {});
    Ok(Self { terminal, task, cancellation_token, event_rx, event_tx })
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.event_rx.recv().await
  }

  pub fn enter(&mut self) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stderr(), crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    self.start();
    Ok(())
  }

  pub fn exit(&self) -> Result<()> {
    self.stop()?;
    if crossterm::terminal::is_raw_mode_enabled()? {
      crossterm::execute!(std::io::stderr(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
      crossterm::terminal::disable_raw_mode()?;
    }
    Ok(())
  }

  pub fn cancel(&self) {
    self.cancellation_token.cancel();
  }

  pub fn stop(&self) -> Result<()> {
    self.cancel();
    let mut counter = 0;
    while !self.task.is_finished() {
      std::thread::sleep(Duration::from_millis(250));
      counter += 1;
      if counter > 5 {
        self.task.abort();
      }
      if counter > 10 {
        log::error!("Failed to abort task for unknown reason");
        return Err(eyre!("Unable to abort task"));
      }
    }
    Ok(())
  }

  pub fn start(&mut self) {
    let render_rate = Duration::from_millis(RENDER_INTERVAL_MS);
    self.cancel();
    self.cancellation_token = CancellationToken::new();
    let cancellation_token = self.cancellation_token.clone();
    let event_tx = self.event_tx.clone();
    self.task = tokio::spawn(async move {
      let mut reader = crossterm::event::EventStream::new();
      let mut interval = tokio::time::interval(render_rate);
      loop {
        let delay = interval.tick();
        let crossterm_event = reader.next().fuse();
        tokio::select! {
          _ = cancellation_token.cancelled() => {
            break;
          }
          maybe_event = crossterm_event => {
            match maybe_event {
              Some(Ok(crossterm::event::Event::Key(key))) => {
                if key.kind == crossterm::event::KeyEventKind::Press {
                  if let Err(e) = event_tx.send(Event::Key(key)) {
                    log::error!("Failed to send key event: {}", e);
                  }
                }
              }
              Some(Ok(_)) => { }
              Some(Err(_)) => {
                if let Err(e) = event_tx.send(Event::Error) {
                  log::error!("Failed to send error event: {}", e);
                }
              }
              None => {},
            }
          },
          _ = delay => {
            if let Err(e) = event_tx.send(Event::Render) {
              log::error!("Failed to send render event: {}", e);
            }
          },
        }
      }
    });
  }
}

impl std::ops::Deref for Tui {
  type Target = ratatui::Terminal<Backend<std::io::Stderr>>;

  fn deref(&self) -> &Self::Target {
    &self.terminal
  }
}

impl std::ops::DerefMut for Tui {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.terminal
  }
}

impl Drop for Tui {
  fn drop(&mut self) {
    if let Err(e) = self.exit() {
      eprintln!("Error during cleanup: {}", e);
    }
  }
}

/// The repeating tick source for a running timer. There is at most one per
/// app; dropping it stops the ticks.
#[derive(Debug)]
pub struct Ticker {
  task: JoinHandle<()>,
  cancellation_token: CancellationToken,
}

impl Ticker {
  pub fn start(event_tx: UnboundedSender<Event>, period: Duration) -> Self {
    let cancellation_token = CancellationToken::new();
    let token = cancellation_token.clone();
    let task = tokio::spawn(async move {
      let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          _ = interval.tick() => {
            if event_tx.send(Event::Tick).is_err() {
              debug!("Tick receiver gone, ticker stopping");
              break;
            }
          }
        }
      }
    });
    Self { task, cancellation_token }
  }

  pub fn stop(&self) {
    self.cancellation_token.cancel();
    self.task.abort();
  }
}

impl Drop for Ticker {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_ticker_sends_ticks() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _ticker = Ticker::start(tx, Duration::from_millis(TICK_INTERVAL_MS));
    for _ in 0..3 {
      assert!(matches!(rx.recv().await, Some(Event::Tick)));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_ticker_stops() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let ticker = Ticker::start(tx, Duration::from_millis(TICK_INTERVAL_MS));
    drop(ticker);
    // The task held the only sender; once it is gone the channel closes.
    assert!(rx.recv().await.is_none());
  }
}
