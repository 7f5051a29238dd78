//! Focus/break countdown.
//!
//! The countdown is held against an absolute deadline instead of a
//! decrementing counter, so late or missed ticks never make it drift. The
//! caller always passes the current instant in, which keeps the core
//! deterministic under test.

use std::time::{Duration, Instant};
use strum::{Display, EnumIs};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
  #[error("duration must be at least one second")]
  NonPositiveDuration,
  #[error("duration must be at most 24 hours")]
  DurationTooLong,
}

/// Longest interval a timer accepts, in seconds.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumIs, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Mode {
  #[default]
  Focus,
  Break,
}

impl Mode {
  pub fn other(self) -> Self {
    match self {
      Mode::Focus => Mode::Break,
      Mode::Break => Mode::Focus,
    }
  }
}

/// Converts a (possibly fractional) number of minutes into whole seconds.
pub fn minutes_to_secs(minutes: f64) -> Result<u64, TimerError> {
  if !minutes.is_finite() {
    return Err(TimerError::NonPositiveDuration);
  }
  let secs = (minutes * 60.0).round();
  if secs < 1.0 {
    return Err(TimerError::NonPositiveDuration);
  }
  Ok(secs as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
  focus_secs: u64,
  break_secs: u64,
}

impl TimerConfig {
  pub fn new(focus_secs: u64, break_secs: u64) -> Result<Self, TimerError> {
    if focus_secs == 0 || break_secs == 0 {
      return Err(TimerError::NonPositiveDuration);
    }
    if focus_secs > MAX_DURATION_SECS || break_secs > MAX_DURATION_SECS {
      return Err(TimerError::DurationTooLong);
    }
    Ok(Self { focus_secs, break_secs })
  }

  pub fn focus_secs(&self) -> u64 {
    self.focus_secs
  }

  pub fn break_secs(&self) -> u64 {
    self.break_secs
  }

  pub fn duration_of(&self, mode: Mode) -> u64 {
    match mode {
      Mode::Focus => self.focus_secs,
      Mode::Break => self.break_secs,
    }
  }
}

/// Reported by [`Timer::tick`] when a countdown expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSwitch {
  pub from: Mode,
  pub to: Mode,
  /// Focus seconds earned by the interval that just ended.
  pub credited_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
  config: TimerConfig,
  mode: Mode,
  remaining_secs: u64,
  // Some exactly while running.
  target_end: Option<Instant>,
}

impl Timer {
  pub fn new(config: TimerConfig) -> Self {
    Self {
      config,
      mode: Mode::Focus,
      remaining_secs: config.focus_secs,
      target_end: None,
    }
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn remaining_secs(&self) -> u64 {
    self.remaining_secs
  }

  pub fn is_running(&self) -> bool {
    self.target_end.is_some()
  }

  pub fn config(&self) -> TimerConfig {
    self.config
  }

  pub fn current_duration(&self) -> u64 {
    self.config.duration_of(self.mode)
  }

  pub fn start(&mut self, now: Instant) {
    if self.is_running() {
      return;
    }
    self.target_end = Some(now + Duration::from_secs(self.remaining_secs));
  }

  pub fn pause(&mut self, now: Instant) {
    if let Some(target) = self.target_end.take() {
      self.remaining_secs = secs_until(target, now);
    }
  }

  pub fn toggle(&mut self, now: Instant) {
    if self.is_running() {
      self.pause(now)
    } else {
      self.start(now)
    };
  }

  /// Refreshes the remaining time from the deadline and switches mode once
  /// less than a second is left. Does nothing while paused.
  pub fn tick(&mut self, now: Instant) -> Option<ModeSwitch> {
    let target = self.target_end?;
    self.remaining_secs = secs_until(target, now);
    if self.remaining_secs < 1 {
      Some(self.switch_mode(now))
    } else {
      None
    }
  }

  fn switch_mode(&mut self, now: Instant) -> ModeSwitch {
    let from = self.mode;
    let credited_secs = if from.is_focus() { self.config.focus_secs } else { 0 };
    self.mode = from.other();
    self.remaining_secs = self.current_duration();
    if self.is_running() {
      self.target_end = Some(now + Duration::from_secs(self.remaining_secs));
    }
    ModeSwitch { from, to: self.mode, credited_secs }
  }

  /// Stops the timer and returns to a fresh focus interval. Returns the
  /// focus seconds already spent in the abandoned interval.
  pub fn save_and_reset(&mut self, now: Instant) -> u64 {
    self.pause(now);
    let credited = if self.mode.is_focus() {
      self.config.focus_secs.saturating_sub(self.remaining_secs)
    } else {
      0
    };
    self.mode = Mode::Focus;
    self.remaining_secs = self.config.focus_secs;
    credited
  }

  pub fn set_focus_duration(&mut self, secs: u64) -> Result<(), TimerError> {
    self.config = TimerConfig::new(secs, self.config.break_secs)?;
    self.apply_duration_change(Mode::Focus);
    Ok(())
  }

  pub fn set_break_duration(&mut self, secs: u64) -> Result<(), TimerError> {
    self.config = TimerConfig::new(self.config.focus_secs, secs)?;
    self.apply_duration_change(Mode::Break);
    Ok(())
  }

  // A running countdown keeps its deadline.
  fn apply_duration_change(&mut self, changed: Mode) {
    if !self.is_running() && self.mode == changed {
      self.remaining_secs = self.config.duration_of(changed);
    }
  }
}

fn secs_until(target: Instant, now: Instant) -> u64 {
  target.saturating_duration_since(now).as_secs_f64().round() as u64
}
