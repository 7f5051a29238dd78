//! Daily focus total, kept in a small JSON file next to the app data.
//!
//! The record carries the calendar date it belongs to; a record from any
//! other day counts as zero.

use chrono::NaiveDate;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "pomocat";
const DAILY_FILE_NAME: &str = "daily.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
  pub total_focused_seconds: u64,
  pub date: NaiveDate,
}

impl DailyTotal {
  pub fn new(date: NaiveDate) -> Self {
    Self { total_focused_seconds: 0, date }
  }

  pub fn seconds_on(&self, today: NaiveDate) -> u64 {
    if self.date == today { self.total_focused_seconds } else { 0 }
  }

  pub fn minutes_on(&self, today: NaiveDate) -> u64 {
    self.seconds_on(today) / 60
  }

  /// Adds focus seconds for `today`, starting over if the day has rolled.
  pub fn credit(&mut self, today: NaiveDate, secs: u64) {
    if self.date != today {
      info!("New day {} (was {}), daily total starts over", today, self.date);
      *self = Self::new(today);
    }
    self.total_focused_seconds += secs;
  }
}

#[derive(Debug, Clone)]
pub struct DailyStore {
  path: PathBuf,
}

impl DailyStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// `<data dir>/pomocat/daily.json`, or the working directory when the
  /// platform has no data dir.
  pub fn default_path() -> PathBuf {
    dirs::data_dir()
      .map(|dir| dir.join(DATA_DIR_NAME))
      .unwrap_or_default()
      .join(DAILY_FILE_NAME)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Never fails: anything unreadable is logged and counts as zero.
  pub fn load(&self, today: NaiveDate) -> DailyTotal {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        info!("No daily total at {}, starting from zero", self.path.display());
        return DailyTotal::new(today);
      }
      Err(e) => {
        warn!("Could not read daily total {}: {}", self.path.display(), e);
        return DailyTotal::new(today);
      }
    };

    match serde_json::from_str::<DailyTotal>(&content) {
      Ok(total) if total.date == today => total,
      Ok(total) => {
        info!("Daily total is from {}, ignoring it", total.date);
        DailyTotal::new(today)
      }
      Err(e) => {
        warn!("Daily total {} is corrupt: {}", self.path.display(), e);
        DailyTotal::new(today)
      }
    }
  }

  pub fn save(&self, total: &DailyTotal) -> Result<()> {
    if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
      fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Failed to create data directory {}", dir.display()))?;
    }
    let content = serde_json::to_string(total).wrap_err("Failed to serialize daily total")?;
    fs::write(&self.path, content)
      .wrap_err_with(|| format!("Failed to write daily total {}", self.path.display()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
  }

  #[test]
  fn test_credit_same_day_accumulates() {
    let mut total = DailyTotal::new(day(1));
    total.credit(day(1), 6);
    total.credit(day(1), 120);
    assert_eq!(total.seconds_on(day(1)), 126);
    assert_eq!(total.minutes_on(day(1)), 2);
  }

  #[test]
  fn test_credit_rolls_over_at_new_day() {
    let mut total = DailyTotal::new(day(1));
    total.credit(day(1), 600);
    assert_eq!(total.seconds_on(day(2)), 0);
    total.credit(day(2), 6);
    assert_eq!(total, DailyTotal { total_focused_seconds: 6, date: day(2) });
  }

  #[test]
  fn test_missing_file_is_zero() {
    let dir = TempDir::new().unwrap();
    let store = DailyStore::new(dir.path().join("daily.json"));
    assert_eq!(store.load(day(1)), DailyTotal::new(day(1)));
  }

  #[test]
  fn test_save_then_load_today() {
    let dir = TempDir::new().unwrap();
    let store = DailyStore::new(dir.path().join("nested").join("daily.json"));
    let mut total = DailyTotal::new(day(1));
    total.credit(day(1), 42);
    store.save(&total).unwrap();
    assert_eq!(store.load(day(1)), total);
  }

  #[test]
  fn test_stale_date_is_zero() {
    let dir = TempDir::new().unwrap();
    let store = DailyStore::new(dir.path().join("daily.json"));
    let mut total = DailyTotal::new(day(1));
    total.credit(day(1), 42);
    store.save(&total).unwrap();
    assert_eq!(store.load(day(2)), DailyTotal::new(day(2)));
  }

  #[test]
  fn test_file_format() {
    let dir = TempDir::new().unwrap();
    let store = DailyStore::new(dir.path().join("daily.json"));
    let mut total = DailyTotal::new(day(5));
    total.credit(day(5), 90);
    store.save(&total).unwrap();
    let written = fs::read_to_string(store.path()).unwrap();
    assert_eq!(written, r#"{"total_focused_seconds":90,"date":"2024-03-05"}"#);
  }

  #[test]
  fn test_corrupt_file_is_zero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("daily.json");
    fs::write(&path, "{not json").unwrap();
    assert_eq!(DailyStore::new(path).load(day(1)), DailyTotal::new(day(1)));
  }
}
