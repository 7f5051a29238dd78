//! Settings read from `pomocat.ini`.
//!
//! ```ini
//! [pomocat]
//! focus = 25
//! break = 5
//! focusoptions = 15, 25, 50
//! breakoptions = 3, 5, 10
//! caturl = https://cataas.com/cat
//! player = paplay
//! datafile = /home/me/.pomocat.json
//! ```
//!
//! Durations are in minutes and may be fractional. Bad values are reported
//! and replaced by their defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::daily::DailyStore;
use crate::timer::{minutes_to_secs, TimerConfig, TimerError};

pub const CONF_FILE_NAME: &str = "pomocat.ini";
const SECTION: &str = "pomocat";

pub const DEFAULT_FOCUS_MINUTES: f64 = 0.1;   // 6 seconds
pub const DEFAULT_BREAK_MINUTES: f64 = 0.05;  // 3 seconds
pub const DEFAULT_FOCUS_OPTIONS: [f64; 3] = [0.1, 1.0, 2.0];
pub const DEFAULT_BREAK_OPTIONS: [f64; 3] = [0.05, 1.0, 2.0];
pub const DEFAULT_CAT_URL: &str = "https://cataas.com/cat";

// Configuration validation constants
const MIN_MINUTES: f64 = 1.0 / 60.0;          // One second
const MAX_MINUTES: f64 = 180.0;
const MAX_OPTIONS: usize = 9;

pub type IniMap = HashMap<String, HashMap<String, Option<String>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub focus_minutes: f64,
  pub break_minutes: f64,
  pub focus_options: Vec<f64>,
  pub break_options: Vec<f64>,
  pub cat_url: String,
  pub player: Option<String>,
  pub data_file: PathBuf,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      focus_minutes: DEFAULT_FOCUS_MINUTES,
      break_minutes: DEFAULT_BREAK_MINUTES,
      focus_options: DEFAULT_FOCUS_OPTIONS.to_vec(),
      break_options: DEFAULT_BREAK_OPTIONS.to_vec(),
      cat_url: DEFAULT_CAT_URL.to_string(),
      player: None,
      data_file: DailyStore::default_path(),
    }
  }
}

impl Settings {
  /// Reads the ini file, falling back to defaults when it is missing.
  pub fn load(file_name: &str) -> Self {
    info!("Reading config from {}", file_name);
    let inimap = match ini!(safe file_name) {
      Ok(map) => map,
      Err(error) => {
        eprintln!("Warning: Couldn't load config file '{}': {}", file_name, error);
        eprintln!("Continuing with default values.");
        info!("Using default configuration");
        IniMap::new()
      }
    };

    for (key, value) in &inimap {
      info!("{} / {:?}", key, value);
    }
    Self::from_ini(&inimap)
  }

  pub fn from_ini(inimap: &IniMap) -> Self {
    let mut settings = Self::default();
    let Some(section) = inimap.get(SECTION) else {
      return settings;
    };
    let value = |key: &str| section.get(key).and_then(|v| v.as_deref());

    if let Some(val) = value("focus") {
      settings.focus_minutes = parse_minutes_config(val, "focus", DEFAULT_FOCUS_MINUTES);
      info!("Set focus to: {} minutes", settings.focus_minutes);
    }
    if let Some(val) = value("break") {
      settings.break_minutes = parse_minutes_config(val, "break", DEFAULT_BREAK_MINUTES);
      info!("Set break to: {} minutes", settings.break_minutes);
    }
    if let Some(val) = value("focusoptions") {
      settings.focus_options = parse_options_config(val, "focusoptions", &DEFAULT_FOCUS_OPTIONS);
    }
    if let Some(val) = value("breakoptions") {
      settings.break_options = parse_options_config(val, "breakoptions", &DEFAULT_BREAK_OPTIONS);
    }
    if let Some(val) = value("caturl").map(str::trim).filter(|v| !v.is_empty()) {
      settings.cat_url = val.to_string();
    }
    if let Some(val) = value("player").map(str::trim).filter(|v| !v.is_empty()) {
      settings.player = Some(val.to_string());
    }
    if let Some(val) = value("datafile").map(str::trim).filter(|v| !v.is_empty()) {
      settings.data_file = PathBuf::from(val);
    }
    settings
  }

  pub fn timer_config(&self) -> Result<TimerConfig, TimerError> {
    TimerConfig::new(minutes_to_secs(self.focus_minutes)?, minutes_to_secs(self.break_minutes)?)
  }
}

/// Parse and validate a duration in minutes
fn parse_minutes_config(value: &str, config_name: &str, default: f64) -> f64 {
  match value.trim().parse::<f64>() {
    Ok(minutes) if (MIN_MINUTES..=MAX_MINUTES).contains(&minutes) => minutes,
    Ok(minutes) => {
      warn!("Config value '{}' = {} is out of valid range [{:.3}, {}], using default {}",
            config_name, minutes, MIN_MINUTES, MAX_MINUTES, default);
      eprintln!("Warning: {} value {} out of range, using default {}", config_name, minutes, default);
      default
    }
    Err(e) => {
      warn!("Failed to parse config value '{}' = '{}': {}, using default {}",
            config_name, value, e, default);
      eprintln!("Warning: Invalid {} value '{}', using default {}", config_name, value, default);
      default
    }
  }
}

/// Parse a comma separated list of minute presets; invalid entries are dropped.
fn parse_options_config(value: &str, config_name: &str, defaults: &[f64]) -> Vec<f64> {
  let options: Vec<f64> = value.split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .filter_map(|s| match s.parse::<f64>() {
      Ok(minutes) if (MIN_MINUTES..=MAX_MINUTES).contains(&minutes) => Some(minutes),
      _ => {
        warn!("Ignoring invalid {} entry '{}'", config_name, s);
        None
      }
    })
    .take(MAX_OPTIONS)
    .collect();

  if options.is_empty() {
    warn!("{} list is empty, using defaults", config_name);
    eprintln!("Warning: No valid values in {}, using defaults", config_name);
    defaults.to_vec()
  } else {
    options
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn inimap(pairs: &[(&str, &str)]) -> IniMap {
    let section = pairs.iter()
      .map(|(k, v)| (k.to_string(), Some(v.to_string())))
      .collect();
    IniMap::from([(SECTION.to_string(), section)])
  }

  #[test]
  fn test_defaults_without_section() {
    let settings = Settings::from_ini(&IniMap::new());
    assert_eq!(settings.focus_minutes, DEFAULT_FOCUS_MINUTES);
    assert_eq!(settings.break_minutes, DEFAULT_BREAK_MINUTES);
    assert_eq!(settings.cat_url, DEFAULT_CAT_URL);
    assert_eq!(settings.player, None);
    assert_eq!(settings.timer_config().unwrap(), TimerConfig::new(6, 3).unwrap());
  }

  #[test]
  fn test_full_section() {
    let settings = Settings::from_ini(&inimap(&[
      ("focus", "25"),
      ("break", "5"),
      ("focusoptions", "15, 25,50"),
      ("breakoptions", "3,5"),
      ("caturl", "http://localhost:8080/cat"),
      ("player", "aplay"),
      ("datafile", "/tmp/pomocat.json"),
    ]));
    assert_eq!(settings.focus_minutes, 25.0);
    assert_eq!(settings.break_minutes, 5.0);
    assert_eq!(settings.focus_options, vec![15.0, 25.0, 50.0]);
    assert_eq!(settings.break_options, vec![3.0, 5.0]);
    assert_eq!(settings.cat_url, "http://localhost:8080/cat");
    assert_eq!(settings.player.as_deref(), Some("aplay"));
    assert_eq!(settings.data_file, PathBuf::from("/tmp/pomocat.json"));
    assert_eq!(settings.timer_config().unwrap(), TimerConfig::new(1500, 300).unwrap());
  }

  #[test]
  fn test_parse_minutes_config_valid() {
    assert_eq!(parse_minutes_config("0.5", "test", 1.0), 0.5);
    assert_eq!(parse_minutes_config(" 2 ", "test", 1.0), 2.0);
  }

  #[test]
  fn test_parse_minutes_config_zero() {
    assert_eq!(parse_minutes_config("0", "test", 1.0), 1.0);
  }

  #[test]
  fn test_parse_minutes_config_negative() {
    assert_eq!(parse_minutes_config("-10", "test", 1.0), 1.0);
  }

  #[test]
  fn test_parse_minutes_config_too_high() {
    assert_eq!(parse_minutes_config("500", "test", 1.0), 1.0);
  }

  #[test]
  fn test_parse_minutes_config_invalid() {
    assert_eq!(parse_minutes_config("soon", "test", 1.0), 1.0);
  }

  #[test]
  fn test_parse_minutes_config_at_max_boundary() {
    assert_eq!(parse_minutes_config("180", "test", 1.0), 180.0);
  }

  #[test]
  fn test_parse_options_drops_bad_entries() {
    assert_eq!(parse_options_config("1, x, -2, 3,", "test", &[9.0]), vec![1.0, 3.0]);
  }

  #[test]
  fn test_parse_options_all_bad_uses_defaults() {
    assert_eq!(parse_options_config("x,,0", "test", &[9.0]), vec![9.0]);
  }

  #[test]
  fn test_parse_options_caps_length() {
    assert_eq!(parse_options_config("1,2,3,4,5,6,7,8,9,10,11", "test", &[9.0]).len(), MAX_OPTIONS);
  }

  #[test]
  fn test_blank_strings_keep_defaults() {
    let settings = Settings::from_ini(&inimap(&[("caturl", "  "), ("player", "")]));
    assert_eq!(settings.cat_url, DEFAULT_CAT_URL);
    assert_eq!(settings.player, None);
  }
}
