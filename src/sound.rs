//! Notification ding, played through whatever audio player the host has.

use color_eyre::eyre::{eyre, Result, WrapErr};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempPath;
use tokio::process::Command;

const DING: &[u8] = include_bytes!("../assets/ding.wav");
const PLAYERS: [&str; 3] = ["paplay", "aplay", "afplay"];

#[derive(Debug, Clone)]
pub struct Sound {
  player: Option<String>,
  // Private, uniquely named copy of the ding; removed when the last clone drops.
  ding: Option<Arc<TempPath>>,
}

impl Sound {
  /// Without a ding file every play falls back to the terminal bell.
  pub fn new(player: Option<String>) -> Self {
    let ding = match write_ding() {
      Ok(path) => Some(Arc::new(path)),
      Err(e) => {
        warn!("Sound disabled: {:#}", e);
        None
      }
    };
    Self { player, ding }
  }

  /// Fire and forget. A failure is logged and falls back to the terminal bell.
  pub fn play(&self) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
      debug!("No runtime to play sound on");
      return;
    };
    let Some(ding) = self.ding.clone() else {
      ring_bell();
      return;
    };
    let player = self.player.clone();
    handle.spawn(async move {
      if let Err(e) = play_ding(player.as_deref(), &ding).await {
        info!("Error playing sound: {:#}", e);
        ring_bell();
      }
    });
  }
}

/// Writes the ding once, to a fresh file created with exclusive access.
fn write_ding() -> Result<TempPath> {
  let mut file = tempfile::Builder::new()
    .prefix("pomocat-ding-")
    .suffix(".wav")
    .tempfile()
    .wrap_err("Failed to create sound file")?;
  file.write_all(DING).wrap_err("Failed to write sound file")?;
  file.flush()?;
  Ok(file.into_temp_path())
}

fn player_candidates(player: Option<&str>) -> Vec<Vec<String>> {
  match player {
    Some(player) => vec![player.split_whitespace().map(String::from).collect()],
    None => PLAYERS.iter().map(|p| vec![p.to_string()]).collect(),
  }
}

async fn play_ding(player: Option<&str>, path: &Path) -> Result<()> {
  for argv in player_candidates(player) {
    let Some((program, args)) = argv.split_first() else {
      continue;
    };
    let status = Command::new(program)
      .args(args)
      .arg(path)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .await;
    match status {
      Ok(status) if status.success() => return Ok(()),
      Ok(status) => return Err(eyre!("{} exited with {}", program, status)),
      Err(e) if e.kind() == ErrorKind::NotFound => continue,
      Err(e) => return Err(e).wrap_err_with(|| format!("Failed to run {}", program)),
    }
  }
  Err(eyre!("No audio player found"))
}

fn ring_bell() {
  let mut stderr = std::io::stderr();
  let _ = stderr.write_all(b"\x07");
  let _ = stderr.flush();
}
