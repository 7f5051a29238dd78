//! "I can't focus" modal: fetches a random cat picture and draws it with
//! half-block characters, two pixels per terminal cell.
//!
//! Every open starts a new request with a cache-busting query so the
//! endpoint hands out a fresh cat. Answers to an older request, or arriving
//! after the modal was closed, are dropped.

use std::time::Duration;

use image::imageops::FilterType;
use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::tui::Event;

pub const PICTURE_COLUMNS: u32 = 48;
pub const PICTURE_PIXEL_ROWS: u32 = 48;
pub const FETCH_TIMEOUT_SECS: u64 = 15;    // Whole request, body included

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatError {
  #[error("request failed: {0}")]
  Request(String),
  #[error("could not decode image: {0}")]
  Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatPicture {
  pub width: u32,
  pub height: u32,
  pixels: Vec<[u8; 3]>,
}

impl CatPicture {
  pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    self.pixels.get((y * self.width + x) as usize).copied()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatView {
  Closed,
  Loading,
  Ready(CatPicture),
  Failed(String),
}

#[derive(Debug)]
pub struct CatModal {
  base_url: String,
  client: reqwest::Client,
  view: CatView,
  request: u64,
  cancel: Option<CancellationToken>,
}

impl CatModal {
  pub fn new(base_url: impl Into<String>) -> Result<Self, CatError> {
    Self::with_timeout(base_url, Duration::from_secs(FETCH_TIMEOUT_SECS))
  }

  /// A fetch that takes longer than `timeout` ends in `CatView::Failed`.
  pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatError> {
    let client = reqwest::Client::builder()
      .connect_timeout(timeout)
      .timeout(timeout)
      .build()
      .map_err(|e| CatError::Request(e.to_string()))?;
    Ok(Self {
      base_url: base_url.into(),
      client,
      view: CatView::Closed,
      request: 0,
      cancel: None,
    })
  }

  pub fn is_open(&self) -> bool {
    self.view != CatView::Closed
  }

  pub fn view(&self) -> &CatView {
    &self.view
  }

  pub fn open(&mut self, events: &UnboundedSender<Event>) {
    self.cancel_request();
    self.request += 1;
    self.view = CatView::Loading;

    let millis = chrono::Utc::now().timestamp_millis();
    let url = cache_busted_url(&self.base_url, millis);
    info!("Fetching cat #{} from {}", self.request, url);

    let token = CancellationToken::new();
    self.cancel = Some(token.clone());
    let request = self.request;
    let client = self.client.clone();
    let events = events.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = token.cancelled() => {
          debug!("Cat #{} cancelled", request);
        }
        result = fetch_picture(&client, &url) => {
          if events.send(Event::Cat { request, result }).is_err() {
            debug!("Cat #{} finished after the app went away", request);
          }
        }
      }
    });
  }

  pub fn close(&mut self) {
    self.cancel_request();
    self.view = CatView::Closed;
  }

  pub fn receive(&mut self, request: u64, result: Result<CatPicture, CatError>) {
    if request != self.request || self.view != CatView::Loading {
      debug!("Dropping stale cat #{}", request);
      return;
    }
    self.cancel = None;
    self.view = match result {
      Ok(picture) => CatView::Ready(picture),
      Err(e) => {
        info!("Cat #{} failed: {}", request, e);
        CatView::Failed(e.to_string())
      }
    };
  }

  fn cancel_request(&mut self) {
    if let Some(token) = self.cancel.take() {
      token.cancel();
    }
  }
}

impl Drop for CatModal {
  fn drop(&mut self) {
    self.cancel_request();
  }
}

pub fn cache_busted_url(base: &str, millis: i64) -> String {
  let separator = if base.contains('?') { '&' } else { '?' };
  format!("{}{}_={}", base, separator, millis)
}

async fn fetch_picture(client: &reqwest::Client, url: &str) -> Result<CatPicture, CatError> {
  let response = client.get(url)
    .send()
    .await
    .and_then(|r| r.error_for_status())
    .map_err(|e| CatError::Request(e.to_string()))?;
  let bytes = response.bytes().await.map_err(|e| CatError::Request(e.to_string()))?;
  tokio::task::spawn_blocking(move || decode_picture(&bytes, PICTURE_COLUMNS, PICTURE_PIXEL_ROWS))
    .await
    .map_err(|e| CatError::Decode(e.to_string()))?
}

/// Decodes and shrinks an image to fit `max_width` x `max_height` pixels,
/// keeping its aspect ratio.
pub fn decode_picture(bytes: &[u8], max_width: u32, max_height: u32) -> Result<CatPicture, CatError> {
  let image = image::load_from_memory(bytes).map_err(|e| CatError::Decode(e.to_string()))?;
  let image = image.resize(max_width, max_height, FilterType::Triangle).to_rgb8();
  let (width, height) = image.dimensions();
  let pixels = image.pixels().map(|p| p.0).collect();
  Ok(CatPicture { width, height, pixels })
}

/// Draws a picture centred in the area, cropping whatever does not fit.
pub struct PictureView<'a>(pub &'a CatPicture);

impl Widget for PictureView<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    let picture = self.0;
    let cols = (picture.width.min(u16::MAX as u32) as u16).min(area.width);
    let rows = (((picture.height + 1) / 2).min(u16::MAX as u32) as u16).min(area.height);
    let left = area.x + (area.width - cols) / 2;
    let top = area.y + (area.height - rows) / 2;

    for row in 0..rows {
      for col in 0..cols {
        let (x, y) = (col as u32, row as u32 * 2);
        let Some(upper) = picture.pixel(x, y) else { continue };
        let lower = picture.pixel(x, y + 1).unwrap_or(upper);
        buf.get_mut(left + col, top + row)
          .set_symbol("▀")
          .set_fg(rgb(upper))
          .set_bg(rgb(lower));
      }
    }
  }
}

fn rgb([r, g, b]: [u8; 3]) -> Color {
  Color::Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
  use std::io::Cursor;

  fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgb<u8>) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, f);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
      .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
      .unwrap();
    bytes
  }

  fn picture(width: u32, height: u32, pixels: Vec<[u8; 3]>) -> CatPicture {
    CatPicture { width, height, pixels }
  }

  #[test]
  fn test_cache_busted_url() {
    assert_eq!(cache_busted_url("https://cataas.com/cat", 1700000000000), "https://cataas.com/cat?_=1700000000000");
    assert_eq!(cache_busted_url("https://cataas.com/cat?type=square", 5), "https://cataas.com/cat?type=square&_=5");
  }

  #[test]
  fn test_decode_fits_and_keeps_aspect() {
    let bytes = png(200, 100, |_, _| Rgb([10, 20, 30]));
    let picture = decode_picture(&bytes, 48, 48).unwrap();
    assert_eq!((picture.width, picture.height), (48, 24));
    assert_eq!(picture.pixel(0, 0), Some([10, 20, 30]));
    assert_eq!(picture.pixel(48, 0), None);
  }

  #[test]
  fn test_decode_garbage_fails() {
    let result = decode_picture(b"definitely not a cat", 48, 48);
    assert!(matches!(result, Err(CatError::Decode(_))));
  }

  #[test]
  fn test_picture_view_half_blocks() {
    let pic = picture(2, 2, vec![[255, 0, 0], [0, 255, 0], [0, 0, 255], [9, 9, 9]]);
    let area = Rect::new(0, 0, 2, 1);
    let mut buf = Buffer::empty(area);
    PictureView(&pic).render(area, &mut buf);
    assert_eq!(buf.get(0, 0).fg, Color::Rgb(255, 0, 0));
    assert_eq!(buf.get(0, 0).bg, Color::Rgb(0, 0, 255));
    assert_eq!(buf.get(1, 0).fg, Color::Rgb(0, 255, 0));
    assert_eq!(buf.get(1, 0).bg, Color::Rgb(9, 9, 9));
  }

  #[test]
  fn test_picture_view_centres_and_crops() {
    let pic = picture(1, 1, vec![[1, 2, 3]]);
    let area = Rect::new(0, 0, 5, 3);
    let mut buf = Buffer::empty(area);
    PictureView(&pic).render(area, &mut buf);
    // Odd height: the lone pixel fills both halves.
    assert_eq!(buf.get(2, 1).fg, Color::Rgb(1, 2, 3));
    assert_eq!(buf.get(2, 1).bg, Color::Rgb(1, 2, 3));
    assert_eq!(buf.get(0, 0).fg, Color::Reset);

    let wide = picture(10, 2, vec![[7, 7, 7]; 20]);
    let small = Rect::new(0, 0, 4, 1);
    let mut buf = Buffer::empty(small);
    PictureView(&wide).render(small, &mut buf);
    assert_eq!(buf.get(3, 0).fg, Color::Rgb(7, 7, 7));
  }

  #[tokio::test]
  async fn test_stale_results_are_dropped() {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let mut modal = CatModal::new("http://127.0.0.1:9/cat").unwrap();
    modal.open(&tx);
    let first = modal.request;
    modal.open(&tx);
    modal.receive(first, Ok(picture(1, 1, vec![[0, 0, 0]])));
    assert_eq!(modal.view(), &CatView::Loading);

    modal.close();
    modal.receive(first + 1, Ok(picture(1, 1, vec![[0, 0, 0]])));
    assert_eq!(modal.view(), &CatView::Closed);
    assert!(!modal.is_open());
  }

  #[tokio::test]
  async fn test_current_result_is_shown() {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let mut modal = CatModal::new("http://127.0.0.1:9/cat").unwrap();
    modal.open(&tx);
    let pic = picture(1, 1, vec![[4, 5, 6]]);
    modal.receive(modal.request, Ok(pic.clone()));
    assert_eq!(modal.view(), &CatView::Ready(pic));
  }

  #[tokio::test]
  async fn test_unreachable_endpoint_ends_in_failure() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut modal = CatModal::new("http://127.0.0.1:9/cat").unwrap();
    modal.open(&tx);
    assert_eq!(modal.view(), &CatView::Loading);
    match rx.recv().await {
      Some(Event::Cat { request, result }) => {
        assert!(matches!(result, Err(CatError::Request(_))));
        modal.receive(request, result);
      }
      other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(modal.view(), CatView::Failed(_)));
  }

  #[tokio::test]
  async fn test_silent_endpoint_times_out() {
    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut modal = CatModal::with_timeout(format!("http://{}/cat", addr), Duration::from_millis(200)).unwrap();
    modal.open(&tx);
    let event = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await
      .expect("fetch should give up on its own");
    match event {
      Some(Event::Cat { request, result }) => {
        assert!(matches!(result, Err(CatError::Request(_))));
        modal.receive(request, result);
      }
      other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(modal.view(), CatView::Failed(_)));
    server.abort();
  }
}
