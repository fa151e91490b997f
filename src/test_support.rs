//! Helpers shared by unit tests.

use std::{
  io,
  sync::{Arc, Mutex},
};

use tracing::subscriber::DefaultGuard;

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
  /// Route this thread's tracing output into the capture until the guard drops.
  pub fn install(&self) -> DefaultGuard {
    let sink = self.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(move || sink.clone())
      .with_max_level(tracing::Level::TRACE)
      .with_target(true)
      .with_ansi(false)
      .finish();
    tracing::subscriber::set_default(subscriber)
  }

  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }

  /// Lines emitted at `level` for `target` that contain `needle`.
  pub fn lines_with(&self, level: &str, target: &str, needle: &str) -> Vec<String> {
    let target = format!("{target}:");
    self
      .contents()
      .lines()
      .filter(|l| l.contains(level) && l.contains(&target) && l.contains(needle))
      .map(str::to_string)
      .collect()
  }
}

impl io::Write for LogCapture {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
