//! Byte-level progress reporting for downloads

use indicatif::{ProgressBar, ProgressStyle};

/// Receives `(downloaded, total, delta)` as a transfer advances
pub trait TransportProgress: Send + Sync {
    fn update(&self, downloaded: u64, total: Option<u64>, delta: u64);

    /// Called once after the last chunk
    fn finish(&self) {}
}

impl<F> TransportProgress for F
where
    F: Fn(u64, Option<u64>, u64) + Send + Sync,
{
    fn update(&self, downloaded: u64, total: Option<u64>, delta: u64) {
        self(downloaded, total, delta)
    }
}

/// Terminal progress bar used by verbose transports
#[derive(Clone)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

impl ProgressBarReporter {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("   {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} {eta}")
            .map(|style| style.progress_chars("= "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(message.to_string());
        Self { bar }
    }
}

impl TransportProgress for ProgressBarReporter {
    fn update(&self, downloaded: u64, total: Option<u64>, delta: u64) {
        if let Some(total) = total {
            if self.bar.length() != Some(total) {
                self.bar.set_length(total);
            }
        }
        if delta == 0 {
            self.bar.set_position(downloaded);
        } else {
            self.bar.inc(delta);
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
