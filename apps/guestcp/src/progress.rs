//! Terminal progress display.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use guestcp_transfer::{CopyCallbacks, SpeedCalculator};

const REDRAW_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Default)]
struct EntryState {
    name: String,
    size: u64,
    last_bytes: u64,
    last_draw: Option<Instant>,
}

struct Display {
    speed: SpeedCalculator,
    entry: Mutex<EntryState>,
}

impl Display {
    fn start(&self, name: &str, size: u64) {
        self.speed.reset();
        *self.entry.lock().unwrap() = EntryState {
            name: name.to_string(),
            size,
            ..EntryState::default()
        };
    }

    fn progress(&self, bytes: u64) {
        let mut entry = self.entry.lock().unwrap();
        self.speed.add_sample(bytes.saturating_sub(entry.last_bytes));
        entry.last_bytes = bytes;

        let now = Instant::now();
        if entry
            .last_draw
            .is_some_and(|t| now.duration_since(t) < REDRAW_INTERVAL)
        {
            return;
        }
        entry.last_draw = Some(now);

        let rate = self.speed.bytes_per_second();
        let eta = self
            .speed
            .eta(entry.size.saturating_sub(bytes))
            .map(|d| format!(" eta {}s", d.as_secs()))
            .unwrap_or_default();
        let mut err = std::io::stderr().lock();
        let _ = write!(
            err,
            "\r{} {}/{} {}/s{}\x1b[K",
            entry.name,
            format_bytes(bytes),
            format_bytes(entry.size),
            format_bytes(rate as u64),
            eta,
        );
        let _ = err.flush();
    }

    fn end(&self, name: &str) {
        let entry = self.entry.lock().unwrap();
        let _ = writeln!(
            std::io::stderr().lock(),
            "\r{name} {}\x1b[K",
            format_bytes(entry.size)
        );
    }
}

/// Builds callbacks that draw a one-line progress display on stderr.
pub fn terminal_callbacks() -> CopyCallbacks {
    let display = Arc::new(Display {
        speed: SpeedCalculator::new(None, None),
        entry: Mutex::new(EntryState::default()),
    });
    let (d1, d2, d3) = (display.clone(), display.clone(), display);
    CopyCallbacks::new()
        .on_entry_start(move |name, size| d1.start(name, size))
        .on_progress(move |bytes| d2.progress(bytes))
        .on_entry_end(move |name| d3.end(name))
}

/// Formats a byte count with a binary unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
