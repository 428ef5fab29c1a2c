//! Structured logging with timestamps, source locations, and ANSI colour support.
//!
//! Provides the [`plog!`] macro for consistent log output in the format:
//!
//! ```text
//! 20261017T09:14:03.512 - src/web/handlers/profiles.rs:88 - create: profile #3 (alice)
//! ```
//!
//! When writing to a terminal, timestamps and source locations are dimmed and
//! profile references get a stable colour derived from their id.
//!
//! By default log lines go to stderr.  Call [`set_writer`] to redirect output
//! to any [`std::io::Write`] implementor.  Installing a custom writer also
//! disables ANSI colour codes.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::SystemTime;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_WRITER: LazyLock<Mutex<Box<dyn Write + Send>>> =
    LazyLock::new(|| Mutex::new(Box::new(io::stderr())));

/// Initialize the logging system. Call once at startup before any logging.
pub fn init() {
    COLOUR_ENABLED.store(io::stderr().is_terminal(), Ordering::Relaxed);
}

/// Replace the log writer and turn colour off.
pub fn set_writer(w: Box<dyn Write + Send>) {
    COLOUR_ENABLED.store(false, Ordering::Relaxed);
    if let Ok(mut writer) = LOG_WRITER.lock() {
        *writer = w;
    }
}

pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", // bright red
    "\x1b[92m", // bright green
    "\x1b[93m", // bright yellow
    "\x1b[94m", // bright blue
    "\x1b[95m", // bright magenta
    "\x1b[96m", // bright cyan
];

fn id_colour(id: i64) -> &'static str {
    ID_COLOURS[(id.unsigned_abs() as usize) % ID_COLOURS.len()]
}

/// Format a profile reference, e.g. `#3 (alice)`.
pub fn profile_ref(id: i64, username: &str) -> String {
    if colour_enabled() {
        let colour = id_colour(id);
        format!("{colour}#{id} ({username}){RESET}")
    } else {
        format!("#{id} ({username})")
    }
}

/// Format a post reference, e.g. `post-12`.
pub fn post_ref(id: i64) -> String {
    if colour_enabled() {
        let colour = id_colour(id);
        format!("{colour}post-{id}{RESET}")
    } else {
        format!("post-{id}")
    }
}

/// Format the current wall-clock time as `YYYYMMDDTHH:MM:SS.mmm` (UTC).
pub fn format_timestamp() -> String {
    let duration = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_epoch_millis(duration.as_secs(), duration.subsec_millis())
}

fn format_epoch_millis(secs: u64, millis: u32) -> String {
    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    // Civil date from days since epoch (Howard Hinnant's algorithm).
    let days = (secs / 86400) as i64;
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}",
        y, m, d, hours, minutes, seconds, millis
    )
}

/// Write a single log line to the current writer.
///
/// Called by the [`plog!`] macro; not intended for direct use.
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    if let Ok(mut writer) = LOG_WRITER.lock() {
        let _ = writeln!(*writer, "{formatted}");
    }
}

/// Emit a log line with timestamp and source location.
///
/// ```ignore
/// plog!("delete: {} and {} post(s)", logging::profile_ref(id, &name), n);
/// ```
#[macro_export]
macro_rules! plog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}
