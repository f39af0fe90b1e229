use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

// ── Constants ───────────────────────────────────────────────────────────────

/// Number of buffered entries before an automatic flush.
const FLUSH_THRESHOLD: usize = 32;

/// Maximum log file size in bytes (8 MB) before rotation.
const MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Lines kept (from the end) when the file is rotated.
const ROTATION_KEEP_LINES: usize = 5_000;

// ── Logger ──────────────────────────────────────────────────────────────────

struct LoggerInner {
    buffer: VecDeque<String>,
    log_path: PathBuf,
}

/// Buffered file logger behind the `log` facade.
///
/// Entries accumulate in memory and hit disk every `FLUSH_THRESHOLD` lines;
/// an ERROR flushes immediately so the tail of the file is trustworthy
/// after a crash.
pub struct GameLogger {
    inner: Mutex<LoggerInner>,
    level: LevelFilter,
}

impl GameLogger {
    fn new(log_path: PathBuf, level: LevelFilter) -> Self {
        Self {
            inner: Mutex::new(LoggerInner {
                buffer: VecDeque::with_capacity(FLUSH_THRESHOLD),
                log_path,
            }),
            level,
        }
    }

    /// Append entries to disk. Caller must NOT hold `self.inner`.
    fn flush_to_disk(log_path: &PathBuf, entries: Vec<String>) {
        if entries.is_empty() {
            return;
        }

        Self::maybe_rotate(log_path, MAX_FILE_SIZE);

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
            for line in &entries {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    /// If the file exceeds `max_size`, keep only the newest
    /// `ROTATION_KEEP_LINES` lines.
    fn maybe_rotate(log_path: &PathBuf, max_size: u64) {
        let metadata = match fs::metadata(log_path) {
            Ok(m) => m,
            Err(_) => return, // file doesn't exist yet
        };
        if metadata.len() <= max_size {
            return;
        }

        let file = match File::open(log_path) {
            Ok(f) => f,
            Err(_) => return,
        };
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .collect();

        let keep_from = lines.len().saturating_sub(ROTATION_KEEP_LINES);
        if let Ok(mut file) = File::create(log_path) {
            for line in &lines[keep_from..] {
                let _ = writeln!(file, "{line}");
            }
        }
    }

    fn format_line(level: Level, module: &str, args: &std::fmt::Arguments<'_>) -> String {
        format!(
            "{} {:5} {}: {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            level,
            module,
            args
        )
    }

    /// Push a line and flush if warranted. Shared by `log` and the tests.
    fn push_line(&self, line: String, is_error: bool) {
        // Swap the buffer out under the lock, then flush outside the lock.
        let entries_to_flush = {
            let mut inner = self.inner.lock();
            inner.buffer.push_back(line);

            if is_error || inner.buffer.len() >= FLUSH_THRESHOLD {
                let drained: Vec<String> = inner.buffer.drain(..).collect();
                Some((inner.log_path.clone(), drained))
            } else {
                None
            }
        };

        if let Some((path, entries)) = entries_to_flush {
            Self::flush_to_disk(&path, entries);
        }
    }
}

impl Log for GameLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format_line(
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args(),
        );
        self.push_line(line, record.level() == Level::Error);
    }

    fn flush(&self) {
        let (path, entries) = {
            let mut inner = self.inner.lock();
            let drained: Vec<String> = inner.buffer.drain(..).collect();
            (inner.log_path.clone(), drained)
        };
        Self::flush_to_disk(&path, entries);
    }
}

// ── Public init ─────────────────────────────────────────────────────────────

/// Initialize the file logger and register it as the global `log` logger.
///
/// - Creates `log_dir` if it doesn't exist.
/// - Reads `FLAGPARTY_LOG` env var for the level (default: `info`).
/// - Log file: `<log_dir>/flagparty.log`
pub fn init_logger(log_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(&log_dir)?;

    let level = std::env::var("FLAGPARTY_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let log_path = log_dir.join("flagparty.log");

    let logger = GameLogger::new(log_path, level);
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);

    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
