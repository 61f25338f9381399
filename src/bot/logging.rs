use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rotate the log file once it reaches 32 MiB
pub const MAX_LOG_BYTES: u64 = 32 * 1024 * 1024;

/// Number of rotated files kept next to the live one
pub const LOG_BACKUPS: usize = 3;

const TARGET_WIDTH: usize = 20;

/// Install the console and rotating-file subscribers.
///
/// Both layers share the `time | LEVEL | target : message` layout; only the
/// console one is colored.
pub fn init(log_dir: &Path) -> io::Result<()> {
    let file = RotatingFile::open(log_dir.join("cadence.log"), MAX_LOG_BYTES, LOG_BACKUPS)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(PipeFormat { ansi: true })
                .with_writer(io::stdout),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(PipeFormat { ansi: false })
                .with_writer(file),
        )
        .init();

    Ok(())
}

/// `2024-01-01 12:00:00 |     INFO |      cadence::bot : message`
pub struct PipeFormat {
    pub ansi: bool,
}

impl<S, N> FormatEvent<S, N> for PipeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let target = fit_target(meta.target());

        if self.ansi {
            write!(
                writer,
                "{} | {}{:>8}\x1b[0m | {:>width$} : ",
                timestamp,
                level_color(meta.level()),
                meta.level().as_str(),
                target,
                width = TARGET_WIDTH
            )?;
        } else {
            write!(
                writer,
                "{} | {:>8} | {:>width$} : ",
                timestamp,
                meta.level().as_str(),
                target,
                width = TARGET_WIDTH
            )?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[1;31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[36m",
        Level::TRACE => "\x1b[35m",
    }
}

/// Keep the rightmost characters of long module paths so columns line up
fn fit_target(target: &str) -> &str {
    let count = target.chars().count();
    if count <= TARGET_WIDTH {
        return target;
    }
    let skip = count - TARGET_WIDTH;
    let start = target
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &target[start..]
}

/// Size-bounded log file: `name.log`, `name.log.1` .. `name.log.N`
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    state: Mutex<FileState>,
}

struct FileState {
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: PathBuf, max_bytes: u64, backups: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backups,
            state: Mutex::new(FileState { file, written }),
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&self, state: &mut FileState) -> io::Result<()> {
        state.file.flush()?;

        if self.backups > 0 {
            let oldest = self.backup_path(self.backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.written = 0;
        Ok(())
    }

    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.written > 0 && state.written + buf.len() as u64 > self.max_bytes {
            self.rotate(&mut state)?;
        }
        state.file.write_all(buf)?;
        state.written += buf.len() as u64;
        Ok(buf.len())
    }
}

pub struct RotatingWriter<'a> {
    target: &'a RotatingFile,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .target
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { target: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_target() {
        assert_eq!(fit_target("cadence"), "cadence");
        let long = "cadence::services::audio::controller";
        let fitted = fit_target(long);
        assert_eq!(fitted.chars().count(), TARGET_WIDTH);
        assert!(long.ends_with(fitted));
    }

    #[test]
    fn test_rotation_keeps_bounded_backups() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path();
        let log = RotatingFile::open(dir.join("test.log"), 16, 2).unwrap();
        let mut writer = log.make_writer();

        for _ in 0..5 {
            writer.write_all(b"0123456789\n").unwrap();
        }

        assert!(dir.join("test.log").exists());
        assert!(dir.join("test.log.1").exists());
        assert!(dir.join("test.log.2").exists());
        assert!(!dir.join("test.log.3").exists());
        assert_eq!(fs::read_to_string(dir.join("test.log")).unwrap(), "0123456789\n");
    }
}
