//! Log sink.
//!
//! An `env_logger` logger behind a thin [`log::Log`] wrapper. The wrapper lets the detached daemon
//! send its output to an append-mode file and raise the level, after the console is gone.

use chrono::Local;
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Where formatted lines end up.
enum Sink {
    Console,
    File(File),
}

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Sink>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sink = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;
        match &mut *sink {
            Sink::Console => io::stderr().write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sink = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;
        match &mut *sink {
            Sink::Console => io::stderr().flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

struct SwitchableLogger {
    inner: env_logger::Logger,
    level: Arc<RwLock<LevelFilter>>,
}

impl SwitchableLogger {
    fn level(&self) -> LevelFilter {
        self.level.read().map(|l| *l).unwrap_or(LevelFilter::Warn)
    }
}

impl Log for SwitchableLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn format_line(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    writeln!(
        buf,
        "{} alive[{}] {:<5} {}",
        Local::now().format("%b %e %H:%M:%S"),
        std::process::id(),
        record.level(),
        record.args()
    )
}

/// Handle to the installed logger.
#[derive(Clone)]
pub struct LogHandle {
    sink: Arc<Mutex<Sink>>,
    level: Arc<RwLock<LevelFilter>>,
}

impl LogHandle {
    pub fn level(&self) -> LevelFilter {
        self.level.read().map(|l| *l).unwrap_or(LevelFilter::Warn)
    }

    /// Raises the level to at least `level`. Never lowers it.
    pub fn raise_level(&self, level: LevelFilter) {
        if let Ok(mut current) = self.level.write() {
            if level > *current {
                *current = level;
                log::set_max_level(level);
            }
        }
    }

    /// Sends all further output to `path` (appending), and logs at least `info`.
    pub fn redirect_to_file(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut sink) = self.sink.lock() {
            *sink = Sink::File(file);
        }
        self.raise_level(LevelFilter::Info);
        Ok(())
    }

    /// Tries [`redirect_to_file`](Self::redirect_to_file) on each path in turn and returns the
    /// one now in use. On failure the sink is left untouched.
    pub fn redirect_to_first(&self, paths: &[PathBuf]) -> io::Result<PathBuf> {
        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no log file configured");
        for path in paths {
            match self.redirect_to_file(path) {
                Ok(()) => return Ok(path.clone()),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

/// `--debug` wins over `--verbose`, the default is `warn`.
pub fn level_for(verbose: bool, debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

/// Installs the global logger. `RUST_LOG=trace` additionally shows the raw protocol exchanges.
pub fn init(level: LevelFilter) -> Result<LogHandle, log::SetLoggerError> {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .map_or(level, |from_env| from_env.max(level));

    let sink = Arc::new(Mutex::new(Sink::Console));
    let inner = Builder::new()
        .filter_level(LevelFilter::Trace)
        .format(format_line)
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(SharedWriter(sink.clone()))))
        .build();

    let level = Arc::new(RwLock::new(level));
    let handle = LogHandle {
        sink,
        level: level.clone(),
    };

    log::set_boxed_logger(Box::new(SwitchableLogger { inner, level }))?;
    log::set_max_level(handle.level());
    Ok(handle)
}
