use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;

use crate::pipeline::BlockState;

/// Position of the pipeline within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Blocks that have reached a terminal state (1-based)
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f64 / self.total as f64
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.1}%)", self.current, self.total, self.percent())
    }
}

/// Receives a notification each time a block reaches a terminal state.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: Progress, state: BlockState);

    fn finish(&self) {}
}

/// Reports progress through the log.
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, progress: Progress, state: BlockState) {
        info!("Block {} {}", progress, state);
    }
}

/// Stderr log sink that hides the active progress bar while a line is written.
///
/// Install it as the console writer of the tracing subscriber and hand the same
/// handle to `BarReporter::with_console`.
#[derive(Clone, Default)]
pub struct ConsoleWriter {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, bar: ProgressBar) {
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn detach(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            *slot = None;
        }
    }

    pub fn has_bar(&self) -> bool {
        self.bar.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.active_bar() {
            Some(bar) => bar.suspend(|| io::stderr().write_all(buf)).map(|_| buf.len()),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Reports progress on an indicatif bar in the terminal.
pub struct BarReporter {
    bar: ProgressBar,
    console: Option<ConsoleWriter>,
}

impl BarReporter {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar, console: None }
    }

    /// Route console log lines around this bar until it finishes.
    pub fn with_console(mut self, console: ConsoleWriter) -> Self {
        console.attach(self.bar.clone());
        self.console = Some(console);
        self
    }

    fn release_console(&self) {
        if let Some(console) = &self.console {
            console.detach();
        }
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        self.release_console();
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, progress: Progress, state: BlockState) {
        self.bar.set_position(progress.current as u64);
        self.bar.set_message(state.to_string());
    }

    fn finish(&self) {
        self.bar.finish_with_message("done");
        self.release_console();
    }
}
