//! Terminal progress for an analysis run.
//!
//! Writes a single updating line to stderr while files are processed.
//! Disabled in quiet mode and when stderr is not a terminal.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress line writer shared by all workers.
pub struct RunProgress {
    show_output: bool,
    started: AtomicBool,
}

impl RunProgress {
    pub fn new(show_output: bool) -> Self {
        Self {
            show_output: show_output && io::stderr().is_terminal(),
            started: AtomicBool::new(false),
        }
    }

    /// Progress with output disabled.
    pub fn quiet() -> Self {
        Self {
            show_output: false,
            started: AtomicBool::new(false),
        }
    }

    /// Report that the run is starting.
    pub fn start(&self, file_count: usize, workers: usize, provider: &str) {
        if !self.show_output {
            return;
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            eprintln!(
                "Analyzing {} file{} with {} ({} worker{})",
                file_count,
                plural(file_count),
                provider,
                workers,
                plural(workers)
            );
        }
    }

    /// Update the progress line.
    pub fn update(&self, completed: usize, total: usize) {
        if self.show_output {
            eprint!("\r  [{}/{}] Processing files...", completed, total);
            let _ = io::stderr().flush();
        }
    }

    /// Clear the progress line.
    pub fn finish(&self) {
        if self.show_output && self.started.load(Ordering::SeqCst) {
            eprint!("\r{:52}\r", "");
            let _ = io::stderr().flush();
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Format token count for display.
pub fn format_tokens(tokens: usize) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{}K", tokens / 1_000)
    } else {
        format!("{}", tokens)
    }
}
