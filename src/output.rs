// File: output.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::Config;

/// Serialized line writer fanning out to any number of underlying writers.
/// Workers share one sink per log; the mutex keeps lines whole.
pub struct LineSink {
    writers: Mutex<Vec<Box<dyn Write + Send>>>,
}

impl LineSink {
    pub fn new(writers: Vec<Box<dyn Write + Send>>) -> Self {
        LineSink {
            writers: Mutex::new(writers),
        }
    }

    pub fn discard() -> Self {
        Self::new(Vec::new())
    }

    pub fn writeln(&self, line: &str) {
        let mut writers = match self.writers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for w in writers.iter_mut() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

fn open_log(path: &Path) -> Result<Box<dyn Write + Send>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(Box::new(file))
}

/// Findings go to the output file and stdout. With the progress bar up and
/// no file configured there is nowhere to put them, which deserves a loud
/// warning.
pub fn findings_sink(config: &Config) -> Result<LineSink> {
    match &config.out_file {
        Some(path) => {
            let mut writers = vec![open_log(path)?];
            if !config.show_progress {
                writers.push(Box::new(std::io::stdout()));
            }
            Ok(LineSink::new(writers))
        }
        None if config.show_progress => {
            eprintln!(
                "{}",
                "WARNING: progress bar shown and no output file set - findings will not be written anywhere!"
                    .yellow()
            );
            Ok(LineSink::discard())
        }
        None => Ok(LineSink::new(vec![Box::new(std::io::stdout())])),
    }
}

/// Errors go to the error-log file and stdout, or stderr when no file is
/// configured. Every line carries the `ERROR:` prefix.
pub fn error_sink(config: &Config) -> Result<LineSink> {
    match &config.err_file {
        Some(path) => {
            let mut writers = vec![open_log(path)?];
            if !config.show_progress {
                writers.push(Box::new(std::io::stdout()));
            }
            Ok(LineSink::new(writers))
        }
        None => Ok(LineSink::new(vec![Box::new(std::io::stderr())])),
    }
}
