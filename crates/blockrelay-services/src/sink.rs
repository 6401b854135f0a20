//! Line-oriented output files.
//!
//! Two per run: verified payloads, and the original input line of every
//! item that failed. Each is created once, written one record per line, and
//! flushed on every exit path: explicitly by `finish`, or by `Drop` when
//! the run unwinds early.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Buffered append-only text file.
pub struct LineSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl LineSink {
    /// Create (truncate) the file at `path`, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create sink dir: {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("failed to create sink: {}", path.display()))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn write_line(&mut self, record: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("sink already finished: {}", self.path.display()))?;
        writer
            .write_all(record.trim_end_matches(['\r', '\n']).as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .with_context(|| format!("failed to write to {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Flush and sync. Further writes fail.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", self.path.display()))?;
            writer
                .get_ref()
                .sync_all()
                .with_context(|| format!("failed to sync {}", self.path.display()))?;
            tracing::debug!(path = %self.path.display(), lines = self.lines, "sink closed");
        }
        Ok(())
    }
}

impl Drop for LineSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "sink flush on drop failed");
            }
        }
    }
}

/// The output and failure sinks of one run. Either may be absent.
#[derive(Default)]
pub struct Sinks {
    pub output: Option<LineSink>,
    pub failures: Option<LineSink>,
}

impl Sinks {
    pub fn open(output: Option<&Path>, failures: Option<&Path>) -> Result<Self> {
        Ok(Self {
            output: output.map(|p| LineSink::create(p)).transpose()?,
            failures: failures.map(|p| LineSink::create(p)).transpose()?,
        })
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn write_output(&mut self, record: &str) -> Result<()> {
        match self.output.as_mut() {
            Some(sink) => sink.write_line(record),
            None => Ok(()),
        }
    }

    pub fn write_failure(&mut self, record: &str) -> Result<()> {
        match self.failures.as_mut() {
            Some(sink) => sink.write_line(record),
            None => Ok(()),
        }
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(sink) = self.output.as_mut() {
            sink.finish()?;
        }
        if let Some(sink) = self.failures.as_mut() {
            sink.finish()?;
        }
        Ok(())
    }
}
