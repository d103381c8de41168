//! Per-sample diagnostic stream
//!
//! One whitespace-separated line per evaluated link sample or detected
//! conjunction event. Writing to the sink never changes results.

use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub struct DebugSink {
    writer: Box<dyn Write>,
    lines: usize,
}

impl DebugSink {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            lines: 0,
        }
    }

    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Writing link diagnostics to {:?}", path);
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }

    pub fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSink").field("lines", &self.lines).finish()
    }
}

impl Drop for DebugSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
