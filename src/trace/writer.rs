//! Trace file writer
//!
//! Lines are handed to a dedicated writer thread over a channel, so recording
//! never blocks the task that forwards a request. The thread appends
//! newline-terminated lines and flushes whenever the channel runs dry.

use super::{TraceLine, TraceSink};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Trace sink backed by an append-only file
pub struct FileTraceSink {
    tx: Option<UnboundedSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl FileTraceSink {
    /// Open (or create) the trace file for appending and start its writer thread
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let (tx, rx) = unbounded_channel();
        let worker = std::thread::Builder::new()
            .name("ferrumroute-trace".to_string())
            .spawn(move || write_lines(BufWriter::new(file), rx))?;

        Ok(FileTraceSink {
            tx: Some(tx),
            worker: Some(worker),
        })
    }
}

fn write_lines(mut out: BufWriter<File>, mut rx: UnboundedReceiver<String>) {
    while let Some(line) = rx.blocking_recv() {
        append(&mut out, &line);
        while let Ok(line) = rx.try_recv() {
            append(&mut out, &line);
        }
        if let Err(e) = out.flush() {
            warn!("Failed to flush trace file: {}", e);
        }
    }
}

fn append(out: &mut BufWriter<File>, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        warn!("Failed to write trace line: {}", e);
    }
}

impl TraceSink for FileTraceSink {
    fn record(&self, line: &TraceLine) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(line.to_string()).is_err() {
            warn!("Trace writer is gone, dropping line");
        }
    }
}

impl Drop for FileTraceSink {
    /// Close the channel and wait for queued lines to reach the file
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Trace writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lines_appended() {
        let path = std::env::temp_dir().join(format!("ferrumroute_trace_{}.log", std::process::id()));
        let _ = fs::remove_file(&path);

        let sink = FileTraceSink::new(&path).unwrap();
        sink.record(&TraceLine::client_receive("SUCCESS", 3));
        sink.record(&TraceLine::client_receive("SUCCESS", 4));
        drop(sink);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("TRACE: CR "));
        assert!(lines[1].ends_with("DATA_SIZE 4"));

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_record_from_async_context() {
        let path = std::env::temp_dir().join(format!("ferrumroute_trace_async_{}.log", std::process::id()));
        let _ = fs::remove_file(&path);

        let sink = FileTraceSink::new(&path).unwrap();
        for size in 0..50 {
            sink.record(&TraceLine::client_receive("SUCCESS", size));
        }
        drop(sink);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 50);
        fs::remove_file(&path).unwrap();
    }
}
