use super::state::LOG_LINES;
use std::io::{self, Write};
use tokio::sync::broadcast;
use tracing_subscriber::fmt::writer::MakeWriter;

const LOG_CHANNEL_CAPACITY: usize = 1024;

/// `MakeWriter` feeding formatted events into the log-line channel
#[derive(Clone)]
pub(crate) struct LineBroadcaster {
    tx: broadcast::Sender<String>,
}

impl LineBroadcaster {
    pub(crate) fn new() -> Self {
        Self { tx: log_lines_sender() }
    }
}

/// Buffers one event and publishes every complete line it contains
pub(crate) struct LineWriter {
    tx: broadcast::Sender<String>,
    pending: Vec<u8>,
}

impl LineWriter {
    fn publish(&self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            // Err only means nobody is listening
            let _ = self.tx.send(line.to_string());
        }
    }
}

impl<'a> MakeWriter<'a> for LineBroadcaster {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            tx: self.tx.clone(),
            pending: Vec::new(),
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            self.publish(&line[..pos]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// One writer per event: whatever is left without a newline ends with it
impl Drop for LineWriter {
    fn drop(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        self.publish(&rest);
    }
}

fn log_lines_sender() -> broadcast::Sender<String> {
    LOG_LINES
        .get_or_init(|| broadcast::channel(LOG_CHANNEL_CAPACITY).0)
        .clone()
}

/// Subscribe to formatted log lines as they are written
pub fn subscribe_log_lines() -> broadcast::Receiver<String> {
    log_lines_sender().subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newlines_and_flushes_remainder() {
        let mut rx = subscribe_log_lines();
        {
            let mut w = LineBroadcaster::new().make_writer();
            w.write_all(b"first line\r\nsecond ").unwrap();
            w.write_all(b"part\n\nthird").unwrap();
        }
        let mut got = Vec::new();
        while let Ok(line) = rx.try_recv() {
            got.push(line);
        }
        // Other tests may log concurrently
        let ours: Vec<_> = got
            .into_iter()
            .filter(|l| ["first line", "second part", "third"].contains(&l.as_str()))
            .collect();
        assert_eq!(ours, ["first line", "second part", "third"]);
    }
}
