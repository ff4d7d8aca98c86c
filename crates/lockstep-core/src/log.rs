//! Ordered diagnostic log shared by both tasks of a run.
//!
//! Every line gets the next value of one process-wide sequence. The counter,
//! the captured entries and the output sink sit behind a single mutex, so
//! lines reach the sink in exactly the order their numbers were handed out.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

/// One emitted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    pub task: String,
    pub headline: String,
    pub detail: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:02}:{}]: {}", self.seq, self.task, self.headline)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n{detail}\n")?;
        }
        Ok(())
    }
}

struct LogState {
    last_seq: u64,
    entries: Vec<LogEntry>,
    sink: Option<Box<dyn Write + Send>>,
}

/// Shared, strictly increasing sequence of log lines.
///
/// Injected into both tasks of a run (wrapped in an `Arc`). Entries are
/// always captured in memory; a writer sink is optional.
pub struct SequenceLog {
    state: Mutex<LogState>,
}

impl SequenceLog {
    /// A log that only captures entries.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A log that captures entries and writes each line to `writer`.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self::build(Some(Box::new(writer)))
    }

    /// A log that captures entries and prints them to stdout.
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    fn build(sink: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            state: Mutex::new(LogState {
                last_seq: 0,
                entries: Vec::new(),
                sink,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // A panic while holding the lock cannot leave the counter half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp a line with the next sequence number and emit it.
    ///
    /// Returns the sequence number assigned.
    pub fn log(&self, task: &str, headline: &str, detail: Option<&str>) -> u64 {
        let mut state = self.lock();
        state.last_seq += 1;
        let entry = LogEntry {
            seq: state.last_seq,
            task: task.to_owned(),
            headline: headline.to_owned(),
            detail: detail.map(str::to_owned),
        };

        debug!(seq = entry.seq, task, headline, "trace line");

        if let Some(sink) = state.sink.as_mut() {
            if let Err(err) = writeln!(sink, "{entry}").and_then(|()| sink.flush()) {
                warn!(seq = entry.seq, error = %err, "failed to write trace line");
            }
        }

        let seq = entry.seq;
        state.entries.push(entry);
        seq
    }

    /// Copy of every line emitted so far, in sequence order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone()
    }

    /// The most recently assigned sequence number (0 before the first line).
    pub fn last_seq(&self) -> u64 {
        self.lock().last_seq
    }
}

impl Default for SequenceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SequenceLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SequenceLog")
            .field("last_seq", &state.last_seq)
            .field("entries", &state.entries.len())
            .field("has_sink", &state.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    /// Writer that appends into a shared buffer so tests can inspect output.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sequence_starts_at_one_and_increments() {
        let log = SequenceLog::new();
        assert_eq!(log.last_seq(), 0);
        assert_eq!(log.log("T1", "BEGIN", None), 1);
        assert_eq!(log.log("T2", "BEGIN", None), 2);
        assert_eq!(log.last_seq(), 2);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].task, "T1");
        assert_eq!(entries[1].seq, 2);
    }

    #[test]
    fn display_pads_sequence_and_appends_detail() {
        let plain = LogEntry {
            seq: 3,
            task: "T1".into(),
            headline: "COMMIT".into(),
            detail: None,
        };
        assert_eq!(plain.to_string(), "[03:T1]: COMMIT");

        let detailed = LogEntry {
            seq: 104,
            task: "T2".into(),
            headline: "update account set balance = 10 where id = 1;".into(),
            detail: Some("MODIFIED: 1".into()),
        };
        assert_eq!(
            detailed.to_string(),
            "[104:T2]: update account set balance = 10 where id = 1;\nMODIFIED: 1\n"
        );
    }

    #[test]
    fn writer_receives_lines_in_order() {
        let buf = SharedBuf::default();
        let log = SequenceLog::with_writer(buf.clone());
        log.log("T1", "BEGIN", None);
        log.log("T1", "select 1;", Some("|           1|"));

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            written,
            "[01:T1]: BEGIN\n[02:T1]: select 1;\n|           1|\n\n"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_share_a_number() {
        let log = Arc::new(SequenceLog::new());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let label = format!("W{worker}");
                let mut seen = Vec::new();
                for i in 0..250 {
                    seen.push(log.log(&label, &format!("line {i}"), None));
                    if i % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                seen
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            let seen = handle.await.unwrap();
            // Each writer observes its own numbers strictly increasing.
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            for seq in seen {
                assert!(all.insert(seq), "sequence number {seq} handed out twice");
            }
        }

        assert_eq!(all.len(), 2000);
        assert_eq!(log.last_seq(), 2000);

        let entries = log.entries();
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        let expected: Vec<u64> = (1..=2000).collect();
        assert_eq!(seqs, expected, "captured entries must be gap-free and ordered");
    }
}
