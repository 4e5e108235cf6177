//! Event log storage - JSON lines, append-only, flushed per record

use crate::events::{decode, encode, EventRecord, RecordedEvent};
use crate::replay::Steps;
use inputtape_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Split, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for measuring waits between records
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Exclusive writer over an event log.
///
/// Every record is flushed as soon as it is appended. The underlying file is
/// closed when the writer is dropped or [`LogWriter::finish`] is called.
pub struct LogWriter<W: Write = BufWriter<File>> {
    out: Option<W>,
    clock: Box<dyn Clock>,
    last: Option<Instant>,
    written: usize,
}

impl LogWriter<BufWriter<File>> {
    /// Create (or truncate) the log at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::storage(path, e))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LogWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Some(out),
            clock: Box::new(MonotonicClock),
            last: None,
            written: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Seconds since the previous record; 0 for the first one
    fn elapsed(&mut self) -> f64 {
        let now = self.clock.now();
        let wait = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last = Some(now);
        wait
    }

    /// Stamp `event` with the measured wait and append it
    pub fn append(&mut self, event: RecordedEvent, extra: Map<String, Value>) -> Result<EventRecord> {
        let wait_time = self.elapsed();
        let record = EventRecord {
            event,
            wait_time,
            extra,
        };
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::new(inputtape_core::ErrorCode::Storage, "log already closed"))?;
        let mut line = encode(&record)?;
        line.push('\n');
        out.write_all(line.as_bytes())?;
        out.flush()?;
        self.written += 1;
        Ok(record)
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        let mut out = self
            .out
            .take()
            .ok_or_else(|| Error::new(inputtape_core::ErrorCode::Storage, "log already closed"))?;
        out.flush()?;
        Ok(out)
    }
}

impl<W: Write> Drop for LogWriter<W> {
    fn drop(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }
}

/// Read-only view of an event log
pub struct LogReader<R: BufRead = BufReader<File>> {
    input: R,
}

impl LogReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::storage(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Decoded records in file order
    pub fn records(self) -> Records<R> {
        Records {
            lines: self.input.split(b'\n'),
            line_no: 0,
            failed: false,
        }
    }

    /// Playback steps in file order; consumes the reader
    pub fn steps(self, settle: Duration) -> Steps<R> {
        Steps::new(self.records(), settle)
    }
}

/// Iterator over decoded records.
///
/// Blank lines are skipped. The first bad line yields an error tagged with
/// its line number and ends the iteration.
pub struct Records<R> {
    lines: Split<R>,
    line_no: usize,
    failed: bool,
}

impl<R: BufRead> Records<R> {
    /// Line number of the most recently read line
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let bytes = match self.lines.next()? {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::from(e).at_line(self.line_no + 1)));
                }
            };
            self.line_no += 1;
            let decoded = match String::from_utf8(bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => decode(&line),
                Err(e) => Err(Error::malformed(format!("line is not UTF-8: {}", e))),
            }
            .map_err(|e| e.at_line(self.line_no));
            self.failed = decoded.is_err();
            return Some(decoded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeySymbol, Position};
    use std::io::Cursor;

    fn key(s: &str) -> RecordedEvent {
        RecordedEvent::KeyPressed(KeySymbol::parse(s).unwrap())
    }

    #[test]
    fn first_wait_is_zero_then_measured() {
        let clock = ManualClock::new();
        let mut w = LogWriter::new(Vec::new()).with_clock(clock.clone());

        let first = w.append(key("A"), Map::new()).unwrap();
        clock.advance(Duration::from_millis(1500));
        let second = w.append(key("B"), Map::new()).unwrap();
        clock.advance(Duration::from_millis(250));
        let third = w.append(RecordedEvent::Idle, Map::new()).unwrap();

        assert_eq!(first.wait_time, 0.0);
        assert_eq!(second.wait_time, 1.5);
        assert_eq!(third.wait_time, 0.25);
        assert_eq!(w.records_written(), 3);

        let bytes = w.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn file_writer_flushes_each_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut w = LogWriter::create(&path).unwrap();
        w.append(key("P"), Map::new()).unwrap();

        // visible on disk while the writer is still open
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk.lines().count(), 1);
        assert!(on_disk.contains(r#""KEY_PRESSED":"P""#));

        w.append(RecordedEvent::ClickLeft(Position::new(1, 2)), Map::new()).unwrap();
        drop(w);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn open_failures_are_storage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").join("log.txt");
        let err = LogWriter::create(&missing).err().unwrap();
        assert_eq!(err.code, inputtape_core::ErrorCode::Storage);

        let err = LogReader::open(dir.path().join("absent.txt")).err().unwrap();
        assert_eq!(err.code, inputtape_core::ErrorCode::Storage);
    }

    #[test]
    fn reader_yields_records_in_order_and_skips_blank_lines() {
        let log = "{\"KEY_PRESSED\":\"A\",\"WAITING_TIME\":0}\n\n{\"WAITING_TIME\":2}\n";
        let records: Vec<_> = LogReader::new(Cursor::new(log))
            .records()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, key("A"));
        assert_eq!(records[1].event, RecordedEvent::Idle);
        assert_eq!(records[1].wait_time, 2.0);
    }

    #[test]
    fn invalid_utf8_is_malformed_not_storage() {
        let log: &[u8] = b"{\"WAITING_TIME\":0}\n\xff\xfe\n{\"WAITING_TIME\":1}\n";
        let mut records = LogReader::new(Cursor::new(log)).records();
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.code, inputtape_core::ErrorCode::MalformedRecord);
        assert_eq!(err.line, Some(2));
        assert!(records.next().is_none());
    }

    #[test]
    fn crlf_line_endings_decode() {
        let log = "{\"KEY_PRESSED\":\"A\",\"WAITING_TIME\":0}\r\n\r\n{\"WAITING_TIME\":1}\r\n";
        let records: Vec<_> = LogReader::new(Cursor::new(log))
            .records()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn malformed_line_ends_iteration_with_line_number() {
        let log = "{\"WAITING_TIME\":0}\n{\"FOO\":1}\n{\"WAITING_TIME\":1}\n";
        let mut records = LogReader::new(Cursor::new(log)).records();
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.line, Some(2));
        assert!(records.next().is_none());
    }
}
