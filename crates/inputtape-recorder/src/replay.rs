//! Event log replay through an [`Injector`]
//!
//! Each record expands into one or more [`Step`]s. Only the first step of a
//! record carries the recorded wait; the synthesized follow-ups (key release,
//! button down/up after the cursor move) use the fixed settle delay.

use crate::cancel::CancelToken;
use crate::events::{EventRecord, RecordedEvent};
use crate::storage::{LogReader, Records};
use inputtape_core::{Error, InputRequest, Injector, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Pause between synthesized sub-events of one record
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);

/// Wait, then (optionally) inject one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub request: Option<InputRequest>,
    pub wait: Duration,
}

impl Step {
    fn at(request: InputRequest, wait: Duration) -> Self {
        Self {
            request: Some(request),
            wait,
        }
    }
}

/// Recorded wait; waits too long for a `Duration` saturate
fn wait_of(record: &EventRecord) -> Duration {
    Duration::try_from_secs_f64(record.wait_time).unwrap_or(Duration::MAX)
}

/// Expand one record into its playback steps
pub fn expand(record: &EventRecord, settle: Duration) -> Vec<Step> {
    let wait = wait_of(record);
    let move_then = |x: i32, y: i32, follow: &[InputRequest]| {
        let mut steps = vec![Step::at(InputRequest::MoveTo { x, y }, wait)];
        steps.extend(follow.iter().map(|r| Step::at(*r, settle)));
        steps
    };

    match record.event {
        RecordedEvent::KeyPressed(k) => vec![
            Step::at(InputRequest::KeyDown { vk: k.vk() }, wait),
            Step::at(InputRequest::KeyUp { vk: k.vk() }, settle),
        ],
        RecordedEvent::KeyDown(k) | RecordedEvent::SysKeyDown(k) => {
            vec![Step::at(InputRequest::KeyDown { vk: k.vk() }, wait)]
        }
        RecordedEvent::KeyUp(k) | RecordedEvent::SysKeyUp(k) => {
            vec![Step::at(InputRequest::KeyUp { vk: k.vk() }, wait)]
        }
        RecordedEvent::MouseMove(p) => move_then(p.x, p.y, &[]),
        RecordedEvent::ClickLeft(p) => {
            move_then(p.x, p.y, &[InputRequest::LeftDown, InputRequest::LeftUp])
        }
        RecordedEvent::ClickRight(p) => {
            move_then(p.x, p.y, &[InputRequest::RightDown, InputRequest::RightUp])
        }
        RecordedEvent::LeftDown(p) => move_then(p.x, p.y, &[InputRequest::LeftDown]),
        RecordedEvent::LeftUp(p) => move_then(p.x, p.y, &[InputRequest::LeftUp]),
        RecordedEvent::RightDown(p) => move_then(p.x, p.y, &[InputRequest::RightDown]),
        RecordedEvent::RightUp(p) => move_then(p.x, p.y, &[InputRequest::RightUp]),
        RecordedEvent::Idle => vec![Step {
            request: None,
            wait,
        }],
    }
}

/// Lazy playback steps over a log, in file order.
///
/// A malformed record yields one error and ends the sequence.
pub struct Steps<R> {
    records: Records<R>,
    pending: VecDeque<Step>,
    settle: Duration,
}

impl<R: BufRead> Steps<R> {
    pub fn new(records: Records<R>, settle: Duration) -> Self {
        Self {
            records,
            pending: VecDeque::new(),
            settle,
        }
    }
}

impl<R: BufRead> Iterator for Steps<R> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(step) = self.pending.pop_front() {
            return Some(Ok(step));
        }
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        info!(
            line = self.records.line_no(),
            "{} in {:.2} sec",
            record.event,
            record.wait_time
        );
        self.pending.extend(expand(&record, self.settle));
        self.pending.pop_front().map(Ok)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Full passes over the log
    pub repeat: u32,
    /// Key (class) that aborts playback
    pub end_key: String,
    /// End-key poll interval in ms
    pub poll_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            repeat: 1,
            end_key: "CTRL".to_string(),
            poll_interval_ms: 20,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub passes: u32,
    pub steps: usize,
    pub injected: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    Cancelled,
}

/// Sleep-then-inject scheduler
pub struct Player<I: Injector> {
    injector: I,
    cancel: CancelToken,
    settle: Duration,
    stats: PlaybackStats,
}

impl<I: Injector> Player<I> {
    pub fn new(injector: I) -> Self {
        Self {
            injector,
            cancel: CancelToken::new(),
            settle: SETTLE_DELAY,
            stats: PlaybackStats::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    /// Replay the log `repeat` times, reopening it for every pass
    pub fn play(&mut self, path: impl AsRef<Path>, repeat: u32) -> Result<PlaybackStats> {
        let path = path.as_ref();
        for remaining in (0..repeat).rev() {
            if self.cancel.is_cancelled() {
                self.stats.cancelled = true;
                break;
            }
            info!("{} repeat times remained", remaining);
            if self.play_pass(path)? == PassOutcome::Cancelled {
                break;
            }
        }
        Ok(self.stats.clone())
    }

    /// One full pass over a freshly opened log
    pub fn play_pass(&mut self, path: impl AsRef<Path>) -> Result<PassOutcome> {
        let reader = LogReader::open(path)?;
        self.play_steps(reader.steps(self.settle))
    }

    /// Drive any step sequence; errors abort the pass
    pub fn play_steps<S>(&mut self, steps: S) -> Result<PassOutcome>
    where
        S: IntoIterator<Item = Result<Step>>,
    {
        for step in steps {
            let step = step?;
            if self.cancel.is_cancelled() || self.cancel.wait_for(step.wait) {
                info!("playback cancelled");
                self.stats.cancelled = true;
                return Ok(PassOutcome::Cancelled);
            }
            self.stats.steps += 1;

            if let Some(request) = step.request {
                let report = self.injector.send(&[request]);
                if report.injected < 1 {
                    return Err(Error::injection(report.injected, 1, report.os_code));
                }
                self.stats.injected += report.injected;
                debug!(?request, "injected");
            }
        }
        self.stats.passes += 1;
        Ok(PassOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{decode, KeySymbol, Position};
    use inputtape_core::{ErrorCode, SendReport};
    use std::io::Cursor;
    use std::time::Instant;

    #[derive(Default)]
    struct Capture {
        sent: Vec<InputRequest>,
        fail_after: Option<usize>,
    }

    impl Injector for Capture {
        fn send(&mut self, batch: &[InputRequest]) -> SendReport {
            if let Some(n) = self.fail_after {
                if self.sent.len() >= n {
                    return SendReport {
                        injected: 0,
                        os_code: 5,
                    };
                }
            }
            self.sent.extend_from_slice(batch);
            SendReport::complete(batch.len())
        }
    }

    fn steps_of(log: &str) -> Vec<Result<Step>> {
        LogReader::new(Cursor::new(log.to_string()))
            .steps(SETTLE_DELAY)
            .collect()
    }

    fn write_log(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut text = lines.join("\n");
        text.push('\n');
        std::fs::write(&path, text).unwrap();
        (dir, path)
    }

    #[test]
    fn key_pressed_expands_to_down_then_up() {
        let steps: Vec<Step> = steps_of("{\"KEY_PRESSED\":\"P\",\"WAITING_TIME\":0}\n")
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::at(InputRequest::KeyDown { vk: 0x50 }, Duration::ZERO),
                Step::at(InputRequest::KeyUp { vk: 0x50 }, SETTLE_DELAY),
            ]
        );
    }

    #[test]
    fn click_expands_to_move_down_up() {
        let steps: Vec<Step> = steps_of("{\"CLICK_LEFT\":[100,200],\"WAITING_TIME\":1.5}")
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::at(InputRequest::MoveTo { x: 100, y: 200 }, Duration::from_millis(1500)),
                Step::at(InputRequest::LeftDown, SETTLE_DELAY),
                Step::at(InputRequest::LeftUp, SETTLE_DELAY),
            ]
        );
    }

    #[test]
    fn every_kind_has_its_expansion() {
        let k = KeySymbol::parse("A").unwrap();
        let p = Position::new(7, 8);
        let count = |e: RecordedEvent| expand(&EventRecord::new(e, 0.5), SETTLE_DELAY);

        assert_eq!(count(RecordedEvent::KeyDown(k)).len(), 1);
        assert_eq!(count(RecordedEvent::SysKeyUp(k))[0].request, Some(InputRequest::KeyUp { vk: 0x41 }));
        assert_eq!(count(RecordedEvent::MouseMove(p)).len(), 1);
        assert_eq!(
            count(RecordedEvent::ClickRight(p))[1..]
                .iter()
                .map(|s| s.request.unwrap())
                .collect::<Vec<_>>(),
            vec![InputRequest::RightDown, InputRequest::RightUp]
        );
        assert_eq!(count(RecordedEvent::RightUp(p))[1].request, Some(InputRequest::RightUp));

        let idle = count(RecordedEvent::Idle);
        assert_eq!(idle, vec![Step { request: None, wait: Duration::from_millis(500) }]);
    }

    #[test]
    fn n_records_yield_n_groups_in_file_order() {
        let log = "{\"KEY_PRESSED\":\"A\",\"WAITING_TIME\":0}\n\
                   {\"WAITING_TIME\":0.01}\n\
                   {\"KEY_PRESSED\":\"B\",\"WAITING_TIME\":0}\n";
        let records: Vec<_> = LogReader::new(Cursor::new(log))
            .records()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);

        let requests: Vec<_> = steps_of(log)
            .into_iter()
            .map(|s| s.unwrap().request)
            .collect();
        assert_eq!(
            requests,
            vec![
                Some(InputRequest::KeyDown { vk: 0x41 }),
                Some(InputRequest::KeyUp { vk: 0x41 }),
                None,
                Some(InputRequest::KeyDown { vk: 0x42 }),
                Some(InputRequest::KeyUp { vk: 0x42 }),
            ]
        );
    }

    #[test]
    fn malformed_line_aborts_the_sequence() {
        let log = "{\"KEY_PRESSED\":\"A\",\"WAITING_TIME\":0}\n{\"FOO\":1}\n{\"WAITING_TIME\":0}\n";
        let steps = steps_of(log);
        assert_eq!(steps.len(), 3);
        assert!(steps[0].is_ok() && steps[1].is_ok());
        assert!(steps[2].as_ref().unwrap_err().is_malformed());
    }

    #[test]
    fn repeat_reopens_the_log_each_pass() {
        let (_dir, path) = write_log(&[r#"{"CLICK_LEFT":[100,200],"WAITING_TIME":0}"#]);
        let mut player = Player::new(Capture::default());
        let stats = player.play(&path, 2).unwrap();

        let once = vec![
            InputRequest::MoveTo { x: 100, y: 200 },
            InputRequest::LeftDown,
            InputRequest::LeftUp,
        ];
        let twice: Vec<_> = once.iter().chain(once.iter()).copied().collect();
        assert_eq!(player.injector().sent, twice);
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.injected, 6);
        assert!(!stats.cancelled);
    }

    #[test]
    fn zero_repeats_play_nothing() {
        let (_dir, path) = write_log(&[r#"{"KEY_PRESSED":"A","WAITING_TIME":0}"#]);
        let mut player = Player::new(Capture::default());
        let stats = player.play(&path, 0).unwrap();
        assert!(player.injector().sent.is_empty());
        assert_eq!(stats.passes, 0);
    }

    #[test]
    fn elapsed_time_tracks_recorded_waits() {
        let (_dir, path) = write_log(&[
            r#"{"KEY_PRESSED":"A","WAITING_TIME":0}"#,
            r#"{"WAITING_TIME":0.05}"#,
            r#"{"KEY_PRESSED":"B","WAITING_TIME":0.05}"#,
        ]);
        let mut player = Player::new(Capture::default());
        let start = Instant::now();
        player.play(&path, 1).unwrap();
        let elapsed = start.elapsed();
        // 0.1s recorded plus two settle delays
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);
    }

    #[test]
    fn cancelled_before_start_plays_nothing() {
        let (_dir, path) = write_log(&[r#"{"KEY_PRESSED":"A","WAITING_TIME":0}"#]);
        let token = CancelToken::new();
        token.cancel();
        let mut player = Player::new(Capture::default()).with_cancel(token);
        let stats = player.play(&path, 3).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.passes, 0);
        assert!(player.injector().sent.is_empty());
    }

    #[test]
    fn cancel_during_wait_halts_mid_pass() {
        let (_dir, path) = write_log(&[
            r#"{"KEY_PRESSED":"A","WAITING_TIME":0}"#,
            r#"{"KEY_PRESSED":"B","WAITING_TIME":30}"#,
        ]);
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        let mut player = Player::new(Capture::default()).with_cancel(token);
        let start = Instant::now();
        let stats = player.play(&path, 5).unwrap();
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(stats.cancelled);
        assert_eq!(stats.passes, 0);
        // A was fully pressed and released, B never started
        assert_eq!(
            player.injector().sent,
            vec![InputRequest::KeyDown { vk: 0x41 }, InputRequest::KeyUp { vk: 0x41 }]
        );
    }

    #[test]
    fn short_injection_is_an_error_with_os_code() {
        let (_dir, path) = write_log(&[r#"{"CLICK_LEFT":[1,2],"WAITING_TIME":0}"#]);
        let mut player = Player::new(Capture {
            sent: Vec::new(),
            fail_after: Some(1),
        });
        let err = player.play(&path, 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::Injection);
        assert_eq!(err.os_code, Some(5));
        assert_eq!(player.injector().sent.len(), 1);
    }

    #[test]
    fn malformed_log_fails_the_pass() {
        let (_dir, path) = write_log(&[
            r#"{"KEY_PRESSED":"A","WAITING_TIME":0}"#,
            r#"{"KEY_PRESSED":"NOT_A_KEY","WAITING_TIME":0}"#,
        ]);
        let mut player = Player::new(Capture::default());
        let err = player.play(&path, 2).unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(err.line, Some(2));
        assert_eq!(player.stats().passes, 0);
    }

    #[test]
    fn missing_log_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = Player::new(Capture::default());
        let err = player.play(dir.path().join("missing.txt"), 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::Storage);
    }

    #[test]
    fn oversized_waits_saturate_instead_of_vanishing() {
        let record = decode(r#"{"KEY_PRESSED":"A","WAITING_TIME":1e20}"#).unwrap();
        let steps = expand(&record, SETTLE_DELAY);
        assert_eq!(steps[0].wait, Duration::MAX);
        assert_eq!(steps[1].wait, SETTLE_DELAY);
    }

    #[test]
    fn huge_wait_blocks_until_cancelled() {
        for wait in ["1e19", "1e20"] {
            let log = format!("{{\"KEY_PRESSED\":\"A\",\"WAITING_TIME\":{}}}\n", wait);
            let token = CancelToken::new();
            let remote = token.clone();
            let canceller = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                remote.cancel();
            });

            let mut player = Player::new(Capture::default()).with_cancel(token);
            let outcome = player
                .play_steps(LogReader::new(Cursor::new(log)).steps(SETTLE_DELAY))
                .unwrap();
            canceller.join().unwrap();

            assert_eq!(outcome, PassOutcome::Cancelled, "wait {}", wait);
            assert!(player.injector().sent.is_empty());
        }
    }

    #[test]
    fn decoded_wait_becomes_step_wait() {
        let record = decode(r#"{"RIGHT_DOWN":[3,4],"WAITING_TIME":0.25}"#).unwrap();
        let steps = expand(&record, SETTLE_DELAY);
        assert_eq!(steps[0].wait, Duration::from_millis(250));
        assert_eq!(steps[1], Step::at(InputRequest::RightDown, SETTLE_DELAY));
    }
}
