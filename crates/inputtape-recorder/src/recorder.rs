//! Recorder - turns raw keyboard/mouse notifications into log records
//!
//! The recorder is platform-neutral: the hook layer feeds it virtual key
//! codes and already-normalized coordinates, and it decides what ends up in
//! the log. It runs synchronously on whatever thread delivers notifications.

use crate::events::{KeySymbol, Position, RecordedEvent};
use crate::storage::{Clock, LogWriter};
use inputtape_core::{EndKey, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Extra key holding the wall-clock time of a record
pub const TIME_KEY: &str = "TIME";
/// Extra key holding the foreground window title
pub const WINDOW_KEY: &str = "WINDOW";

/// How key presses are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyMode {
    /// Down edges only, as `KEY_PRESSED`; replay synthesizes the release
    #[default]
    Pressed,
    /// Both edges, as `KEY_DOWN` / `KEY_UP`
    DownUp,
}

/// How system keys (keys pressed while ALT is held, F10) are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SysKeyMode {
    /// Same as any other key
    #[default]
    Plain,
    /// Both edges as `SYS_KEY_DOWN` / `SYS_KEY_UP`
    Distinct,
    Ignore,
}

/// Which mouse notifications are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MouseMode {
    /// Button-down edges only, as `CLICK_LEFT` / `CLICK_RIGHT`
    #[default]
    Clicks,
    /// Button down and up edges
    Buttons,
    /// Button edges plus cursor motion
    Motion,
}

macro_rules! parse_mode {
    ($ty:ty, $($name:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($ty),
                        other,
                        [$($name),+].join(", ")
                    )),
                }
            }
        }
    };
}

parse_mode!(KeyMode, "pressed" => KeyMode::Pressed, "down-up" => KeyMode::DownUp);
parse_mode!(
    SysKeyMode,
    "plain" => SysKeyMode::Plain,
    "distinct" => SysKeyMode::Distinct,
    "ignore" => SysKeyMode::Ignore,
);
parse_mode!(
    MouseMode,
    "clicks" => MouseMode::Clicks,
    "buttons" => MouseMode::Buttons,
    "motion" => MouseMode::Motion,
);

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Key (or modifier class) that ends the session
    pub end_key: String,
    pub key_mode: KeyMode,
    pub sys_keys: SysKeyMode,
    pub mouse_mode: MouseMode,
    /// Attach the foreground window title as `WINDOW`
    pub window_title: bool,
    /// Attach an RFC 3339 wall-clock time as `TIME`
    pub timestamps: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            end_key: EndKey::default().name().to_string(),
            key_mode: KeyMode::default(),
            sys_keys: SysKeyMode::default(),
            mouse_mode: MouseMode::default(),
            window_title: false,
            timestamps: false,
        }
    }
}

/// Keyboard edge as delivered by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    SysDown,
    SysUp,
}

impl KeyAction {
    pub fn is_down(self) -> bool {
        matches!(self, Self::Down | Self::SysDown)
    }

    pub fn is_sys(self) -> bool {
        matches!(self, Self::SysDown | Self::SysUp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
}

/// What the hook layer should do after a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RecorderStats {
    pub records: usize,
    pub keys: usize,
    pub mouse: usize,
    /// Notifications filtered out (unsupported keys, modes)
    pub dropped: usize,
    /// Phantom key-up at session start
    pub suppressed: usize,
}

pub struct Recorder<W: Write = BufWriter<File>> {
    writer: LogWriter<W>,
    config: RecorderConfig,
    end_key: EndKey,
    saw_key: bool,
    stopped: bool,
    stats: RecorderStats,
}

impl Recorder<BufWriter<File>> {
    /// Truncate the log at `path` and start a session
    pub fn open(path: impl AsRef<Path>, config: RecorderConfig) -> Result<Self> {
        let end_key = EndKey::parse(&config.end_key)?;
        let writer = LogWriter::create(path.as_ref())?;
        info!(path = %path.as_ref().display(), end_key = %end_key, "recording started");
        Ok(Self::with_writer(writer, end_key, config))
    }
}

impl<W: Write> Recorder<W> {
    pub fn new(out: W, config: RecorderConfig) -> Result<Self> {
        let end_key = EndKey::parse(&config.end_key)?;
        Ok(Self::with_writer(LogWriter::new(out), end_key, config))
    }

    fn with_writer(writer: LogWriter<W>, end_key: EndKey, config: RecorderConfig) -> Self {
        Self {
            writer,
            config,
            end_key,
            saw_key: false,
            stopped: false,
            stats: RecorderStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.writer = self.writer.with_clock(clock);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn end_key(&self) -> &EndKey {
        &self.end_key
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn append(&mut self, event: RecordedEvent, mut extra: Map<String, Value>) -> Result<()> {
        if self.config.timestamps {
            extra.insert(
                TIME_KEY.to_string(),
                Value::String(chrono::Local::now().to_rfc3339()),
            );
        }
        let record = self.writer.append(event, extra)?;
        debug!(event = %record.event, wait = record.wait_time, "recorded");
        self.stats.records += 1;
        if event.is_keyboard() {
            self.stats.keys += 1;
        } else if event.is_mouse() {
            self.stats.mouse += 1;
        }
        Ok(())
    }

    fn drop_event(&mut self, why: &str) -> Result<Verdict> {
        debug!(why, "notification dropped");
        self.stats.dropped += 1;
        Ok(Verdict::Continue)
    }

    fn live(&self) -> Verdict {
        if self.stopped {
            Verdict::Stop
        } else {
            Verdict::Continue
        }
    }

    /// Log a key press. Unsupported keys are silently skipped.
    pub fn record_key(&mut self, vk: u16, extra: Map<String, Value>) -> Result<Verdict> {
        if self.stopped {
            return Ok(Verdict::Stop);
        }
        let Some(sym) = KeySymbol::from_vk(vk) else {
            return self.drop_event("unsupported key");
        };
        let event = match self.config.key_mode {
            KeyMode::Pressed => RecordedEvent::KeyPressed(sym),
            KeyMode::DownUp => RecordedEvent::KeyDown(sym),
        };
        self.append(event, extra)?;
        Ok(Verdict::Continue)
    }

    /// Feed one keyboard edge through the filters
    pub fn record_key_event(
        &mut self,
        vk: u16,
        action: KeyAction,
        extra: Map<String, Value>,
    ) -> Result<Verdict> {
        if self.stopped {
            return Ok(Verdict::Stop);
        }
        let first = !self.saw_key;
        self.saw_key = true;

        if self.end_key.matches(vk) {
            if action.is_down() {
                info!(end_key = %self.end_key, "end key pressed");
                self.stop()?;
            }
            return Ok(self.live());
        }

        if first && !action.is_down() {
            warn!(vk, "dropping key-up that precedes any key-down");
            self.stats.suppressed += 1;
            return Ok(Verdict::Continue);
        }

        let Some(sym) = KeySymbol::from_vk(vk) else {
            return self.drop_event("unsupported key");
        };

        let event = if action.is_sys() && self.config.sys_keys != SysKeyMode::Plain {
            match (self.config.sys_keys, action.is_down()) {
                (SysKeyMode::Ignore, _) => return self.drop_event("system key"),
                (_, true) => RecordedEvent::SysKeyDown(sym),
                (_, false) => RecordedEvent::SysKeyUp(sym),
            }
        } else {
            match (self.config.key_mode, action.is_down()) {
                (KeyMode::Pressed, true) => RecordedEvent::KeyPressed(sym),
                (KeyMode::Pressed, false) => return self.drop_event("key release"),
                (KeyMode::DownUp, true) => RecordedEvent::KeyDown(sym),
                (KeyMode::DownUp, false) => RecordedEvent::KeyUp(sym),
            }
        };
        self.append(event, extra)?;
        Ok(Verdict::Continue)
    }

    /// Log a click at normalized coordinates
    pub fn record_mouse(
        &mut self,
        x: i32,
        y: i32,
        is_right: bool,
        extra: Map<String, Value>,
    ) -> Result<Verdict> {
        if self.stopped {
            return Ok(Verdict::Stop);
        }
        let pos = Position::new(x, y);
        let event = if is_right {
            RecordedEvent::ClickRight(pos)
        } else {
            RecordedEvent::ClickLeft(pos)
        };
        self.append(event, extra)?;
        Ok(Verdict::Continue)
    }

    /// Feed one mouse notification through the mouse mode
    pub fn record_mouse_event(
        &mut self,
        action: MouseAction,
        x: i32,
        y: i32,
        extra: Map<String, Value>,
    ) -> Result<Verdict> {
        if self.stopped {
            return Ok(Verdict::Stop);
        }
        let pos = Position::new(x, y);
        let event = match (self.config.mouse_mode, action) {
            (MouseMode::Clicks, MouseAction::LeftDown) => RecordedEvent::ClickLeft(pos),
            (MouseMode::Clicks, MouseAction::RightDown) => RecordedEvent::ClickRight(pos),
            (MouseMode::Clicks, _) => return self.drop_event("mouse mode"),
            (MouseMode::Buttons, MouseAction::Move) => return self.drop_event("mouse mode"),
            (MouseMode::Motion, MouseAction::Move) => RecordedEvent::MouseMove(pos),
            (_, MouseAction::LeftDown) => RecordedEvent::LeftDown(pos),
            (_, MouseAction::LeftUp) => RecordedEvent::LeftUp(pos),
            (_, MouseAction::RightDown) => RecordedEvent::RightDown(pos),
            (_, MouseAction::RightUp) => RecordedEvent::RightUp(pos),
        };
        self.append(event, extra)?;
        Ok(Verdict::Continue)
    }

    /// Timing-only record
    pub fn record_idle(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.append(RecordedEvent::Idle, Map::new())
    }

    /// Write the terminal idle record and stop. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.append(RecordedEvent::Idle, Map::new())?;
        self.stopped = true;
        info!(records = self.stats.records, "recording stopped");
        Ok(())
    }

    /// Stop if still running, then flush and close the log
    pub fn finish(mut self) -> Result<W> {
        self.stop()?;
        self.writer.finish()
    }
}
