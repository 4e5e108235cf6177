//! Event records and their one-line JSON encoding
//!
//! A line looks like
//! `{"EVENT":"CLICK_LEFT","CLICK_LEFT":[100,200],"WAITING_TIME":1.5}`.
//! `EVENT` names the kind explicitly. Older logs omit it, in which case the
//! kind is inferred from the single marker key present; a line carrying only
//! `WAITING_TIME` is an idle record. Unknown keys are kept as `extra`.

use inputtape_core::geometry::{in_range, ABSOLUTE_MAX};
use inputtape_core::keys;
use inputtape_core::{Error, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

pub const EVENT_KEY: &str = "EVENT";
pub const WAIT_KEY: &str = "WAITING_TIME";
pub const IDLE_TAG: &str = "IDLE";

const KEY_PRESSED: &str = "KEY_PRESSED";
const KEY_DOWN: &str = "KEY_DOWN";
const KEY_UP: &str = "KEY_UP";
const SYS_KEY_DOWN: &str = "SYS_KEY_DOWN";
const SYS_KEY_UP: &str = "SYS_KEY_UP";
const MOUSE_MOVE: &str = "MOUSE_MOVE";
const CLICK_LEFT: &str = "CLICK_LEFT";
const CLICK_RIGHT: &str = "CLICK_RIGHT";
const LEFT_DOWN: &str = "LEFT_DOWN";
const LEFT_UP: &str = "LEFT_UP";
const RIGHT_DOWN: &str = "RIGHT_DOWN";
const RIGHT_UP: &str = "RIGHT_UP";

/// Keys whose presence identifies the kind of a legacy record
pub const MARKERS: [&str; 12] = [
    KEY_PRESSED,
    KEY_DOWN,
    KEY_UP,
    SYS_KEY_DOWN,
    SYS_KEY_UP,
    MOUSE_MOVE,
    CLICK_LEFT,
    CLICK_RIGHT,
    LEFT_DOWN,
    LEFT_UP,
    RIGHT_DOWN,
    RIGHT_UP,
];

fn is_reserved(key: &str) -> bool {
    key == EVENT_KEY || key == WAIT_KEY || MARKERS.contains(&key)
}

/// A key symbol from the fixed table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySymbol(&'static str);

impl KeySymbol {
    pub fn from_vk(vk: u16) -> Option<Self> {
        keys::symbol_for(vk).map(Self)
    }

    pub fn parse(symbol: &str) -> Option<Self> {
        keys::vk_for(symbol).and_then(Self::from_vk)
    }

    pub fn vk(&self) -> u16 {
        // the table is a bijection, so every symbol maps back
        keys::vk_for(self.0).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Mouse position in the absolute 0..=65535 range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(0, ABSOLUTE_MAX),
            y: y.clamp(0, ABSOLUTE_MAX),
        }
    }
}

/// What happened; the tagged union behind every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedEvent {
    /// Key press with no logged release; replay synthesizes the release
    KeyPressed(KeySymbol),
    KeyDown(KeySymbol),
    KeyUp(KeySymbol),
    SysKeyDown(KeySymbol),
    SysKeyUp(KeySymbol),
    MouseMove(Position),
    ClickLeft(Position),
    ClickRight(Position),
    LeftDown(Position),
    LeftUp(Position),
    RightDown(Position),
    RightUp(Position),
    /// Timing only
    Idle,
}

impl RecordedEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::KeyPressed(_) => KEY_PRESSED,
            Self::KeyDown(_) => KEY_DOWN,
            Self::KeyUp(_) => KEY_UP,
            Self::SysKeyDown(_) => SYS_KEY_DOWN,
            Self::SysKeyUp(_) => SYS_KEY_UP,
            Self::MouseMove(_) => MOUSE_MOVE,
            Self::ClickLeft(_) => CLICK_LEFT,
            Self::ClickRight(_) => CLICK_RIGHT,
            Self::LeftDown(_) => LEFT_DOWN,
            Self::LeftUp(_) => LEFT_UP,
            Self::RightDown(_) => RIGHT_DOWN,
            Self::RightUp(_) => RIGHT_UP,
            Self::Idle => IDLE_TAG,
        }
    }

    pub fn key(&self) -> Option<KeySymbol> {
        match *self {
            Self::KeyPressed(k)
            | Self::KeyDown(k)
            | Self::KeyUp(k)
            | Self::SysKeyDown(k)
            | Self::SysKeyUp(k) => Some(k),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match *self {
            Self::MouseMove(p)
            | Self::ClickLeft(p)
            | Self::ClickRight(p)
            | Self::LeftDown(p)
            | Self::LeftUp(p)
            | Self::RightDown(p)
            | Self::RightUp(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_keyboard(&self) -> bool {
        self.key().is_some()
    }

    pub fn is_mouse(&self) -> bool {
        self.position().is_some()
    }

    fn payload(&self) -> Option<Value> {
        if let Some(k) = self.key() {
            return Some(Value::from(k.as_str()));
        }
        self.position()
            .map(|p| Value::Array(vec![Value::from(p.x), Value::from(p.y)]))
    }

    fn from_parts(tag: &str, payload: Value) -> Result<Self> {
        let key = |v: &Value| -> Result<KeySymbol> {
            let s = v
                .as_str()
                .ok_or_else(|| Error::malformed(format!("{} must be a key symbol string", tag)))?;
            KeySymbol::parse(s)
                .ok_or_else(|| Error::malformed(format!("unknown key symbol {:?}", s)))
        };
        let pos = |v: &Value| -> Result<Position> { parse_position(tag, v) };

        Ok(match tag {
            KEY_PRESSED => Self::KeyPressed(key(&payload)?),
            KEY_DOWN => Self::KeyDown(key(&payload)?),
            KEY_UP => Self::KeyUp(key(&payload)?),
            SYS_KEY_DOWN => Self::SysKeyDown(key(&payload)?),
            SYS_KEY_UP => Self::SysKeyUp(key(&payload)?),
            MOUSE_MOVE => Self::MouseMove(pos(&payload)?),
            CLICK_LEFT => Self::ClickLeft(pos(&payload)?),
            CLICK_RIGHT => Self::ClickRight(pos(&payload)?),
            LEFT_DOWN => Self::LeftDown(pos(&payload)?),
            LEFT_UP => Self::LeftUp(pos(&payload)?),
            RIGHT_DOWN => Self::RightDown(pos(&payload)?),
            RIGHT_UP => Self::RightUp(pos(&payload)?),
            other => return Err(Error::malformed(format!("unknown event kind {:?}", other))),
        })
    }
}

impl fmt::Display for RecordedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(k) = self.key() {
            write!(f, "{} {}", self.tag(), k)
        } else if let Some(p) = self.position() {
            write!(f, "{} ({}, {})", self.tag(), p.x, p.y)
        } else {
            f.write_str(self.tag())
        }
    }
}

fn parse_position(tag: &str, v: &Value) -> Result<Position> {
    let coords = match v.as_array() {
        Some(a) if a.len() == 2 => a,
        _ => return Err(Error::malformed(format!("{} must be an [x, y] pair", tag))),
    };
    let mut xy = [0i32; 2];
    for (slot, c) in xy.iter_mut().zip(coords) {
        match c.as_i64() {
            Some(n) if in_range(n) => *slot = n as i32,
            _ => {
                return Err(Error::malformed(format!(
                    "{} coordinate {} outside 0..={}",
                    tag, c, ABSOLUTE_MAX
                )))
            }
        }
    }
    Ok(Position { x: xy[0], y: xy[1] })
}

/// One line of the event log
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event: RecordedEvent,
    /// Seconds since the previous record
    pub wait_time: f64,
    /// Supplementary key/value pairs (window title, timestamps, ...)
    pub extra: Map<String, Value>,
}

impl EventRecord {
    pub fn new(event: RecordedEvent, wait_time: f64) -> Self {
        Self {
            event,
            wait_time,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Reserved keys come first in a fixed order, extras follow sorted by key.
/// Extras named like a reserved key are dropped.
impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let tag = self.event.tag();
        let mut extra: Vec<(&String, &Value)> = self
            .extra
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(EVENT_KEY, tag)?;
        if let Some(payload) = self.event.payload() {
            map.serialize_entry(tag, &payload)?;
        }
        map.serialize_entry(WAIT_KEY, &self.wait_time.max(0.0))?;
        for (k, v) in extra {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Encode a record as a single JSON line, without the trailing newline
pub fn encode(record: &EventRecord) -> Result<String> {
    Ok(serde_json::to_string(record)?)
}

fn parse_wait(value: Option<Value>) -> Result<f64> {
    let value = value.ok_or_else(|| Error::malformed(format!("missing {}", WAIT_KEY)))?;
    match value.as_f64() {
        Some(w) if w.is_finite() && w >= 0.0 => Ok(w),
        _ => Err(Error::malformed(format!(
            "{} must be a non-negative number, got {}",
            WAIT_KEY, value
        ))),
    }
}

/// Decode one log line
pub fn decode(line: &str) -> Result<EventRecord> {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|e| Error::malformed(format!("invalid JSON: {}", e)))?;
    let Value::Object(mut obj) = value else {
        return Err(Error::malformed("record is not a JSON object"));
    };

    let wait = obj.remove(WAIT_KEY);
    let tag = match obj.remove(EVENT_KEY) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(Error::malformed(format!("{} must be a string, got {}", EVENT_KEY, other)))
        }
        None => {
            let present: Vec<&str> = MARKERS
                .iter()
                .copied()
                .filter(|m| obj.contains_key(*m))
                .collect();
            match present.as_slice() {
                [] => None,
                [one] => Some(one.to_string()),
                many => {
                    return Err(Error::malformed(format!(
                        "ambiguous record, markers {:?}",
                        many
                    )))
                }
            }
        }
    };

    if tag.is_none() && wait.is_none() {
        return Err(Error::malformed("no keyboard, mouse or idle marker"));
    }
    let wait_time = parse_wait(wait)?;

    let event = match tag.as_deref() {
        None | Some(IDLE_TAG) => RecordedEvent::Idle,
        Some(t) => {
            let payload = obj
                .remove(t)
                .ok_or_else(|| Error::malformed(format!("{} record without {} field", t, t)))?;
            RecordedEvent::from_parts(t, payload)?
        }
    };

    if let Some(stray) = MARKERS.iter().find(|m| obj.contains_key(**m)) {
        return Err(Error::malformed(format!(
            "{} record also carries {}",
            event.tag(),
            stray
        )));
    }

    Ok(EventRecord {
        event,
        wait_time,
        extra: obj,
    })
}
