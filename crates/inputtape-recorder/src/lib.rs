//! inputtape-recorder - keyboard/mouse event log recording and replay
//!
//! A recording is a JSON-lines event log: one record per line, each carrying
//! the seconds waited since the previous one. The [`Recorder`] filters hook
//! notifications into records; the [`Player`] expands records back into
//! synthetic input and replays them with the recorded timing.
//!
//! ## Platform Support
//!
//! - **Windows**: low-level hooks for capture, SendInput for replay
//! - **macOS / Linux**: log inspection and dry-run replay only

pub mod cancel;
pub mod events;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod storage;

pub use cancel::{CancelToken, KeyPoller};
pub use events::{decode, encode, EventRecord, KeySymbol, Position, RecordedEvent};
pub use recorder::{
    KeyAction, KeyMode, MouseAction, MouseMode, Recorder, RecorderConfig, RecorderStats,
    SysKeyMode, Verdict,
};
pub use replay::{PlaybackStats, Player, PlayerConfig, Step, SETTLE_DELAY};
pub use storage::{LogReader, LogWriter};

pub mod prelude {
    pub use crate::cancel::{CancelToken, KeyPoller};
    pub use crate::events::*;
    pub use crate::platform::current::record;
    pub use crate::recorder::*;
    pub use crate::replay::{PlaybackStats, Player, PlayerConfig, Step, SETTLE_DELAY};
    pub use crate::storage::{LogReader, LogWriter};
}
