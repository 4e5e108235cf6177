//! inputtape-core - primitives for keyboard/mouse record and replay
//!
//! Key symbol table, synthetic input requests, coordinate normalization and
//! the OS seams (injection, key state, screen geometry).
//!
//! ## Platform Support
//!
//! - **Windows**: SendInput, GetAsyncKeyState, DPI-aware screen geometry
//! - **macOS / Linux**: types and dry runs only

pub mod error;
pub mod geometry;
pub mod input;
pub mod keys;
pub mod platform;

pub use error::{Error, ErrorCode, Result};
pub use geometry::{normalize, ScreenGeometry};
pub use input::{DryRunInjector, InputRequest, Injector, KeyState, SendReport};
pub use keys::EndKey;

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::geometry::{normalize, FixedScreen, ScreenGeometry};
    pub use crate::input::{DryRunInjector, InputRequest, Injector, KeyState, SendReport};
    pub use crate::keys::{self, EndKey};
    pub use crate::platform::current::{SystemInjector, SystemKeyState, SystemScreen};
}
