//! Platform layer for recording
//!
//! Global keyboard/mouse capture only exists on Windows. Elsewhere
//! `record` fails with `NOT_SUPPORTED`; logs can still be inspected and
//! dry-run replayed.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

#[cfg(target_os = "windows")]
pub use windows as current;

#[cfg(not(target_os = "windows"))]
pub use unsupported as current;
