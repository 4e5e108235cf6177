//! Platform abstraction layer
//!
//! Each platform exposes `SystemInjector`, `SystemScreen` and
//! `SystemKeyState`. Only Windows has working implementations.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

// Re-export the current platform
#[cfg(target_os = "windows")]
pub use windows as current;

#[cfg(not(target_os = "windows"))]
pub use unsupported as current;
