//! Windows recording implementation
//!
//! Low-level keyboard and mouse hooks feed the recorder from a message pump
//! on the calling thread.

mod hook;

pub use hook::HookSession;

use crate::cancel::CancelToken;
use crate::recorder::{Recorder, RecorderConfig, RecorderStats};
use inputtape_core::platform::current::SystemScreen;
use inputtape_core::Result;
use std::path::Path;
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

/// Record into `path` until the end key is pressed or `token` is cancelled
pub fn record(path: &Path, config: RecorderConfig, token: &CancelToken) -> Result<RecorderStats> {
    let mut session = HookSession::install(SystemScreen, || Recorder::open(path, config))?;
    session.run(token)
}

/// Title of the foreground window, if it has one
pub fn get_focused_window_title() -> Option<String> {
    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.0.is_null() {
            return None;
        }

        let mut buffer = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut buffer);
        if len > 0 {
            Some(String::from_utf16_lossy(&buffer[..len as usize]))
        } else {
            None
        }
    }
}
