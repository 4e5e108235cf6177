//! Windows platform implementation
//!
//! SendInput for injection, GetAsyncKeyState for the end-key poller and the
//! desktop window rect times the monitor scale factor for geometry.

mod input;

pub use input::SystemInjector;

use windows::Win32::Foundation::{GetLastError, RECT};
use windows::Win32::Graphics::Gdi::{MonitorFromWindow, MONITOR_DEFAULTTOPRIMARY};
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::Shell::GetScaleFactorForMonitor;
use windows::Win32::UI::WindowsAndMessaging::{GetDesktopWindow, GetWindowRect};

use crate::geometry::ScreenGeometry;
use crate::input::KeyState;
use crate::{Error, ErrorCode, Result};

/// Screen resolution before DPI virtualization
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemScreen;

impl ScreenGeometry for SystemScreen {
    fn resolution(&self) -> Result<(u32, u32)> {
        unsafe {
            let desktop = GetDesktopWindow();
            let mut rect = RECT::default();
            GetWindowRect(desktop, &mut rect).map_err(|e| {
                Error::new(ErrorCode::ScreenGeometry, format!("GetWindowRect failed: {}", e))
                    .with_os_code(GetLastError().0 as i32)
            })?;

            let monitor = MonitorFromWindow(desktop, MONITOR_DEFAULTTOPRIMARY);
            let factor = GetScaleFactorForMonitor(monitor).map_err(|e| {
                Error::new(
                    ErrorCode::ScreenGeometry,
                    format!("GetScaleFactorForMonitor failed: {}", e),
                )
                .with_os_code(e.code().0)
            })?;

            // scale factor is a percentage (100, 125, 150, ...)
            let pct = factor.0.max(100) as i64;
            let w = (rect.right - rect.left) as i64 * pct / 100;
            let h = (rect.bottom - rect.top) as i64 * pct / 100;
            Ok((w.max(0) as u32, h.max(0) as u32))
        }
    }
}

/// Physical key state, readable from any thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKeyState;

impl SystemKeyState {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

impl KeyState for SystemKeyState {
    fn is_down(&self, vk: u16) -> bool {
        // high-order bit set means the key is currently down
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        (state as u16) & 0x8000 != 0
    }
}
