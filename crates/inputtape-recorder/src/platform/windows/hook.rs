//! Low-level keyboard/mouse hooks
//!
//! Hook procedures are bare `extern "system"` functions, so the active
//! recorder lives in a process-wide slot. Only one session can be installed
//! at a time.

use super::get_focused_window_title;
use crate::cancel::CancelToken;
use crate::recorder::{KeyAction, MouseAction, Recorder, RecorderStats, Verdict, WINDOW_KEY};
use crossbeam_channel::{bounded, RecvTimeoutError};
use inputtape_core::{normalize, Error, ErrorCode, Result, ScreenGeometry};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostQuitMessage, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WINDOWS_HOOK_ID, WM_KEYDOWN, WM_KEYUP,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP,
};

const WATCH_INTERVAL: Duration = Duration::from_millis(100);

struct HookState {
    recorder: Recorder,
    screen: Box<dyn ScreenGeometry + Send>,
    resolution: (u32, u32),
    error: Option<Error>,
}

impl HookState {
    fn extra(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        if self.recorder.config().window_title {
            if let Some(title) = get_focused_window_title() {
                extra.insert(WINDOW_KEY.to_string(), Value::String(title));
            }
        }
        extra
    }
}

static STATE: Mutex<Option<HookState>> = parking_lot::const_mutex(None);

/// Owns both hooks for the lifetime of a recording session
pub struct HookSession {
    keyboard: Option<HHOOK>,
    mouse: Option<HHOOK>,
    thread_id: u32,
    // set once this session has filled the state slot
    owns_state: bool,
}

impl HookSession {
    /// Install the keyboard hook, then the mouse hook, then call `open` for
    /// the recorder.
    ///
    /// If the mouse hook fails the keyboard hook is removed again. `open`
    /// only runs once both hooks and the screen geometry are in place, so a
    /// failed install leaves the log file untouched.
    pub fn install(
        screen: impl ScreenGeometry + Send + 'static,
        open: impl FnOnce() -> Result<Recorder>,
    ) -> Result<Self> {
        if STATE.lock().is_some() {
            return Err(Error::new(
                ErrorCode::HookInstall,
                "a recording session is already active",
            ));
        }
        let resolution = screen.resolution()?;

        let keyboard = set_hook(WH_KEYBOARD_LL, "keyboard")?;
        let mouse = match set_hook(WH_MOUSE_LL, "mouse") {
            Ok(h) => h,
            Err(e) => {
                unsafe {
                    let _ = UnhookWindowsHookEx(keyboard);
                }
                return Err(e);
            }
        };
        let mut session = Self {
            keyboard: Some(keyboard),
            mouse: Some(mouse),
            thread_id: unsafe { GetCurrentThreadId() },
            owns_state: false,
        };

        // dropping `session` on error unhooks both
        let recorder = open()?;
        {
            let mut slot = STATE.lock();
            if slot.is_some() {
                return Err(Error::new(
                    ErrorCode::HookInstall,
                    "a recording session is already active",
                ));
            }
            *slot = Some(HookState {
                recorder,
                screen: Box::new(screen),
                resolution,
                error: None,
            });
        }
        session.owns_state = true;

        info!(width = resolution.0, height = resolution.1, "hooks installed");
        Ok(session)
    }

    /// Pump messages until the recorder stops or `token` is cancelled,
    /// then close the log.
    pub fn run(&mut self, token: &CancelToken) -> Result<RecorderStats> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let watch_token = token.clone();
        let thread_id = self.thread_id;
        let watcher = thread::spawn(move || loop {
            if watch_token.is_cancelled() {
                debug!("cancelled, posting WM_QUIT");
                unsafe {
                    let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                }
                break;
            }
            match stop_rx.recv_timeout(WATCH_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        });

        let mut msg = MSG::default();
        loop {
            let ret = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            // 0 is WM_QUIT, -1 is an error
            if ret.0 == 0 || ret.0 == -1 {
                break;
            }
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        drop(stop_tx);
        let _ = watcher.join();
        self.uninstall();

        self.owns_state = false;
        let state = STATE
            .lock()
            .take()
            .ok_or_else(|| Error::new(ErrorCode::HookInstall, "hook state missing"))?;
        if let Some(e) = state.error {
            return Err(e);
        }
        let mut recorder = state.recorder;
        recorder.stop()?;
        let stats = recorder.stats().clone();
        recorder.finish()?;
        Ok(stats)
    }

    fn uninstall(&mut self) {
        for hook in [self.keyboard.take(), self.mouse.take()].into_iter().flatten() {
            if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
                warn!("UnhookWindowsHookEx failed: {}", e);
            }
        }
    }
}

impl Drop for HookSession {
    fn drop(&mut self) {
        self.uninstall();
        if self.owns_state {
            STATE.lock().take();
        }
    }
}

fn set_hook(id: WINDOWS_HOOK_ID, name: &str) -> Result<HHOOK> {
    let proc_fn = if id == WH_KEYBOARD_LL {
        keyboard_proc as unsafe extern "system" fn(i32, WPARAM, LPARAM) -> LRESULT
    } else {
        mouse_proc
    };
    unsafe {
        let module = GetModuleHandleW(PCWSTR::null())
            .map_err(|e| Error::hook_install(name, e.code().0))?;
        SetWindowsHookExW(id, Some(proc_fn), HINSTANCE(module.0), 0)
            .map_err(|e| Error::hook_install(name, e.code().0))
    }
}

/// Run `f` against the live session and act on its verdict
fn dispatch(f: impl FnOnce(&mut HookState) -> Result<Verdict>) {
    let mut slot = STATE.lock();
    let Some(state) = slot.as_mut() else {
        return;
    };
    if state.error.is_some() {
        return;
    }
    match f(state) {
        Ok(Verdict::Continue) => {}
        Ok(Verdict::Stop) => unsafe { PostQuitMessage(0) },
        Err(e) => {
            error!("recording failed: {}", e);
            state.error = Some(e);
            unsafe { PostQuitMessage(1) }
        }
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let action = match wparam.0 as u32 {
            WM_KEYDOWN => Some(KeyAction::Down),
            WM_KEYUP => Some(KeyAction::Up),
            WM_SYSKEYDOWN => Some(KeyAction::SysDown),
            WM_SYSKEYUP => Some(KeyAction::SysUp),
            _ => None,
        };
        if let Some(action) = action {
            let vk = info.vkCode as u16;
            dispatch(|state| {
                let extra = state.extra();
                state.recorder.record_key_event(vk, action, extra)
            });
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        let action = match wparam.0 as u32 {
            WM_MOUSEMOVE => Some(MouseAction::Move),
            WM_LBUTTONDOWN => Some(MouseAction::LeftDown),
            WM_LBUTTONUP => Some(MouseAction::LeftUp),
            WM_RBUTTONDOWN => Some(MouseAction::RightDown),
            WM_RBUTTONUP => Some(MouseAction::RightUp),
            _ => None,
        };
        if let Some(action) = action {
            let (px, py) = (info.pt.x, info.pt.y);
            dispatch(|state| {
                if matches!(action, MouseAction::LeftDown | MouseAction::RightDown) {
                    // display settings may change mid-session
                    match state.screen.resolution() {
                        Ok(res) => state.resolution = res,
                        Err(e) => debug!("keeping previous resolution: {}", e),
                    }
                }
                let (x, y) = normalize(px, py, state.resolution);
                let extra = state.extra();
                state.recorder.record_mouse_event(action, x, y, extra)
            });
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}
