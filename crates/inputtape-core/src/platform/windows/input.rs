//! Windows input injection
//!
//! Uses SendInput for keyboard and mouse events.

use windows::Win32::Foundation::GetLastError;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS,
    VIRTUAL_KEY,
};

use crate::input::{InputRequest, Injector, SendReport};
use crate::Result;

/// Injects requests through `SendInput`
#[derive(Debug, Default)]
pub struct SystemInjector;

impl SystemInjector {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

impl Injector for SystemInjector {
    fn send(&mut self, batch: &[InputRequest]) -> SendReport {
        let inputs: Vec<INPUT> = batch.iter().map(to_input).collect();
        send_inputs(&inputs)
    }
}

fn to_input(request: &InputRequest) -> INPUT {
    match *request {
        InputRequest::KeyDown { vk } => make_key_input(vk, false),
        InputRequest::KeyUp { vk } => make_key_input(vk, true),
        InputRequest::MoveTo { x, y } => {
            make_mouse_input(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, x, y)
        }
        InputRequest::LeftDown => make_mouse_input(MOUSEEVENTF_LEFTDOWN, 0, 0),
        InputRequest::LeftUp => make_mouse_input(MOUSEEVENTF_LEFTUP, 0, 0),
        InputRequest::RightDown => make_mouse_input(MOUSEEVENTF_RIGHTDOWN, 0, 0),
        InputRequest::RightUp => make_mouse_input(MOUSEEVENTF_RIGHTUP, 0, 0),
    }
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS, dx: i32, dy: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> SendReport {
    if inputs.is_empty() {
        return SendReport::complete(0);
    }
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) } as usize;

    if sent < inputs.len() {
        let os_code = unsafe { GetLastError() }.0 as i32;
        return SendReport {
            injected: sent,
            os_code,
        };
    }
    SendReport::complete(sent)
}
