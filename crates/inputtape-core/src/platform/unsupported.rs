//! Stand-ins for platforms without input capture or injection
//!
//! Capture and injection are not implemented; only dry-run playback and
//! log inspection work here.

use crate::geometry::ScreenGeometry;
use crate::input::{InputRequest, Injector, KeyState, SendReport};
use crate::{Error, Result};

#[derive(Debug)]
pub struct SystemInjector;

impl SystemInjector {
    pub fn new() -> Result<Self> {
        Err(Error::not_supported("Input injection"))
    }
}

impl Injector for SystemInjector {
    fn send(&mut self, _batch: &[InputRequest]) -> SendReport {
        SendReport::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemScreen;

impl ScreenGeometry for SystemScreen {
    fn resolution(&self) -> Result<(u32, u32)> {
        Err(Error::not_supported("Screen geometry"))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemKeyState;

impl SystemKeyState {
    pub fn new() -> Result<Self> {
        Err(Error::not_supported("Key state polling"))
    }
}

impl KeyState for SystemKeyState {
    fn is_down(&self, _vk: u16) -> bool {
        false
    }
}
